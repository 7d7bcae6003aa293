//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: every service is instantiated and
//! wired together here, so frontends only pick a configuration, an event
//! emitter and (in tests) a speech synthesizer.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::HeraldConfig;
use crate::error::{HeraldError, HeraldResult};
use crate::events::EventEmitter;
use crate::protocol_constants::SOAP_TIMEOUT_SECS;
use crate::runtime::TokioSpawner;
use crate::services::{
    DeviceRegistry, IntercomService, InterruptionService, PlaybackOrchestrator, RoomCommands,
    SpeechService,
};
use crate::sonos::discovery::{consume_discovery, probe_hosts, DiscoverySummary};
use crate::tts::{CommandSynthesizer, SpeechSynthesizer};

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    pub config: Arc<HeraldConfig>,
    /// Known players, by room.
    pub registry: Arc<DeviceRegistry>,
    /// Per-device backup/restore state machine.
    pub interruption: Arc<InterruptionService>,
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub speech: Arc<SpeechService>,
    pub intercom: Arc<IntercomService>,
    pub commands: Arc<RoomCommands>,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
    /// Task spawner for restore timers and watchdogs.
    pub spawner: TokioSpawner,
    /// Cancelled on shutdown; pass it to long-running requests.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Probes `hosts` (`host[:port]`) and registers every player that answers.
    pub async fn discover_hosts(&self, hosts: &[String]) -> DiscoverySummary {
        let feed = probe_hosts(
            self.http_client.clone(),
            hosts.to_vec(),
            self.config.spotify_region.clone(),
        );
        consume_discovery(feed, &self.registry, &self.config.ignore_list).await
    }

    /// Cancels in-flight work and puts every armed player back.
    ///
    /// # Returns
    /// The number of rooms that were restored.
    pub async fn shutdown(&self) -> usize {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        let mut restored = 0;
        for room in self.registry.all_device_ids() {
            if let Some(outcome) = self.interruption.cancel(&room).await {
                if !outcome.is_clean() {
                    log::warn!("[Bootstrap] {} restored with errors", room);
                }
                restored += 1;
            }
        }
        log::info!("[Bootstrap] Restored {} room(s)", restored);

        log::info!("[Bootstrap] Shutdown complete");
        restored
    }
}

/// Creates the shared HTTP client for all Sonos communication.
fn create_http_client() -> HeraldResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .build()
        .map_err(|e| HeraldError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all services with the configured speech engine.
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the speech engine
/// is misconfigured.
pub fn bootstrap_services(
    config: HeraldConfig,
    emitter: Arc<dyn EventEmitter>,
) -> HeraldResult<BootstrappedServices> {
    let synthesizer = Arc::new(CommandSynthesizer::from_config(&config.tts)?);
    bootstrap_services_with(config, emitter, synthesizer)
}

/// Bootstraps all services around a caller-supplied speech synthesizer.
///
/// Services are created in dependency order:
///
/// 1. Shared infrastructure (HTTP client, spawner, cancellation token)
/// 2. Device registry
/// 3. Interruption service (depends on registry)
/// 4. Orchestrator (depends on interruption)
/// 5. Speech, intercom and room commands (depend on orchestrator/interruption)
pub fn bootstrap_services_with(
    config: HeraldConfig,
    emitter: Arc<dyn EventEmitter>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> HeraldResult<BootstrappedServices> {
    let config = Arc::new(config);
    let spawner = TokioSpawner::current();
    let http_client = create_http_client()?;
    let cancel_token = CancellationToken::new();

    let registry = Arc::new(DeviceRegistry::new(Arc::clone(&emitter)));

    let interruption = Arc::new(InterruptionService::new(
        Arc::clone(&registry),
        Arc::clone(&emitter),
        config.max_armed(),
        spawner.clone(),
    ));

    let orchestrator = Arc::new(PlaybackOrchestrator::new(
        Arc::clone(&interruption),
        Arc::clone(&config),
        Arc::clone(&emitter),
        spawner.clone(),
    ));

    let speech = Arc::new(SpeechService::new(Arc::clone(&orchestrator), synthesizer));
    let intercom = Arc::new(IntercomService::new(Arc::clone(&orchestrator)));
    let commands = Arc::new(RoomCommands::new(
        Arc::clone(&interruption),
        Arc::clone(&config),
        emitter,
    ));

    log::info!("[Bootstrap] Services ready (share {})", config.share);

    Ok(BootstrappedServices {
        config,
        registry,
        interruption,
        orchestrator,
        speech,
        intercom,
        commands,
        http_client,
        spawner,
        cancel_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TtsConfig, TtsEngineKind};
    use crate::events::NoopEventEmitter;
    use crate::sonos::test_fixtures::{descriptor, FakeSonosDevice};
    use crate::sonos::types::TransportState;

    #[tokio::test]
    async fn misconfigured_speech_engine_fails_bootstrap() {
        let config = HeraldConfig {
            tts: TtsConfig {
                engine: TtsEngineKind::Command,
                command: None,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = bootstrap_services(config, Arc::new(NoopEventEmitter));

        assert!(matches!(result, Err(HeraldError::Configuration(_))));
    }

    #[tokio::test]
    async fn shutdown_restores_armed_rooms() {
        let services =
            bootstrap_services(HeraldConfig::default(), Arc::new(NoopEventEmitter)).unwrap();
        let kitchen = Arc::new(FakeSonosDevice::queued(
            "Kitchen",
            TransportState::Playing,
            3,
            2,
            40,
        ));
        let office = Arc::new(FakeSonosDevice::new("Office", "192.168.1.9"));
        services
            .registry
            .add_device(descriptor("Kitchen"), kitchen.clone());
        services.registry.add_device(descriptor("Office"), office);

        let _hold = services.interruption.backup("Kitchen").await.unwrap();
        assert!(services.interruption.is_armed("Kitchen"));

        let restored = services.shutdown().await;

        assert_eq!(restored, 1);
        assert!(services.cancel_token.is_cancelled());
        assert!(!services.interruption.is_armed("Kitchen"));
        assert_eq!(kitchen.snapshot().transport, TransportState::Playing);
    }

    #[tokio::test]
    async fn discover_unreachable_host_registers_nothing() {
        let services =
            bootstrap_services(HeraldConfig::default(), Arc::new(NoopEventEmitter)).unwrap();

        let summary = services
            .discover_hosts(&["127.0.0.1:1".to_string()])
            .await;

        assert_eq!(summary, DiscoverySummary::default());
        assert!(services.registry.is_empty());
    }
}
