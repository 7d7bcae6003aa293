//! Spoken announcements.
//!
//! Text is synthesized into the room's folder on the share and played
//! through the [`PlaybackOrchestrator`]. The room is backed up before
//! synthesis starts and held until the announcement is over, so a failed or
//! cancelled synthesis still hands the device back.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{HeraldError, HeraldResult};
use crate::media::{client_folder, sanitize_speech, speech_target};
use crate::services::interruption::{Hold, RestoreOutcome};
use crate::services::orchestrator::{
    EndMode, InterruptionRequest, PlaybackOrchestrator, PlaybackReport,
};
use crate::tts::{SpeechRequest, SpeechSynthesizer, TtsError};

/// Per-request speech settings; unset fields use the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakOptions {
    pub end_mode: EndMode,
    pub volume: Option<u8>,
    pub voice: Option<String>,
    pub speed: Option<u32>,
}

/// Speaks text on a room's player.
pub struct SpeechService {
    orchestrator: Arc<PlaybackOrchestrator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl SpeechService {
    pub fn new(
        orchestrator: Arc<PlaybackOrchestrator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            orchestrator,
            synthesizer,
        }
    }

    /// Synthesizes `text` and plays it in `room`.
    ///
    /// Cancelling `cancel` stops the engine; the room is restored and the
    /// listening session ended as on any other failure.
    pub async fn speak(
        &self,
        text: &str,
        room: &str,
        options: SpeakOptions,
        cancel: &CancellationToken,
    ) -> HeraldResult<PlaybackReport> {
        let prepared = self.prepare(text, room, &options);
        let (request, speech) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("[Speech] Cannot speak in {}: {}", room, e);
                self.orchestrator.end_listening(room);
                return Err(e);
            }
        };

        let interruption = self.orchestrator.interruption();
        let hold = if options.end_mode == EndMode::StopImmediately {
            None
        } else {
            match interruption.backup(room).await {
                Ok(hold) => Some(hold),
                Err(e) => {
                    self.orchestrator.end_listening(room);
                    return Err(e);
                }
            }
        };

        log::info!("[Speech] Synthesizing for {}: {}", room, speech.text);
        if let Err(e) = self.synthesize(&speech, cancel).await {
            log::warn!("[Speech] {} in {}", e, room);
            if let Some(hold) = &hold {
                interruption.finish(hold).await;
            }
            self.orchestrator.end_listening(room);
            return Err(e.into());
        }

        let result = self.orchestrator.run(request).await;
        let Some(hold) = hold else {
            return result;
        };

        let restore = self.release(&hold, options.end_mode).await;
        result.map(|mut report| {
            report.joined = hold.joined();
            if restore.is_some() {
                report.restore = restore;
            }
            report
        })
    }

    /// Runs the engine, giving up after the configured TTS timeout so a hung
    /// engine cannot keep the room armed. Dropping the engine future kills it.
    async fn synthesize(
        &self,
        speech: &SpeechRequest,
        cancel: &CancellationToken,
    ) -> Result<(), TtsError> {
        let limit = self.orchestrator.config().tts.timeout();
        match tokio::time::timeout(limit, self.synthesizer.synthesize(speech, cancel)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(TtsError::TimedOut(limit)),
        }
    }

    async fn release(&self, hold: &Hold, end_mode: EndMode) -> Option<RestoreOutcome> {
        let interruption = self.orchestrator.interruption();
        match end_mode {
            EndMode::LeavePlaying => {
                interruption.park(hold).await;
                None
            }
            _ => interruption.finish(hold).await,
        }
    }

    fn prepare(
        &self,
        text: &str,
        room: &str,
        options: &SpeakOptions,
    ) -> HeraldResult<(InterruptionRequest, SpeechRequest)> {
        let config = self.orchestrator.config();

        let text = sanitize_speech(text);
        if text.is_empty() {
            return Err(HeraldError::InvalidRequest("nothing to say".to_string()));
        }
        let folder = client_folder(room).ok_or_else(|| {
            HeraldError::InvalidRequest(format!("no speech folder name for {}", room))
        })?;
        if self.orchestrator.interruption().registry().find_device(room).is_none() {
            return Err(HeraldError::DeviceNotFound(room.to_string()));
        }

        let target = speech_target(config, &folder)?;
        let output_path = target.local_path.clone().ok_or_else(|| {
            HeraldError::Configuration("speech target has no local path".to_string())
        })?;

        let speech = SpeechRequest {
            text,
            voice: options.voice.clone().or_else(|| config.tts.voice.clone()),
            speed: Some(options.speed.unwrap_or(config.tts.speed)),
            output_path,
        };
        let request = InterruptionRequest::for_target(&target, room)
            .with_end_mode(options.end_mode)
            .with_volume(options.volume);

        Ok((request, speech))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::config::HeraldConfig;
    use crate::events::{NoopEventEmitter, SessionEvent};
    use crate::runtime::TokioSpawner;
    use crate::services::device_registry::DeviceRegistry;
    use crate::services::interruption::InterruptionService;
    use crate::sonos::test_fixtures::{descriptor, write_wav, FakeSonosDevice, RecordingEmitter};
    use crate::sonos::types::TransportState;

    enum Behavior {
        Write(u32),
        Fail,
        WaitForCancel,
    }

    struct FakeSynthesizer {
        behavior: Behavior,
        requests: Mutex<Vec<SpeechRequest>>,
    }

    impl FakeSynthesizer {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            request: &SpeechRequest,
            cancel: &CancellationToken,
        ) -> Result<PathBuf, TtsError> {
            self.requests.lock().push(request.clone());
            match self.behavior {
                Behavior::Write(seconds) => {
                    write_wav(&request.output_path, seconds);
                    Ok(request.output_path.clone())
                }
                Behavior::Fail => Err(TtsError::EngineFailed("espeak exited with 1".into())),
                Behavior::WaitForCancel => {
                    cancel.cancelled().await;
                    Err(TtsError::Cancelled)
                }
            }
        }
    }

    struct Harness {
        service: SpeechService,
        synthesizer: Arc<FakeSynthesizer>,
        emitter: Arc<RecordingEmitter>,
        _share: tempfile::TempDir,
    }

    fn harness(behavior: Behavior, devices: &[(&str, Arc<FakeSonosDevice>)]) -> Harness {
        let share = tempfile::tempdir().unwrap();
        let config = Arc::new(HeraldConfig {
            shared_folder: share.path().to_path_buf(),
            share: "nas/herald".to_string(),
            ..Default::default()
        });
        let emitter = Arc::new(RecordingEmitter::default());
        let registry = Arc::new(DeviceRegistry::new(Arc::new(NoopEventEmitter)));
        for (room, fake) in devices {
            registry.add_device(descriptor(room), fake.clone());
        }
        let interruption = Arc::new(InterruptionService::new(
            registry,
            emitter.clone(),
            config.max_armed(),
            TokioSpawner::current(),
        ));
        let orchestrator = Arc::new(PlaybackOrchestrator::new(
            interruption,
            config,
            emitter.clone(),
            TokioSpawner::current(),
        ));
        let synthesizer = Arc::new(FakeSynthesizer::new(behavior));
        Harness {
            service: SpeechService::new(orchestrator, synthesizer.clone()),
            synthesizer,
            emitter,
            _share: share,
        }
    }

    fn is_armed(h: &Harness, room: &str) -> bool {
        h.service.orchestrator.interruption().is_armed(room)
    }

    #[tokio::test(start_paused = true)]
    async fn speaks_into_room_folder_and_restores() {
        let fake = Arc::new(FakeSonosDevice::streaming(
            "Living Room",
            "x-rincon-mp3radio://radio.example/live",
            TransportState::Playing,
        ));
        let h = harness(Behavior::Write(2), &[("Living Room", fake.clone())]);

        let report = h
            .service
            .speak(
                "Il est <8h> pile",
                "Living Room",
                SpeakOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let requests = h.synthesizer.requests.lock().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, "Il est 8h pile");
        assert_eq!(requests[0].speed, Some(160));
        assert!(requests[0]
            .output_path
            .ends_with("tts/speech/LivingRoom/speech.wav"));

        assert!(fake.calls().contains(
            &"set_uri(x-file-cifs://nas/herald/tts/speech/LivingRoom/speech.wav, only_set=false)"
                .to_string()
        ));
        assert!((2990..=3010).contains(&report.timeout.as_millis()));
        assert!(!report.joined);
        assert!(report.restore.unwrap().is_clean());
        assert!(!is_armed(&h, "Living Room"));
        assert_eq!(
            fake.snapshot().track.uri,
            "x-rincon-mp3radio://radio.example/live"
        );
        assert_eq!(h.emitter.listening_ended("Living Room"), 1);
    }

    #[tokio::test]
    async fn synthesis_failure_restores_and_ends_listening() {
        let fake = Arc::new(FakeSonosDevice::queued("Kitchen", TransportState::Paused, 3, 2, 20));
        let h = harness(Behavior::Fail, &[("Kitchen", fake.clone())]);

        let err = h
            .service
            .speak("Bonjour", "Kitchen", SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HeraldError::Speech(_)));
        assert!(!is_armed(&h, "Kitchen"));
        assert!(h
            .emitter
            .session_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Restored { room, .. } if room == "Kitchen")));
        assert_eq!(h.emitter.listening_ended("Kitchen"), 1);
        assert_eq!(fake.snapshot().transport, TransportState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_synthesis_still_restores() {
        let fake = Arc::new(FakeSonosDevice::new("Kitchen", "192.168.1.9").with_volume(30, true));
        let h = harness(Behavior::WaitForCancel, &[("Kitchen", fake.clone())]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let speaking = h
            .service
            .speak("Bonjour", "Kitchen", SpeakOptions::default(), &cancel);
        let cancelling = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(is_armed(&h, "Kitchen"));
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(speaking, cancelling);

        assert!(matches!(result, Err(HeraldError::Speech(_))));
        assert!(!is_armed(&h, "Kitchen"));
        assert!(fake.snapshot().muted);
        assert_eq!(h.emitter.listening_ended("Kitchen"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_engine_times_out_and_restores() {
        let fake = Arc::new(FakeSonosDevice::queued("Kitchen", TransportState::Playing, 3, 2, 20));
        let h = harness(Behavior::WaitForCancel, &[("Kitchen", fake.clone())]);
        let started = tokio::time::Instant::now();

        let err = h
            .service
            .speak("Bonjour", "Kitchen", SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(&err, HeraldError::Speech(msg) if msg.contains("did not finish")));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
        assert!(!is_armed(&h, "Kitchen"));
        assert_eq!(fake.snapshot().transport, TransportState::Playing);
        assert_eq!(h.emitter.listening_ended("Kitchen"), 1);
    }

    #[tokio::test]
    async fn nothing_left_to_say_is_rejected_before_backup() {
        let fake = Arc::new(FakeSonosDevice::new("Kitchen", "192.168.1.9"));
        let h = harness(Behavior::Write(1), &[("Kitchen", fake.clone())]);

        let err = h
            .service
            .speak("<>(#)", "Kitchen", SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HeraldError::InvalidRequest(_)));
        assert!(fake.calls().is_empty());
        assert!(h.synthesizer.requests.lock().is_empty());
        assert_eq!(h.emitter.listening_ended("Kitchen"), 1);
    }

    #[tokio::test]
    async fn room_without_folder_name_is_rejected() {
        let fake = Arc::new(FakeSonosDevice::new("Éé", "192.168.1.9"));
        let h = harness(Behavior::Write(1), &[("Éé", fake)]);

        let err = h
            .service
            .speak("Bonjour", "Éé", SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HeraldError::InvalidRequest(_)));
        assert_eq!(h.emitter.listening_ended("Éé"), 1);
    }

    #[tokio::test]
    async fn unknown_room_is_device_not_found() {
        let h = harness(Behavior::Write(1), &[]);

        let err = h
            .service
            .speak("Bonjour", "Attic", SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HeraldError::DeviceNotFound(_)));
        assert!(h.synthesizer.requests.lock().is_empty());
        assert_eq!(h.emitter.listening_ended("Attic"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_playing_keeps_room_armed() {
        let fake = Arc::new(FakeSonosDevice::new("Kitchen", "192.168.1.9"));
        let h = harness(Behavior::Write(1), &[("Kitchen", fake)]);
        let options = SpeakOptions {
            end_mode: EndMode::LeavePlaying,
            voice: Some("fr".to_string()),
            ..Default::default()
        };

        let report = h
            .service
            .speak("Bonjour", "Kitchen", options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.restore.is_none());
        assert!(is_armed(&h, "Kitchen"));
        assert_eq!(h.synthesizer.requests.lock()[0].voice.as_deref(), Some("fr"));

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(!is_armed(&h, "Kitchen"));
    }
}
