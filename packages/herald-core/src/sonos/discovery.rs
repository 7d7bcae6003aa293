//! Discovered-device feed.
//!
//! Herald does not search the network itself. A feed yields
//! [`DiscoveredDevice`] pairs and [`consume_discovery`] applies the registry
//! policy to each one. [`probe_hosts`] builds such a feed from a fixed list
//! of addresses by fetching every device's description document.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;

use crate::error::SoapResult;
use crate::protocol_constants::{HOME_THEATER_BAR, SONOS_PORT};
use crate::services::device_registry::{DeviceRegistry, Registration};
use crate::sonos::client::SonosDeviceImpl;
use crate::sonos::traits::{DeviceProperties, SonosDevice};
use crate::sonos::types::DeviceDescription;

/// Maximum number of description fetches in flight.
const PROBE_CONCURRENCY: usize = 8;

/// Identity of a discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub room_name: String,
    /// Model family as shown in the Sonos app (e.g. `One`, `Playbar`).
    pub display_name: String,
    pub udn: String,
    pub host: String,
    pub port: u16,
}

impl DeviceDescriptor {
    #[must_use]
    pub fn from_description(description: &DeviceDescription, host: &str, port: u16) -> Self {
        Self {
            room_name: description.room_name.clone(),
            display_name: description.display_name.clone(),
            udn: description.udn.clone(),
            host: host.to_string(),
            port,
        }
    }

    /// True when the device reports itself as a home-theater bar.
    #[must_use]
    pub fn is_home_theater_bar(&self) -> bool {
        self.display_name == HOME_THEATER_BAR
    }
}

/// One item of a discovery feed.
pub type DiscoveredDevice = (DeviceDescriptor, Arc<dyn SonosDevice>);

/// Counts of what a feed did to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub added: usize,
    pub superseded: usize,
    pub ignored: usize,
    pub known: usize,
}

/// Registers every device yielded by `feed` until it ends.
pub async fn consume_discovery<S>(
    feed: S,
    registry: &DeviceRegistry,
    ignore_list: &[String],
) -> DiscoverySummary
where
    S: Stream<Item = DiscoveredDevice>,
{
    let mut summary = DiscoverySummary::default();
    let mut feed = std::pin::pin!(feed);

    while let Some((descriptor, facade)) = feed.next().await {
        match registry
            .register_discovered(descriptor, facade, ignore_list)
            .await
        {
            Registration::Added => summary.added += 1,
            Registration::Superseded => summary.superseded += 1,
            Registration::Ignored => summary.ignored += 1,
            Registration::AlreadyKnown => summary.known += 1,
        }
    }

    log::info!(
        "[Discovery] {} added, {} superseded, {} ignored, {} already known",
        summary.added,
        summary.superseded,
        summary.ignored,
        summary.known
    );
    summary
}

/// Splits `host[:port]`, defaulting to the Sonos port.
#[must_use]
pub fn parse_host(address: &str) -> (String, u16) {
    let address = address.trim();
    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (address.to_string(), SONOS_PORT),
        },
        None => (address.to_string(), SONOS_PORT),
    }
}

/// Fetches the description of the device at `host:port`.
pub async fn probe_host(
    client: Client,
    host: &str,
    port: u16,
    spotify_region: &str,
) -> SoapResult<DiscoveredDevice> {
    let device = SonosDeviceImpl::new(client, host, port).with_spotify_region(spotify_region);
    let description = device.device_description().await?;
    let descriptor = DeviceDescriptor::from_description(&description, host, port);
    Ok((descriptor, Arc::new(device)))
}

/// Feed of the devices answering at `addresses`.
///
/// Unreachable addresses are logged and skipped.
pub fn probe_hosts(
    client: Client,
    addresses: Vec<String>,
    spotify_region: String,
) -> impl Stream<Item = DiscoveredDevice> {
    stream::iter(addresses)
        .map(move |address| {
            let client = client.clone();
            let region = spotify_region.clone();
            async move {
                let (host, port) = parse_host(&address);
                match probe_host(client, &host, port, &region).await {
                    Ok(found) => Some(found),
                    Err(e) => {
                        log::warn!("[Discovery] Probe of {} failed: {}", address, e);
                        None
                    }
                }
            }
        })
        .buffer_unordered(PROBE_CONCURRENCY)
        .filter_map(|found| async move { found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::sonos::test_fixtures::FakeSonosDevice;

    fn discovered(room: &str, display_name: &str, udn: &str) -> DiscoveredDevice {
        (
            DeviceDescriptor {
                room_name: room.to_string(),
                display_name: display_name.to_string(),
                udn: udn.to_string(),
                host: "192.168.1.30".to_string(),
                port: 1400,
            },
            Arc::new(FakeSonosDevice::new(room, "192.168.1.30")),
        )
    }

    #[test]
    fn parse_host_defaults_port() {
        assert_eq!(parse_host("192.168.1.5"), ("192.168.1.5".to_string(), 1400));
        assert_eq!(parse_host(" 192.168.1.5:1443 "), ("192.168.1.5".to_string(), 1443));
    }

    #[tokio::test]
    async fn consume_discovery_applies_policy() {
        let registry = DeviceRegistry::new(Arc::new(NoopEventEmitter));
        let feed = stream::iter(vec![
            discovered("Salon", "One", "uuid:A"),
            discovered("Kitchen", "One", "uuid:K"),
            discovered("Garage", "One", "uuid:G"),
            discovered("Salon", "Playbar", "uuid:B"),
            discovered("Kitchen", "One", "uuid:K"),
        ]);

        let summary = consume_discovery(feed, &registry, &["Garage".to_string()]).await;

        assert_eq!(
            summary,
            DiscoverySummary {
                added: 2,
                superseded: 1,
                ignored: 1,
                known: 1,
            }
        );
        assert_eq!(registry.all_device_ids(), vec!["Kitchen", "Salon"]);
    }

    #[tokio::test]
    async fn probe_hosts_reads_device_description() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/xml/device_description.xml")
            .with_status(200)
            .with_body(
                r#"<root><device><roomName>Office</roomName><displayName>Era 100</displayName>
                <UDN>uuid:RINCON_1</UDN></device></root>"#,
            )
            .create_async()
            .await;
        let address = server.host_with_port();

        let found: Vec<DiscoveredDevice> =
            probe_hosts(Client::new(), vec![address, "127.0.0.1:1".to_string()], "2311".into())
                .collect()
                .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.room_name, "Office");
        assert_eq!(found[0].0.display_name, "Era 100");
        assert!(!found[0].0.is_home_theater_bar());
    }
}
