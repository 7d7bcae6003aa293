//! Per-speaker volume and mute control.
//!
//! All operations use the RenderingControl service with an explicit channel
//! (normally `Master`).

use reqwest::Client;

use crate::error::SoapResult;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapRequestBuilder;

/// Highest volume a Sonos speaker accepts.
pub const MAX_VOLUME: u8 = 100;

/// Applies a signed step to a volume, clamping to 0..=100.
///
/// Any delta magnitude is accepted; `apply_volume_delta(95, 50)` is 100 and
/// `apply_volume_delta(3, i32::MIN)` is 0.
#[must_use]
pub fn apply_volume_delta(current: u8, delta: i32) -> u8 {
    let target = i64::from(current) + i64::from(delta);
    target.clamp(0, i64::from(MAX_VOLUME)) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Gets the volume of `channel` (0-100).
pub async fn get_volume(client: &Client, base_url: &str, channel: &str) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetVolume")
        .instance_id()
        .arg("Channel", channel)
        .send()
        .await?;

    response.parse("CurrentVolume")
}

/// Sets the volume of `channel`.
///
/// # Arguments
/// * `volume` - Desired volume level (0-100, values > 100 are clamped)
pub async fn set_volume(
    client: &Client,
    base_url: &str,
    channel: &str,
    volume: u8,
) -> SoapResult<()> {
    let clamped = volume.min(MAX_VOLUME);

    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetVolume")
        .instance_id()
        .arg("Channel", channel)
        .arg("DesiredVolume", clamped.to_string())
        .send()
        .await?;

    Ok(())
}

/// Shifts the volume of `channel` by `delta` (SetRelativeVolume).
///
/// The delta is clamped to ±100 before sending; the device clamps the
/// result to 0..=100 and reports it.
pub async fn set_relative_volume(
    client: &Client,
    base_url: &str,
    channel: &str,
    delta: i32,
) -> SoapResult<u8> {
    let adjustment = delta.clamp(-i32::from(MAX_VOLUME), i32::from(MAX_VOLUME));

    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetRelativeVolume")
        .instance_id()
        .arg("Channel", channel)
        .arg("Adjustment", adjustment.to_string())
        .send()
        .await?;

    let new_volume: u32 = response.parse("NewVolume")?;
    Ok(new_volume.min(u32::from(MAX_VOLUME)) as u8)
}

// ─────────────────────────────────────────────────────────────────────────────
// Mute
// ─────────────────────────────────────────────────────────────────────────────

/// Gets the mute state of `channel`.
pub async fn get_mute(client: &Client, base_url: &str, channel: &str) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetMute")
        .instance_id()
        .arg("Channel", channel)
        .send()
        .await?;

    Ok(response.require("CurrentMute")? == "1")
}

pub async fn set_mute(client: &Client, base_url: &str, channel: &str, mute: bool) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetMute")
        .instance_id()
        .arg("Channel", channel)
        .arg("DesiredMute", if mute { "1" } else { "0" })
        .send()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn rendering_response(action: &str, body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:{action}Response xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">{body}</u:{action}Response></s:Body></s:Envelope>"#
        )
    }

    #[test]
    fn volume_delta_clamps_at_both_ends() {
        assert_eq!(apply_volume_delta(50, 5), 55);
        assert_eq!(apply_volume_delta(98, 5), 100);
        assert_eq!(apply_volume_delta(2, -5), 0);
        assert_eq!(apply_volume_delta(0, i32::MIN), 0);
        assert_eq!(apply_volume_delta(100, i32::MAX), 100);
        assert_eq!(apply_volume_delta(40, 0), 40);
    }

    #[tokio::test]
    async fn set_volume_clamps_above_max() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("<Channel>Master</Channel>".into()),
                Matcher::Regex("<DesiredVolume>100</DesiredVolume>".into()),
            ]))
            .with_status(200)
            .with_body(rendering_response("SetVolume", ""))
            .create_async()
            .await;

        set_volume(&Client::new(), &server.url(), "Master", 250)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn relative_volume_clamps_adjustment() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .match_body(Matcher::Regex("<Adjustment>-100</Adjustment>".into()))
            .with_status(200)
            .with_body(rendering_response(
                "SetRelativeVolume",
                "<NewVolume>0</NewVolume>",
            ))
            .create_async()
            .await;

        let new_volume = set_relative_volume(&Client::new(), &server.url(), "Master", -5000)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(new_volume, 0);
    }

    #[tokio::test]
    async fn reads_mute_and_volume_for_channel() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .match_header(
                "SOAPAction",
                "\"urn:schemas-upnp-org:service:RenderingControl:1#GetMute\"",
            )
            .match_body(Matcher::Regex("<Channel>LF</Channel>".into()))
            .with_status(200)
            .with_body(rendering_response("GetMute", "<CurrentMute>1</CurrentMute>"))
            .create_async()
            .await;
        server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .match_header(
                "SOAPAction",
                "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\"",
            )
            .with_status(200)
            .with_body(rendering_response(
                "GetVolume",
                "<CurrentVolume>23</CurrentVolume>",
            ))
            .create_async()
            .await;

        let client = Client::new();
        assert!(get_mute(&client, &server.url(), "LF").await.unwrap());
        assert_eq!(get_volume(&client, &server.url(), "Master").await.unwrap(), 23);
    }
}
