//! DeviceProperties actions and the UPnP device description document.

use std::time::Duration;

use reqwest::Client;

use crate::error::SoapResult;
use crate::protocol_constants::{DEVICE_DESCRIPTION_PATH, SOAP_TIMEOUT_SECS};
use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapRequestBuilder};
use crate::sonos::types::{DeviceDescription, ZoneAttributes, ZoneInfo};
use crate::sonos::utils::extract_xml_text;

/// Reads network identity (GetZoneInfo). The MAC address builds the queue URI.
pub async fn get_zone_info(client: &Client, base_url: &str) -> SoapResult<ZoneInfo> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::DeviceProperties)
        .action("GetZoneInfo")
        .send()
        .await?;

    Ok(ZoneInfo {
        mac_address: response.require("MACAddress")?.to_string(),
        serial_number: response.get("SerialNumber").unwrap_or_default().to_string(),
        software_version: response
            .get("SoftwareVersion")
            .unwrap_or_default()
            .to_string(),
        ip_address: response.get("IPAddress").unwrap_or_default().to_string(),
    })
}

pub async fn get_zone_attributes(client: &Client, base_url: &str) -> SoapResult<ZoneAttributes> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::DeviceProperties)
        .action("GetZoneAttributes")
        .send()
        .await?;

    Ok(ZoneAttributes {
        zone_name: response.require("CurrentZoneName")?.to_string(),
        icon: response.get("CurrentIcon").unwrap_or_default().to_string(),
    })
}

/// Parses the root device of a device description document.
///
/// Returns `None` unless the document names a room and a UDN.
pub fn parse_device_description(xml: &str) -> Option<DeviceDescription> {
    let text = |name: &str| extract_xml_text(xml, name).unwrap_or_default();

    let description = DeviceDescription {
        room_name: text("roomName"),
        display_name: text("displayName"),
        udn: text("UDN"),
        model_name: text("modelName"),
        model_number: text("modelNumber"),
        serial_num: text("serialNum"),
    };

    if description.room_name.is_empty() || description.udn.is_empty() {
        return None;
    }
    Some(description)
}

/// Fetches `/xml/device_description.xml` with a plain HTTP GET.
pub async fn fetch_device_description(
    client: &Client,
    base_url: &str,
) -> SoapResult<DeviceDescription> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), DEVICE_DESCRIPTION_PATH);
    log::debug!("[Sonos] Fetching device description {}", url);

    let response = client
        .get(&url)
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), body));
    }

    parse_device_description(&body).ok_or(SoapError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const DESCRIPTION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>192.168.1.10 - Sonos Playbar - RINCON_000E58A0123401400</friendlyName>
    <modelNumber>S9</modelNumber>
    <modelName>Sonos Playbar</modelName>
    <serialNum>00-0E-58-A0-12-34:5</serialNum>
    <UDN>uuid:RINCON_000E58A0123401400</UDN>
    <roomName>Living Room</roomName>
    <displayName>Playbar</displayName>
    <deviceList>
      <device><UDN>uuid:RINCON_000E58A0123401400_MR</UDN></device>
    </deviceList>
  </device>
</root>"#;

    #[test]
    fn parses_root_device() {
        let d = parse_device_description(DESCRIPTION).unwrap();
        assert_eq!(d.room_name, "Living Room");
        assert_eq!(d.display_name, "Playbar");
        assert_eq!(d.udn, "uuid:RINCON_000E58A0123401400");
        assert_eq!(d.model_name, "Sonos Playbar");
        assert_eq!(d.model_number, "S9");
    }

    #[test]
    fn rejects_non_sonos_description() {
        assert!(parse_device_description("<root><device><UDN>uuid:x</UDN></device></root>").is_none());
    }

    #[tokio::test]
    async fn fetches_description_over_http() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/xml/device_description.xml")
            .with_status(200)
            .with_body(DESCRIPTION)
            .create_async()
            .await;

        let d = fetch_device_description(&Client::new(), &server.url())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(d.room_name, "Living Room");
    }

    #[tokio::test]
    async fn missing_description_is_http_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/xml/device_description.xml")
            .with_status(404)
            .create_async()
            .await;

        let err = fetch_device_description(&Client::new(), &server.url())
            .await
            .unwrap_err();
        assert!(matches!(err, SoapError::HttpStatus(404, _)));
    }
}
