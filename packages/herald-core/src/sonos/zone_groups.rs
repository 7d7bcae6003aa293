//! Zone group topology parsing and retrieval.
//!
//! Handles parsing ZoneGroupState XML into structured `ZoneGroup` data
//! and fetching topology from Sonos speakers via SOAP.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::error::SoapResult;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapRequestBuilder;
use crate::sonos::types::{ZoneGroup, ZoneGroupMember};
use crate::sonos::utils::{extract_host_port, get_xml_attr};

/// Parses ZoneGroupState XML into a vector of ZoneGroup structures.
///
/// Expects the raw ZoneGroupState XML (already unescaped).
///
/// # Filtering
/// - Zone Bridges (`IsZoneBridge="1"`) are skipped as they cannot play audio.
/// - Members without a parsable `Location` are skipped.
/// - Groups left without members, or whose coordinator was skipped, are dropped.
///
/// # Naming
/// A group is named after its coordinator's room. When members of other
/// rooms are joined, ` + N` is appended, N being the number of those rooms.
/// Stereo pairs and home-theater satellites share the coordinator's room and
/// do not count.
pub fn parse_zone_group_xml(xml: &str) -> Vec<ZoneGroup> {
    let mut groups = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut current_group_id = String::new();
    let mut current_coordinator_uuid: Option<String> = None;
    let mut current_members: Vec<ZoneGroupMember> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"ZoneGroup" => {
                    current_group_id = get_xml_attr(e, b"ID").unwrap_or_default();
                    current_coordinator_uuid = get_xml_attr(e, b"Coordinator");
                    current_members.clear();
                }
                b"ZoneGroupMember" | b"Satellite" => {
                    let is_bridge = get_xml_attr(e, b"IsZoneBridge").as_deref() == Some("1");
                    let member = get_xml_attr(e, b"UUID").filter(|_| !is_bridge).and_then(|uuid| {
                        let location = get_xml_attr(e, b"Location")?;
                        let (host, port) = extract_host_port(&location)?;
                        let zone_name = get_xml_attr(e, b"ZoneName")?;
                        Some(ZoneGroupMember {
                            uuid,
                            host,
                            port,
                            zone_name,
                        })
                    });

                    if let Some(member) = member {
                        current_members.push(member);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"ZoneGroup" => {
                if let Some(group) = finish_group(
                    &current_group_id,
                    current_coordinator_uuid.take(),
                    std::mem::take(&mut current_members),
                ) {
                    groups.push(group);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("[Sonos] XML parse error in zone groups: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    groups
}

fn finish_group(
    id: &str,
    coordinator_uuid: Option<String>,
    members: Vec<ZoneGroupMember>,
) -> Option<ZoneGroup> {
    let coordinator_uuid = coordinator_uuid?;
    let coordinator = members.iter().find(|m| m.uuid == coordinator_uuid)?.clone();

    let mut other_rooms: Vec<&str> = Vec::new();
    for m in &members {
        let name = m.zone_name.as_str();
        if name != coordinator.zone_name && !other_rooms.contains(&name) {
            other_rooms.push(name);
        }
    }

    let name = if other_rooms.is_empty() {
        coordinator.zone_name.clone()
    } else {
        format!("{} + {}", coordinator.zone_name, other_rooms.len())
    };

    Some(ZoneGroup {
        id: id.to_string(),
        name,
        coordinator_uuid,
        coordinator_host: coordinator.host,
        coordinator_port: coordinator.port,
        members,
    })
}

/// Fetches the current zone groups from a Sonos speaker and parses the topology.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Base URL of any Sonos speaker on the network
pub async fn get_zone_groups(client: &Client, base_url: &str) -> SoapResult<Vec<ZoneGroup>> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::ZoneGroupTopology)
        .action("GetZoneGroupState")
        .send()
        .await?;

    let Some(state) = response.get("ZoneGroupState") else {
        return Ok(vec![]);
    };

    Ok(parse_zone_group_xml(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_xml(uuid: &str, ip: &str, zone_name: &str) -> String {
        format!(
            r#"<ZoneGroupMember UUID="{uuid}" Location="http://{ip}:1400/xml/device_description.xml" ZoneName="{zone_name}" Icon="x-rincon-roomicon:living" />"#
        )
    }

    fn group_xml(id: &str, coordinator_uuid: &str, members: &[String]) -> String {
        format!(
            r#"<ZoneGroup Coordinator="{coordinator_uuid}" ID="{id}">{}</ZoneGroup>"#,
            members.join("")
        )
    }

    fn zone_groups_xml(groups: &[String]) -> String {
        format!("<ZoneGroupState><ZoneGroups>{}</ZoneGroups></ZoneGroupState>", groups.join(""))
    }

    #[test]
    fn single_speaker_uses_zone_name() {
        let xml = zone_groups_xml(&[group_xml(
            "G1",
            "RINCON_KITCHEN",
            &[member_xml("RINCON_KITCHEN", "192.168.1.10", "Kitchen")],
        )]);

        let groups = parse_zone_group_xml(&xml);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Kitchen");
        assert_eq!(groups[0].coordinator_host, "192.168.1.10");
        assert_eq!(groups[0].coordinator_port, 1400);
    }

    #[test]
    fn joined_rooms_are_counted() {
        let xml = zone_groups_xml(&[group_xml(
            "G1",
            "RINCON_OFFICE",
            &[
                member_xml("RINCON_KITCHEN", "192.168.1.10", "Kitchen"),
                member_xml("RINCON_OFFICE", "192.168.1.20", "Office"),
                member_xml("RINCON_BEDROOM", "192.168.1.30", "Bedroom"),
            ],
        )]);

        let groups = parse_zone_group_xml(&xml);
        assert_eq!(groups[0].name, "Office + 2");
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn home_theater_satellites_do_not_count() {
        let xml = zone_groups_xml(&[group_xml(
            "G1",
            "RINCON_BAR",
            &[
                member_xml("RINCON_BAR", "192.168.1.10", "Living Room"),
                member_xml("RINCON_SUB", "192.168.1.11", "Living Room"),
            ],
        )]);

        assert_eq!(parse_zone_group_xml(&xml)[0].name, "Living Room");
    }

    #[test]
    fn zone_bridges_are_skipped() {
        let bridge = r#"<ZoneGroupMember UUID="RINCON_BOOST" Location="http://192.168.1.2:1400/xml/device_description.xml" ZoneName="BOOST" IsZoneBridge="1" />"#;
        let xml = zone_groups_xml(&[
            group_xml("G0", "RINCON_BOOST", &[bridge.to_string()]),
            group_xml(
                "G1",
                "RINCON_KITCHEN",
                &[member_xml("RINCON_KITCHEN", "192.168.1.10", "Kitchen")],
            ),
        ]);

        let groups = parse_zone_group_xml(&xml);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "G1");
    }
}
