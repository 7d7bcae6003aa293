//! Transport control commands for Sonos speakers.
//!
//! Provides play, pause, seek, queue and playlist control via AVTransport
//! SOAP actions. Commands that race a source change go through
//! [`with_retry`].

use reqwest::Client;

use crate::error::SoapResult;
use crate::protocol_constants::APPEND_AT_END;
use crate::sonos::didl::{generate_metadata, parse_track_metadata};
use crate::sonos::retry::with_retry;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapRequestBuilder};
use crate::sonos::types::{
    EnqueueResult, MediaInfo, PlayMode, PlaylistEditResult, TrackInfo, TransportState,
    TransportUri,
};
use crate::sonos::utils::{format_hms, parse_hms};

// ─────────────────────────────────────────────────────────────────────────────
// State Queries
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the transport state and maps it to [`TransportState`].
pub async fn get_transport_state(client: &Client, base_url: &str) -> SoapResult<TransportState> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("GetTransportInfo")
        .instance_id()
        .send()
        .await?;

    let raw = response.require("CurrentTransportState")?;
    raw.parse().map_err(|e| {
        log::warn!("[Sonos] {} at {}", e, base_url);
        SoapError::Parse
    })
}

/// Reads the current track and elapsed position.
///
/// `TrackMetaData` is parsed into display metadata and also kept raw so the
/// exact DIDL can be replayed on restore.
pub async fn get_position_info(client: &Client, base_url: &str) -> SoapResult<TrackInfo> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("GetPositionInfo")
        .instance_id()
        .send()
        .await?;

    let raw_metadata = response.get("TrackMetaData").unwrap_or_default().to_string();

    Ok(TrackInfo {
        uri: response.get("TrackURI").unwrap_or_default().to_string(),
        queue_position: response.parse("Track").unwrap_or(0),
        position: response.get("RelTime").and_then(parse_hms).unwrap_or(0),
        duration: response
            .get("TrackDuration")
            .and_then(parse_hms)
            .filter(|d| *d > 0),
        metadata: parse_track_metadata(&raw_metadata),
        raw_metadata,
    })
}

pub async fn get_media_info(client: &Client, base_url: &str) -> SoapResult<MediaInfo> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("GetMediaInfo")
        .instance_id()
        .send()
        .await?;

    Ok(MediaInfo {
        nr_tracks: response.parse("NrTracks").unwrap_or(0),
        current_uri: response.get("CurrentURI").unwrap_or_default().to_string(),
        current_uri_metadata: response
            .get("CurrentURIMetaData")
            .unwrap_or_default()
            .to_string(),
        play_medium: response.get("PlayMedium").unwrap_or_default().to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport URI
// ─────────────────────────────────────────────────────────────────────────────

/// Sets the transport URI and, unless `only_set_uri`, starts playback.
///
/// When `target.metadata` is `None` the URI and metadata are generated from
/// the URI scheme (see [`generate_metadata`]), which may rewrite shorthand
/// URIs such as `radio:s17488`.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Device base URL
/// * `target` - URI, optional metadata and the only-set flag
/// * `spotify_region` - Spotify service region used for generated metadata
pub async fn set_av_transport_uri(
    client: &Client,
    base_url: &str,
    target: &TransportUri,
    spotify_region: &str,
) -> SoapResult<()> {
    let resolved = match &target.metadata {
        Some(_) => target.clone(),
        None => generate_metadata(&target.uri, "", spotify_region),
    };
    let metadata = resolved.metadata.clone().unwrap_or_default();

    log::info!(
        "[Sonos] SetAVTransportURI: {} uri={} only_set={}",
        base_url,
        resolved.uri,
        target.only_set_uri
    );

    with_retry("SetAVTransportURI", || {
        SoapRequestBuilder::new(client, base_url)
            .service(SonosService::AVTransport)
            .action("SetAVTransportURI")
            .instance_id()
            .arg("CurrentURI", &resolved.uri)
            .arg("CurrentURIMetaData", &metadata)
            .send()
    })
    .await?;

    if target.only_set_uri {
        return Ok(());
    }

    play(client, base_url).await
}

/// Builds the queue URI of a device from its MAC address and port.
///
/// `00:0E:58:A0:12:34` on port 1400 yields
/// `x-rincon-queue:RINCON_000E58A0123401400#0`.
#[must_use]
pub fn queue_uri(mac_address: &str, port: u16) -> String {
    let mac: String = mac_address.chars().filter(|c| *c != ':').collect();
    format!("x-rincon-queue:RINCON_{}0{}#0", mac, port)
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Commands
// ─────────────────────────────────────────────────────────────────────────────

pub async fn play(client: &Client, base_url: &str) -> SoapResult<()> {
    log::debug!("[Sonos] Play {}", base_url);

    with_retry("Play", || {
        SoapRequestBuilder::new(client, base_url)
            .service(SonosService::AVTransport)
            .action("Play")
            .instance_id()
            .arg("Speed", "1")
            .send()
    })
    .await?;

    Ok(())
}

pub async fn pause(client: &Client, base_url: &str) -> SoapResult<()> {
    log::debug!("[Sonos] Pause {}", base_url);

    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("Pause")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

/// Stops playback.
///
/// # Note
/// Error 701 ("transition not available") means the speaker is already
/// stopped and is ignored.
pub async fn stop(client: &Client, base_url: &str) -> SoapResult<()> {
    let result = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("Stop")
        .instance_id()
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.fault_code() == Some("701") => {
            log::debug!("[Sonos] Stop: {} already stopped (ignoring 701)", base_url);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn next(client: &Client, base_url: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("Next")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

pub async fn previous(client: &Client, base_url: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("Previous")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

/// Seeks to `seconds` into the current track.
pub async fn seek(client: &Client, base_url: &str, seconds: u32) -> SoapResult<()> {
    let target = format_hms(seconds);

    with_retry("Seek", || {
        SoapRequestBuilder::new(client, base_url)
            .service(SonosService::AVTransport)
            .action("Seek")
            .instance_id()
            .arg("Unit", "REL_TIME")
            .arg("Target", &target)
            .send()
    })
    .await?;

    Ok(())
}

/// Selects the 1-based queue entry `track`.
pub async fn select_track(client: &Client, base_url: &str, track: u32) -> SoapResult<()> {
    let target = track.to_string();

    with_retry("Seek", || {
        SoapRequestBuilder::new(client, base_url)
            .service(SonosService::AVTransport)
            .action("Seek")
            .instance_id()
            .arg("Unit", "TRACK_NR")
            .arg("Target", &target)
            .send()
    })
    .await?;

    Ok(())
}

/// Removes every track from the queue.
pub async fn flush(client: &Client, base_url: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("RemoveAllTracksFromQueue")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────────────────────────────────────

/// Adds a URI to the queue.
///
/// # Arguments
/// * `target` - URI and metadata (generated by the caller)
/// * `position` - Desired 1-based index, `0` to append
/// * `enqueue_as_next` - Insert after the current track
pub async fn add_uri_to_queue(
    client: &Client,
    base_url: &str,
    target: &TransportUri,
    position: u32,
    enqueue_as_next: bool,
) -> SoapResult<EnqueueResult> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("AddURIToQueue")
        .instance_id()
        .arg("EnqueuedURI", &target.uri)
        .arg(
            "EnqueuedURIMetaData",
            target.metadata.clone().unwrap_or_default(),
        )
        .arg("DesiredFirstTrackNumberEnqueued", position.to_string())
        .arg("EnqueueAsNext", if enqueue_as_next { "1" } else { "0" })
        .send()
        .await?;

    Ok(EnqueueResult {
        first_track_number_enqueued: response.parse("FirstTrackNumberEnqueued")?,
        num_tracks_added: response.parse("NumTracksAdded").unwrap_or(0),
        new_queue_length: response.parse("NewQueueLength").unwrap_or(0),
    })
}

pub async fn get_play_mode(client: &Client, base_url: &str) -> SoapResult<PlayMode> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("GetTransportSettings")
        .instance_id()
        .send()
        .await?;

    response
        .require("PlayMode")?
        .parse()
        .map_err(|_| SoapError::Parse)
}

pub async fn set_play_mode(client: &Client, base_url: &str, mode: PlayMode) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("SetPlayMode")
        .instance_id()
        .arg("NewPlayMode", mode.as_str())
        .send()
        .await?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Sonos Playlists (saved queues)
// ─────────────────────────────────────────────────────────────────────────────

/// Creates an empty saved queue titled `title`.
pub async fn create_saved_queue(
    client: &Client,
    base_url: &str,
    title: &str,
) -> SoapResult<PlaylistEditResult> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("CreateSavedQueue")
        .instance_id()
        .arg("Title", title)
        .arg("EnqueuedURI", "")
        .arg("EnqueuedURIMetaData", "")
        .send()
        .await?;

    Ok(PlaylistEditResult {
        num_tracks_added: response.parse("NumTracksAdded").unwrap_or(0),
        new_queue_length: response.parse("NewQueueLength").unwrap_or(0),
        new_update_id: response.parse("NewUpdateID").unwrap_or(0),
        assigned_object_id: response.get("AssignedObjectID").map(str::to_string),
    })
}

/// Appends a URI at the end of the saved queue `object_id` (`SQ:{id}`).
///
/// `update_id` must be the playlist's current UpdateID, as returned by
/// browsing it.
pub async fn add_uri_to_saved_queue(
    client: &Client,
    base_url: &str,
    object_id: &str,
    update_id: u32,
    target: &TransportUri,
) -> SoapResult<PlaylistEditResult> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("AddURIToSavedQueue")
        .instance_id()
        .arg("ObjectID", object_id)
        .arg("UpdateID", update_id.to_string())
        .arg("EnqueuedURI", &target.uri)
        .arg(
            "EnqueuedURIMetaData",
            target.metadata.clone().unwrap_or_default(),
        )
        .arg("AddAtIndex", APPEND_AT_END.to_string())
        .send()
        .await?;

    Ok(PlaylistEditResult {
        num_tracks_added: response.parse("NumTracksAdded").unwrap_or(0),
        new_queue_length: response.parse("NewQueueLength").unwrap_or(0),
        new_update_id: response.parse("NewUpdateID").unwrap_or(0),
        assigned_object_id: None,
    })
}

/// Makes the device leave its group (BecomeCoordinatorOfStandaloneGroup).
pub async fn leave_group(client: &Client, base_url: &str) -> SoapResult<()> {
    log::info!("[Sonos] {} leaving group", base_url);

    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("BecomeCoordinatorOfStandaloneGroup")
        .instance_id()
        .send()
        .await?;

    Ok(())
}
