//! GENA (UPnP eventing) subscription requests.
//!
//! Handles only the HTTP side of SUBSCRIBE/UNSUBSCRIBE. Receiving the NOTIFY
//! callbacks is up to whoever owns `callback_url`.

use reqwest::{Client, Method};
use thiserror::Error;

use crate::protocol_constants::GENA_SUBSCRIPTION_TIMEOUT_SECS;

use super::services::SonosService;

/// Errors from GENA subscription requests.
#[derive(Debug, Error)]
pub enum GenaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subscription failed with status {0}")]
    SubscriptionFailed(u16),

    #[error("Response did not include a SID header")]
    MissingSid,

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(&'static str),
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

/// Response from a successful GENA subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// The subscription ID returned by the speaker.
    pub sid: String,
    /// The timeout value in seconds for this subscription.
    pub timeout_secs: u64,
}

fn method(name: &'static str) -> GenaResult<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|_| GenaError::InvalidMethod(name))
}

/// Extracts the timeout from a `TIMEOUT: Second-N` header.
///
/// Returns the requested timeout if the header is missing or malformed.
fn extract_timeout_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Second-"))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(GENA_SUBSCRIPTION_TIMEOUT_SECS)
}

/// Sends a SUBSCRIBE request for `service` events.
///
/// # Arguments
/// * `base_url` - Device base URL
/// * `service` - The UPnP service to subscribe to
/// * `callback_url` - URL where NOTIFY events should be sent
pub async fn subscribe(
    client: &Client,
    base_url: &str,
    service: SonosService,
    callback_url: &str,
) -> GenaResult<SubscribeResponse> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), service.event_path());
    log::info!("[GENA] SUBSCRIBE {} -> {}", url, callback_url);

    let response = client
        .request(method("SUBSCRIBE")?, &url)
        .header("CALLBACK", format!("<{}>", callback_url))
        .header("NT", "upnp:event")
        .header("TIMEOUT", format!("Second-{}", GENA_SUBSCRIPTION_TIMEOUT_SECS))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(GenaError::SubscriptionFailed(response.status().as_u16()));
    }

    let sid = response
        .headers()
        .get("SID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(GenaError::MissingSid)?;

    Ok(SubscribeResponse {
        sid,
        timeout_secs: extract_timeout_secs(&response),
    })
}

/// Sends an UNSUBSCRIBE request.
///
/// Returns `false` if the request failed; the subscription expires on its
/// own either way.
pub async fn unsubscribe(client: &Client, base_url: &str, service: SonosService, sid: &str) -> bool {
    let url = format!("{}{}", base_url.trim_end_matches('/'), service.event_path());

    let Ok(unsubscribe) = method("UNSUBSCRIBE") else {
        return false;
    };

    match client.request(unsubscribe, &url).header("SID", sid).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            log::warn!("[GENA] UNSUBSCRIBE {} failed: {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn subscribe_returns_sid_and_timeout() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("SUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .match_header("CALLBACK", "<http://10.0.0.5:7000/notify>")
            .match_header("NT", "upnp:event")
            .with_status(200)
            .with_header("SID", "uuid:RINCON_1-sub-1")
            .with_header("TIMEOUT", "Second-1800")
            .create_async()
            .await;

        let response = subscribe(
            &Client::new(),
            &server.url(),
            SonosService::AVTransport,
            "http://10.0.0.5:7000/notify",
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(response.sid, "uuid:RINCON_1-sub-1");
        assert_eq!(response.timeout_secs, 1800);
    }

    #[tokio::test]
    async fn subscribe_without_sid_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("SUBSCRIBE", "/MediaRenderer/RenderingControl/Event")
            .with_status(200)
            .create_async()
            .await;

        let err = subscribe(
            &Client::new(),
            &server.url(),
            SonosService::RenderingControl,
            "http://10.0.0.5:7000/notify",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenaError::MissingSid));
    }

    #[tokio::test]
    async fn unsubscribe_reports_rejection() {
        let mut server = Server::new_async().await;
        server
            .mock("UNSUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .match_header("SID", "uuid:gone")
            .with_status(412)
            .create_async()
            .await;

        assert!(
            !unsubscribe(&Client::new(), &server.url(), SonosService::AVTransport, "uuid:gone")
                .await
        );
    }
}
