//! ContentDirectory browsing: queue, favorites, music library, playlists.

use reqwest::Client;

use crate::error::SoapResult;
use crate::sonos::didl::parse_didl_items;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapRequestBuilder;
use crate::sonos::types::{BrowseOptions, BrowseResult};

/// Browses the direct children of `object_id`.
///
/// Always requests every property (`Filter=*`) in device order.
pub async fn browse(
    client: &Client,
    base_url: &str,
    object_id: &str,
    options: BrowseOptions,
) -> SoapResult<BrowseResult> {
    log::debug!(
        "[Sonos] Browse {} at {} (start={}, count={})",
        object_id,
        base_url,
        options.start,
        options.count
    );

    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::ContentDirectory)
        .action("Browse")
        .arg("ObjectID", object_id)
        .arg("BrowseFlag", "BrowseDirectChildren")
        .arg("Filter", "*")
        .arg("StartingIndex", options.start.to_string())
        .arg("RequestedCount", options.count.to_string())
        .arg("SortCriteria", "")
        .send()
        .await?;

    let items = response
        .get("Result")
        .map(parse_didl_items)
        .unwrap_or_default();

    Ok(BrowseResult {
        returned: response.parse("NumberReturned").unwrap_or(items.len() as u32),
        total: response.parse("TotalMatches").unwrap_or(0),
        update_id: response.parse("UpdateID").unwrap_or(0),
        items,
    })
}

/// Deletes a ContentDirectory object (used for `SQ:{id}` playlists).
pub async fn destroy_object(client: &Client, base_url: &str, object_id: &str) -> SoapResult<()> {
    log::info!("[Sonos] DestroyObject {} at {}", object_id, base_url);

    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::ContentDirectory)
        .action("DestroyObject")
        .arg("ObjectID", object_id)
        .send()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const QUEUE_DIDL: &str = r#"&lt;DIDL-Lite xmlns:dc=&quot;http://purl.org/dc/elements/1.1/&quot; xmlns:upnp=&quot;urn:schemas-upnp-org:metadata-1-0/upnp/&quot; xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/&quot;&gt;&lt;item id=&quot;Q:0/1&quot; parentID=&quot;Q:0&quot; restricted=&quot;true&quot;&gt;&lt;res&gt;x-file-cifs://nas/a.mp3&lt;/res&gt;&lt;dc:title&gt;Song A&lt;/dc:title&gt;&lt;/item&gt;&lt;/DIDL-Lite&gt;"#;

    fn browse_response(result: &str, returned: u32, total: u32) -> String {
        format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"><Result>{result}</Result><NumberReturned>{returned}</NumberReturned><TotalMatches>{total}</TotalMatches><UpdateID>7</UpdateID></u:BrowseResponse></s:Body></s:Envelope>"#
        )
    }

    #[tokio::test]
    async fn browse_parses_items_and_counts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaServer/ContentDirectory/Control")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("<ObjectID>Q:0</ObjectID>".into()),
                Matcher::Regex("<BrowseFlag>BrowseDirectChildren</BrowseFlag>".into()),
                Matcher::Regex("<RequestedCount>1000</RequestedCount>".into()),
            ]))
            .with_status(200)
            .with_body(browse_response(QUEUE_DIDL, 1, 1))
            .create_async()
            .await;

        let result = browse(
            &Client::new(),
            &server.url(),
            "Q:0",
            BrowseOptions {
                start: 0,
                count: 1000,
            },
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert!(result.has_items());
        assert_eq!(result.update_id, 7);
        assert_eq!(result.items[0].title, "Song A");
        assert_eq!(result.items[0].uri.as_deref(), Some("x-file-cifs://nas/a.mp3"));
    }

    #[tokio::test]
    async fn empty_queue_has_no_items() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/MediaServer/ContentDirectory/Control")
            .with_status(200)
            .with_body(browse_response("", 0, 0))
            .create_async()
            .await;

        let result = browse(&Client::new(), &server.url(), "Q:0", BrowseOptions::default())
            .await
            .unwrap();
        assert!(!result.has_items());
    }

    #[tokio::test]
    async fn destroy_object_targets_saved_queue() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaServer/ContentDirectory/Control")
            .match_header(
                "SOAPAction",
                "\"urn:schemas-upnp-org:service:ContentDirectory:1#DestroyObject\"",
            )
            .match_body(Matcher::Regex("<ObjectID>SQ:12</ObjectID>".into()))
            .with_status(200)
            .with_body(r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:DestroyObjectResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"></u:DestroyObjectResponse></s:Body></s:Envelope>"#)
            .create_async()
            .await;

        destroy_object(&Client::new(), &server.url(), "SQ:12")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
