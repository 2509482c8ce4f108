//! Core YouTube API client functionality.

use crate::session::Session;
use crate::youtube_api::{
    channels::{Channel, ChannelListResponse},
    playlist_items::{PlaylistItem, PlaylistItemListResponse},
    types::{ApiPage, PageCursor, PagedStream},
    videos::{Video, VideoListResponse},
};
use eyre::Context;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use tokio_stream::Stream;
use tracing::instrument;

/// Base URL for YouTube Data API v3 resource endpoints.
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Marker error for API responses carrying an `error` field.
///
/// The API reporting an error is treated uniformly as session expiry: by the
/// time this error surfaces, the stored session has already been destroyed.
/// Callers recover by running the consent flow again.
#[derive(Debug)]
pub struct SessionExpired;

impl fmt::Display for SessionExpired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the API rejected the call; the session has expired and was destroyed")
    }
}

impl std::error::Error for SessionExpired {}

/// Client for interacting with the YouTube Data API v3.
///
/// The client holds the bearer token from an established [`Session`] and a
/// single HTTP client that is reused across all API calls. The token is
/// immutable; when the API rejects it, the session file is torn down and
/// every further call fails with [`SessionExpired`] until a new session is
/// established.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// Access token from the stored session.
    access_token: String,
    /// Where the session lives on disk, so an API-level error can destroy it.
    session_path: PathBuf,
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Resource endpoint base; overridden in tests.
    api_base: String,
}

impl YouTubeClient {
    /// Creates a new client for the given established session.
    ///
    /// `session_path` must point at the file the session was loaded from (or
    /// saved to); it is removed when the API reports an error.
    pub fn new(session: &Session, session_path: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            access_token: session.access_token().to_string(),
            session_path: session_path.into(),
            client,
            api_base: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The value of the single `Authorization` header sent with every call.
    pub(crate) fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Sets up a call against `url` with the given query parameters, performs
    /// it, and returns the first result page.
    ///
    /// The parameters are appended to the URL in insertion order. The
    /// response body is decoded as JSON:
    ///
    /// * a body with an `error` field destroys the stored session and fails
    ///   with [`SessionExpired`], whatever the error's content;
    /// * an empty body yields `Ok(None)`;
    /// * anything else is returned as an [`ApiPage`] whose [`PageCursor`]
    ///   captures the response's `nextPageToken`/`prevPageToken`.
    #[instrument(skip(self), ret, level = tracing::Level::TRACE)]
    pub async fn api_call(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> eyre::Result<Option<ApiPage>> {
        let mut url = reqwest::Url::parse(url).with_context(|| format!("parse API URL {url}"))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        self.fetch_page(url).await
    }

    /// Fetches the result page after the one `cursor` came from, or `Ok(None)`
    /// if that page had no successor.
    ///
    /// The returned page carries a fresh cursor with both tokens taken from
    /// the new response.
    #[instrument(skip(self), ret, level = tracing::Level::TRACE)]
    pub async fn next_page(&self, cursor: &PageCursor) -> eyre::Result<Option<ApiPage>> {
        let Some(token) = &cursor.next_page_token else {
            return Ok(None);
        };
        self.turn_page(cursor, token).await
    }

    /// Fetches the result page before the one `cursor` came from, or
    /// `Ok(None)` if that page had no predecessor.
    #[instrument(skip(self), ret, level = tracing::Level::TRACE)]
    pub async fn prev_page(&self, cursor: &PageCursor) -> eyre::Result<Option<ApiPage>> {
        let Some(token) = &cursor.prev_page_token else {
            return Ok(None);
        };
        self.turn_page(cursor, token).await
    }

    /// Re-issues the cursor's call with a `pageToken` query parameter
    /// appended.
    async fn turn_page(&self, cursor: &PageCursor, token: &str) -> eyre::Result<Option<ApiPage>> {
        let mut url = cursor.url.clone();
        url.query_pairs_mut().append_pair("pageToken", token);
        let page = self.fetch_page(url).await?;
        // The fresh cursor must keep pointing at the base call, not at the
        // pageToken-carrying URL it was fetched through.
        Ok(page.map(|mut page| {
            page.cursor.url = cursor.url.clone();
            page
        }))
    }

    /// The shared GET-decode-inspect path behind every API call.
    async fn fetch_page(&self, url: reqwest::Url) -> eyre::Result<Option<ApiPage>> {
        let response = self
            .client
            .get(url.clone())
            .header(http::header::AUTHORIZATION, self.bearer_header())
            .send()
            .await
            .with_context(|| format!("send GET request to YouTube API: {url}"))?;

        let status = response.status();
        let body = response.text().await.context("read API response body")?;
        let body: serde_json::Value = serde_json::from_str(&body)
            .with_context(|| format!("decode API response as JSON (status {status})"))?;

        // The API reporting an error usually means the session has expired.
        // Tear it down so the next run restarts the consent flow.
        if body.get("error").is_some() {
            tracing::warn!(%url, %status, "API reported an error, destroying session");
            Session::destroy(&self.session_path)
                .await
                .context("destroy expired session")?;
            return Err(eyre::Report::new(SessionExpired));
        }

        if body.as_object().is_none_or(|map| map.is_empty()) {
            return Ok(None);
        }

        let page_token = |field: &str| {
            body.get(field)
                .and_then(|token| token.as_str())
                .map(String::from)
        };
        let cursor = PageCursor {
            next_page_token: page_token("nextPageToken"),
            prev_page_token: page_token("prevPageToken"),
            url,
        };
        Ok(Some(ApiPage { body, cursor }))
    }

    /// Issues a list call and parses the page into a typed response.
    async fn list_resource<R: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> eyre::Result<R> {
        let url = format!("{}/{resource}", self.api_base);
        let Some(page) = self.api_call(&url, params).await? else {
            eyre::bail!("{resource} returned an empty response");
        };
        serde_json::from_value(page.body)
            .with_context(|| format!("parse YouTube {resource} API response"))
    }

    /// Validates the session token by making a minimal API call.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token is valid and can be used for API calls
    /// * `Ok(false)` - Token was rejected (the session file is gone by then)
    /// * `Err(_)` - Network or other error occurred during validation
    #[instrument(skip(self), ret)]
    pub async fn validate_token(&self) -> eyre::Result<bool> {
        match self.list_channels_internal(1, None).await {
            Ok(_) => {
                tracing::debug!("YouTube API token validation successful");
                Ok(true)
            }
            Err(e) if e.is::<SessionExpired>() => {
                tracing::warn!("YouTube API token validation failed: {e}");
                Ok(false)
            }
            Err(e) => Err(e).context("validate token"),
        }
    }

    /// Returns a paginated stream of the items in a playlist.
    ///
    /// Uses the `playlistItems.list` API with `part=snippet` and the API's
    /// maximum page size of 50. The stream automatically handles pagination
    /// and fetches subsequent pages as needed.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    /// * `https://www.googleapis.com/auth/youtube`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip_all)]
    pub fn list_playlist_items<S: Into<String>>(
        &self,
        playlist_id: S,
    ) -> impl Stream<Item = eyre::Result<PlaylistItem>> + use<'_, S> {
        let playlist_id = playlist_id.into();
        PagedStream::new(move |page_token| {
            let playlist_id = playlist_id.clone();
            async move {
                let response = self
                    .list_playlist_items_internal(&playlist_id, 50, page_token)
                    .await?;
                Ok((response.items, response.next_page_token))
            }
        })
    }

    /// Returns a paginated stream of YouTube channels owned by the
    /// authenticated user.
    ///
    /// Uses the `channels.list` API with `mine=true`. This typically returns
    /// one channel for personal accounts, but may return multiple channels
    /// for content creators or organizations with multiple channels.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    /// * `https://www.googleapis.com/auth/youtube`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self))]
    pub fn list_my_channels(&self) -> impl Stream<Item = eyre::Result<Channel>> + use<'_> {
        PagedStream::new(|page_token| async {
            let response = self.list_channels_internal(50, page_token).await?;
            Ok((response.items, response.next_page_token))
        })
    }

    /// Gets snippet and statistics for a single YouTube video by its ID.
    ///
    /// Uses the `videos.list` API to fetch the video's title, view count,
    /// like count, comment count, and other engagement metrics.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    /// * `https://www.googleapis.com/auth/youtube`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self), ret)]
    pub async fn get_video_metadata(&self, video_id: &str) -> eyre::Result<Video> {
        let params = [("part", "snippet,statistics"), ("id", video_id)];
        let videos: VideoListResponse = self.list_resource("videos", &params).await?;

        tracing::debug!(
            video_id,
            returned_items = videos.items.len(),
            "fetched video metadata"
        );

        videos
            .items
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("video not found: {}", video_id))
    }

    /// Internal method to call the `playlistItems.list` API with configurable
    /// parameters.
    ///
    /// # Arguments
    ///
    /// * `playlist_id` - The playlist whose items to list
    /// * `max_results` - Maximum number of items to return per page (1-50)
    /// * `page_token` - Token for retrieving a specific page of results
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    async fn list_playlist_items_internal(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let max_results_string = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("maxResults", max_results_string.as_str()),
            ("playlistId", playlist_id),
        ];

        // Add pageToken if provided
        if let Some(ref token) = page_token {
            params.push(("pageToken", token.as_str()));
        }

        let items: PlaylistItemListResponse = self.list_resource("playlistItems", &params).await?;

        tracing::debug!(
            playlist_id,
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            "fetched playlist items"
        );

        Ok(items)
    }

    /// Internal method to call the `channels.list` API with configurable
    /// parameters. Uses `mine=true` to retrieve only channels owned by the
    /// authenticated user.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    async fn list_channels_internal(
        &self,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<ChannelListResponse> {
        let max_results_string = max_results.to_string();
        let mut params = vec![
            ("part", "id,snippet"),
            ("mine", "true"),
            ("maxResults", max_results_string.as_str()),
        ];

        // Add pageToken if provided
        if let Some(ref token) = page_token {
            params.push(("pageToken", token.as_str()));
        }

        let channels: ChannelListResponse = self.list_resource("channels", &params).await?;

        tracing::debug!(
            total_results = channels.page_info.total_results,
            returned_items = channels.items.len(),
            "fetched channels"
        );

        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use httpmock::prelude::*;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, StandardTokenResponse};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use tokio_stream::StreamExt;

    fn fake_session(secret: &str) -> Session {
        Session::new(
            StandardTokenResponse::new(
                AccessToken::new(secret.to_string()),
                BasicTokenType::Bearer,
                EmptyExtraTokenFields {},
            ),
            "nonce".to_string(),
        )
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "yt-api-client-{}-{name}.json",
            std::process::id()
        ))
    }

    fn client_for(server: &MockServer, session_path: PathBuf) -> YouTubeClient {
        YouTubeClient::new(&fake_session("tok"), session_path, reqwest::Client::new())
            .with_api_base(server.base_url())
    }

    #[test]
    fn params_are_appended_in_insertion_order() {
        let mut url = reqwest::Url::parse("https://www.googleapis.com/youtube/v3/playlistItems")
            .unwrap();
        url.query_pairs_mut()
            .extend_pairs([("part", "snippet"), ("maxResults", "50")]);
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/youtube/v3/playlistItems?part=snippet&maxResults=50"
        );
    }

    #[tokio::test]
    async fn api_call_sends_bearer_header_from_session() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search")
                    .query_param("part", "snippet")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({"kind": "youtube#searchListResponse"}));
            })
            .await;

        let client = client_for(&server, scratch_path("bearer"));
        let page = client
            .api_call(&server.url("/search"), &[("part", "snippet")])
            .await
            .unwrap()
            .expect("non-empty response");

        mock.assert_async().await;
        assert_eq!(page.body["kind"], "youtube#searchListResponse");
        assert!(!page.cursor.has_next());
        assert!(!page.cursor.has_prev());
    }

    #[tokio::test]
    async fn api_call_reports_empty_bodies_as_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/empty");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = client_for(&server, scratch_path("empty"));
        let page = client.api_call(&server.url("/empty"), &[]).await.unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn error_field_destroys_session_and_fails() {
        let path = scratch_path("expired");
        fake_session("tok").save(&path).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/videos");
                then.status(401).json_body(json!({
                    "error": {"code": 401, "message": "Invalid Credentials"}
                }));
            })
            .await;

        let client = client_for(&server, path.clone());
        let err = client
            .api_call(&server.url("/videos"), &[("id", "abc")])
            .await
            .expect_err("error responses must fail the call");

        assert!(err.is::<SessionExpired>());
        assert!(!path.exists(), "session file must be destroyed");
    }

    #[tokio::test]
    async fn next_page_reissues_call_with_page_token() {
        let server = MockServer::start_async().await;
        let mut first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/playlistItems")
                    .query_param("part", "snippet");
                then.status(200)
                    .json_body(json!({"items": [1, 2], "nextPageToken": "X"}));
            })
            .await;

        let client = client_for(&server, scratch_path("paging"));
        let page = client
            .api_call(&server.url("/playlistItems"), &[("part", "snippet")])
            .await
            .unwrap()
            .expect("first page");
        first.assert_async().await;
        first.delete_async().await;
        assert_eq!(page.cursor.next_page_token.as_deref(), Some("X"));

        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/playlistItems")
                    .query_param("part", "snippet")
                    .query_param("pageToken", "X");
                then.status(200)
                    .json_body(json!({"items": [3], "prevPageToken": "W"}));
            })
            .await;
        let next = client
            .next_page(&page.cursor)
            .await
            .unwrap()
            .expect("second page");
        second.assert_async().await;
        assert_eq!(next.body["items"], json!([3]));
        // The new cursor steps backwards from the second page, and has no
        // further next page.
        assert_eq!(next.cursor.prev_page_token.as_deref(), Some("W"));
        assert!(!next.cursor.has_next());
        assert_eq!(next.cursor.url, page.cursor.url);

        // Stepping forward again without a token is a clean no-op.
        assert!(client.next_page(&next.cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prev_page_requires_a_cursor() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, scratch_path("no-prev"));
        let cursor = crate::youtube_api::types::PageCursor {
            url: reqwest::Url::parse(&server.url("/playlistItems")).unwrap(),
            next_page_token: None,
            prev_page_token: None,
        };
        assert!(client.prev_page(&cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn playlist_stream_walks_every_page() {
        let server = MockServer::start_async().await;
        let mut first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/playlistItems")
                    .query_param("playlistId", "PL123");
                then.status(200).json_body(json!({
                    "kind": "youtube#playlistItemListResponse",
                    "items": [
                        {
                            "id": "a",
                            "snippet": {
                                "publishedAt": "2024-05-01T10:00:00Z",
                                "title": "First",
                                "position": 0,
                                "playlistId": "PL123",
                                "resourceId": {"kind": "youtube#video", "videoId": "v1"}
                            }
                        }
                    ],
                    "pageInfo": {"totalResults": 2, "resultsPerPage": 1},
                    "nextPageToken": "P2"
                }));
            })
            .await;

        let client = client_for(&server, scratch_path("stream"));
        let items = client.list_playlist_items("PL123");
        let mut items = std::pin::pin!(items);

        let first_item = items
            .next()
            .await
            .expect("first page has one item")
            .expect("first page fetches cleanly");
        assert_eq!(first_item.snippet.title, "First");
        first.assert_async().await;

        // The stream only fetches the second page once the first is drained;
        // swap the mock so the pageToken request gets a distinct response.
        first.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/playlistItems")
                    .query_param("playlistId", "PL123")
                    .query_param("pageToken", "P2");
                then.status(200).json_body(json!({
                    "kind": "youtube#playlistItemListResponse",
                    "items": [
                        {
                            "id": "b",
                            "snippet": {
                                "publishedAt": "2024-05-02T10:00:00Z",
                                "title": "Second",
                                "position": 1,
                                "playlistId": "PL123",
                                "resourceId": {"kind": "youtube#video", "videoId": "v2"}
                            }
                        }
                    ],
                    "pageInfo": {"totalResults": 2, "resultsPerPage": 1},
                    "prevPageToken": "P1"
                }));
            })
            .await;

        let second_item = items
            .next()
            .await
            .expect("second page has one item")
            .expect("second page fetches cleanly");
        assert_eq!(second_item.snippet.title, "Second");
        assert_eq!(second_item.snippet.resource_id.video_id.as_deref(), Some("v2"));
        assert!(items.next().await.is_none(), "no third page");
    }

    #[tokio::test]
    async fn validate_token_maps_rejection_to_false() {
        let path = scratch_path("validate");
        fake_session("tok").save(&path).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/channels");
                then.status(403).json_body(json!({
                    "error": {"code": 403, "message": "quotaExceeded"}
                }));
            })
            .await;

        let client = client_for(&server, path.clone());
        assert!(!client.validate_token().await.unwrap());
        assert!(!path.exists());
    }
}
