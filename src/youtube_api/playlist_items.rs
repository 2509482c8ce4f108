//! YouTube PlaylistItems API types and functionality.

use crate::youtube_api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// Contains a list of [`PlaylistItem`] resources that match the request
/// criteria, along with pagination information in [`PageInfo`].
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#playlistItemListResponse`.
    pub kind: String,
    /// A list of playlist items that match the request criteria.
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    /// Token that can be used as the value of the pageToken parameter to retrieve the previous page in the result set.
    #[serde(rename = "prevPageToken")]
    pub prev_page_token: Option<String>,
}

/// A `playlistItem` resource identifies another resource, such as a video,
/// that is included in a playlist.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// The ID that YouTube uses to uniquely identify the playlist item.
    pub id: String,
    /// Contains basic details about the playlist item.
    pub snippet: PlaylistItemSnippet,
}

/// The snippet object contains basic details about the playlist item.
///
/// This is a subset of the full snippet data available from the YouTube API,
/// containing only the fields currently needed by this implementation.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#snippet>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemSnippet {
    /// The date and time that the item was added to the playlist.
    ///
    /// The value is specified in ISO 8601 format.
    #[serde(rename = "publishedAt")]
    pub published_at: Timestamp,
    /// The item's title.
    pub title: String,
    /// The item's description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The order in which the item appears in the playlist. The first item
    /// has position 0.
    pub position: u32,
    /// The ID that YouTube uses to uniquely identify the playlist the item
    /// is in.
    #[serde(rename = "playlistId")]
    pub playlist_id: String,
    /// The id object contains information that identifies the resource
    /// included in the playlist.
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}

/// Identifies the resource a playlist item refers to.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#snippet.resourceId>
#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceId {
    /// The kind, or type, of the referred resource.
    pub kind: String,
    /// The ID that YouTube uses to uniquely identify the referred video.
    ///
    /// Only present if `kind` is `youtube#video`.
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_format() {
        let response: PlaylistItemListResponse = serde_json::from_value(serde_json::json!({
            "kind": "youtube#playlistItemListResponse",
            "items": [
                {
                    "id": "UEwtYWJj",
                    "snippet": {
                        "publishedAt": "2015-03-27T18:09:46Z",
                        "title": "Some video",
                        "description": "About the video",
                        "position": 3,
                        "playlistId": "PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI",
                        "resourceId": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"}
                    }
                }
            ],
            "pageInfo": {"totalResults": 120, "resultsPerPage": 50},
            "nextPageToken": "CAUQAA",
            "prevPageToken": "CAEQAQ"
        }))
        .unwrap();

        assert_eq!(response.items.len(), 1);
        let item = &response.items[0];
        assert_eq!(item.snippet.position, 3);
        assert_eq!(item.snippet.resource_id.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(response.next_page_token.as_deref(), Some("CAUQAA"));
        assert_eq!(response.prev_page_token.as_deref(), Some("CAEQAQ"));
    }
}
