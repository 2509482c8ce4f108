//! YouTube Data API v3 client library.
//!
//! This module provides a thin client for the YouTube Data API v3: a generic
//! parameterized GET wrapper with JSON decoding and page-token tracking, plus
//! typed helpers for the resources this crate consumes.
//!
//! # Pagination
//!
//! Most list endpoints cap a single response at 50 items and hand out opaque
//! `nextPageToken`/`prevPageToken` cursors for the adjacent pages. Two styles
//! of paging are supported:
//!
//! * **Cursor stepping** — every [`client::YouTubeClient::api_call`] returns
//!   an [`types::ApiPage`] carrying a [`types::PageCursor`]; pass it to
//!   [`client::YouTubeClient::next_page`] or
//!   [`client::YouTubeClient::prev_page`] to walk in either direction.
//!   Cursors are independent values, so several queries can be walked at
//!   once.
//! * **Streaming** — the typed list helpers return a [`types::PagedStream`]
//!   that yields items one by one and fetches further pages behind the
//!   scenes (forward only).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_api_access::YouTubeClient;
//! use tokio_stream::StreamExt;
//!
//! # async fn example(client: YouTubeClient) -> eyre::Result<()> {
//! let items = client.list_playlist_items("PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI");
//! let mut items = std::pin::pin!(items);
//! while let Some(item) = items.next().await {
//!     let item = item?;
//!     println!("{}: {}", item.snippet.position, item.snippet.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod playlist_items;
pub mod types;
pub mod videos;

// Re-export main types for convenience
pub use client::{SessionExpired, YouTubeClient};
pub use types::{ApiPage, PageCursor, PageInfo, PagedStream};

// Re-export commonly used types from each module
pub use channels::{Channel, ChannelSnippet};

pub use playlist_items::{PlaylistItem, PlaylistItemSnippet, ResourceId};

pub use videos::{Video, VideoSnippet, VideoStatistics};
