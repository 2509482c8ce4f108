//! Shared pagination types and streaming infrastructure for the YouTube API
//! client.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// Paging details for lists of resources.
///
/// Includes the total number of items available and the number of resources
/// returned in a single page response.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults")]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
}

/// Cursor for stepping through adjacent pages of a list call.
///
/// Every page returned by [`crate::YouTubeClient::api_call`] carries its own
/// cursor, so several independent paginated queries can be walked at the same
/// time. A cursor's tokens are valid only for the exact URL and query that
/// produced them; issuing a different call yields a different cursor rather
/// than invalidating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// The request URL the tokens belong to, including its original query
    /// parameters but never a `pageToken`.
    pub(crate) url: reqwest::Url,
    /// Token for the page after the one this cursor came from.
    pub next_page_token: Option<String>,
    /// Token for the page before the one this cursor came from.
    pub prev_page_token: Option<String>,
}

impl PageCursor {
    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    pub fn has_prev(&self) -> bool {
        self.prev_page_token.is_some()
    }
}

/// One decoded page of an API response, together with the cursor to its
/// neighbors.
#[derive(Debug, Clone)]
pub struct ApiPage {
    /// The decoded JSON body, as returned by the API.
    pub body: serde_json::Value,
    pub cursor: PageCursor,
}

type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = eyre::Result<(F, (VecDeque<T>, Option<String>))>> + 'a + Send>>;

/// A paginated stream that automatically fetches subsequent pages from a
/// YouTube API list endpoint.
///
/// This stream yields items one by one, automatically fetching the next page
/// when the current page is exhausted. Only supports forward pagination; for
/// stepping backwards, use [`crate::YouTubeClient::prev_page`] with an
/// explicit [`PageCursor`].
pub struct PagedStream<'a, T, F> {
    /// Current batch of items from the most recent API response
    current_items: VecDeque<T>,
    /// Future representing the currently pending API request, if any
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Whether we've reached the end of all available data
    is_done: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Create a new PagedStream from the first page of results.
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
    {
        let first_page = async move {
            let results = fetcher(None).await?;
            Ok((fetcher, results))
        };
        Self {
            pending_request: Some(Box::pin(first_page)),
            current_items: VecDeque::new(),
            is_done: false,
        }
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // If we have items in the current batch, return the next one
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            // If we're done (no more pages), return None
            if self.is_done {
                return Poll::Ready(None);
            }

            // If we have a pending request, poll it
            if let Some(pending) = self.pending_request.as_mut() {
                match pending.as_mut().poll(cx) {
                    Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                        // We got the next page
                        self.current_items.extend(items);

                        if let Some(next_token) = next_token {
                            // Set up the future for the next page
                            // (but don't poll it yet)
                            self.pending_request = Some(Box::pin(async move {
                                let results = fetcher(Some(next_token)).await?;
                                Ok((fetcher, results))
                            }));
                        } else {
                            // If no next token, we're done
                            self.is_done = true;
                            self.pending_request = None;
                        }

                        // Continue the loop to try yielding an item
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        // Error fetching next page
                        self.pending_request = None;
                        self.is_done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => {
                        // Still waiting for the response
                        return Poll::Pending;
                    }
                }
            } else {
                // No pending request and no next page token means we're done
                self.is_done = true;
                return Poll::Ready(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn page_info_deserializes_wire_format() {
        let info: PageInfo =
            serde_json::from_value(serde_json::json!({"totalResults": 120, "resultsPerPage": 50}))
                .unwrap();
        assert_eq!(info.total_results, 120);
        assert_eq!(info.results_per_page, 50);
    }

    #[test]
    fn cursor_reports_available_directions() {
        let url = reqwest::Url::parse("https://example.com/list?part=snippet").unwrap();
        let cursor = PageCursor {
            url: url.clone(),
            next_page_token: Some("NEXT".to_string()),
            prev_page_token: None,
        };
        assert!(cursor.has_next());
        assert!(!cursor.has_prev());
    }

    #[tokio::test]
    async fn paged_stream_walks_all_pages_in_order() {
        // Three pages: [1, 2], [3], [4, 5]; tokens "a" then "b" then none.
        let fetcher = |token: Option<String>| async move {
            Ok(match token.as_deref() {
                None => (VecDeque::from([1, 2]), Some("a".to_string())),
                Some("a") => (VecDeque::from([3]), Some("b".to_string())),
                Some("b") => (VecDeque::from([4, 5]), None),
                Some(other) => eyre::bail!("unexpected page token {other}"),
            })
        };
        let stream = PagedStream::new(fetcher);
        let items: Vec<_> = stream
            .collect::<eyre::Result<Vec<_>>>()
            .await
            .expect("all pages fetch cleanly");
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn paged_stream_surfaces_errors_and_stops() {
        let fetcher = |token: Option<String>| async move {
            match token {
                None => Ok((VecDeque::from([1]), Some("a".to_string()))),
                Some(_) => eyre::bail!("page fetch failed"),
            }
        };
        let mut stream = std::pin::pin!(PagedStream::new(fetcher));
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
