//! Page-number pagination over listing endpoints.
//!
//! Pages are requested strictly in order starting at 1; page N+1 is only
//! requested after page N has been observed non-empty. An empty page ends the
//! sequence. A failed page ends it with an error so a truncated walk is never
//! mistaken for an exhausted one.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};

use crate::error::ScraperError;
use crate::types::RawItem;

/// Lazily walks pages `1..` via `fetch_page`, yielding every item in order.
///
/// `max_pages` is a safety ceiling against a server that never returns an
/// empty page. Requesting a page beyond it yields
/// [`ScraperError::PaginationLimit`]. `inter_page_delay` is slept before every
/// page after the first; that sleep only ends early when the stream is
/// dropped, so callers that cancel by token pass zero and pause inside
/// `fetch_page` instead.
///
/// The error type is left to the caller so a page fetch can be wrapped in
/// extra gating (permits, cancellation) that fails in its own way.
///
/// The stream is not restartable: calling `paginate` again re-walks from
/// page 1.
pub fn paginate<F, Fut, E>(
    context: String,
    max_pages: u32,
    inter_page_delay: Duration,
    fetch_page: F,
) -> impl Stream<Item = Result<RawItem, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<RawItem>, E>>,
    E: From<ScraperError>,
{
    let pages = stream::try_unfold(
        (fetch_page, 1u32),
        move |(mut fetch_page, page)| {
            let context = context.clone();
            async move {
                if page > max_pages {
                    return Err(E::from(ScraperError::PaginationLimit {
                        context,
                        max_pages,
                    }));
                }
                if page > 1 && !inter_page_delay.is_zero() {
                    tokio::time::sleep(inter_page_delay).await;
                }

                let items = fetch_page(page).await?;
                if items.is_empty() {
                    tracing::debug!(%context, page, "empty page, listing exhausted");
                    return Ok(None);
                }

                tracing::debug!(%context, page, count = items.len(), "fetched listing page");
                Ok(Some((items, (fetch_page, page + 1))))
            }
        },
    );

    pages
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
}
