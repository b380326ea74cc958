//! Paginated conversation listing.

use tracing::{debug, instrument};

use chatarc_core::conversation::{ConversationPage, ConversationSummary};

use crate::error::{ClientError, Result};
use crate::requester::RateLimitedRequester;
use crate::transport::Method;

/// Listing progress: conversations fetched so far against the server's
/// reported total.
#[derive(Debug, Clone, Copy)]
pub struct ListProgress {
    pub fetched: usize,
    pub total: usize,
}

/// Fold `GET conversations?offset=&limit=` pages until the server total is
/// reached, the server stops returning items, or the configured cap is hit.
/// The cap is configuration, not a constant; `None` means unlimited.
#[instrument(skip_all)]
pub async fn list_conversations(
    requester: &mut RateLimitedRequester,
    base_url: &str,
    page_size: usize,
    limit: Option<usize>,
    on_progress: &mut dyn FnMut(ListProgress),
) -> Result<Vec<ConversationSummary>> {
    let mut items: Vec<ConversationSummary> = Vec::new();
    let mut total = 0usize;

    loop {
        let batch = match limit {
            Some(cap) => page_size.min(cap.saturating_sub(items.len())),
            None => page_size,
        };
        if batch == 0 {
            debug!(cap = ?limit, "conversation cap reached");
            break;
        }

        let url = format!(
            "{}/conversations?offset={}&limit={}",
            base_url,
            items.len(),
            batch
        );
        let response = requester.execute(Method::Get, &url, None).await?;
        let page: ConversationPage = serde_json::from_slice(&response.body)
            .map_err(|err| ClientError::decode("conversation listing", err))?;

        if page.items.is_empty() {
            break;
        }
        total = page.total;
        items.extend(page.items);
        on_progress(ListProgress {
            fetched: items.len(),
            total,
        });

        if items.len() >= total {
            break;
        }
    }

    debug!(fetched = items.len(), total, "conversation listing complete");
    Ok(items)
}
