//! Best-effort per-conversation mutations: archive and delete.
//!
//! Each id is mutated independently through the shared rate limiter; one
//! failure never blocks the remaining ids. Only fatal conditions (auth
//! expiry, cancellation) abort the batch.

use serde_json::json;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::requester::RateLimitedRequester;
use crate::transport::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Archive,
    Delete,
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub conversation_id: String,
    pub error: Option<String>,
}

impl MutationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[instrument(skip_all, fields(kind = ?mutation, count = ids.len()))]
pub async fn mutate_conversations(
    requester: &mut RateLimitedRequester,
    base_url: &str,
    ids: &[String],
    mutation: Mutation,
) -> Result<Vec<MutationOutcome>> {
    let mut outcomes = Vec::with_capacity(ids.len());

    for id in ids {
        let url = format!("{}/conversation/{}", base_url, id);
        let result = match mutation {
            Mutation::Archive => {
                requester
                    .execute(Method::Patch, &url, Some(json!({ "is_archived": true })))
                    .await
            }
            Mutation::Delete => requester.execute(Method::Delete, &url, None).await,
        };

        match result {
            Ok(_) => outcomes.push(MutationOutcome {
                conversation_id: id.clone(),
                error: None,
            }),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(conversation_id = %id, error = %err, "mutation failed");
                outcomes.push(MutationOutcome {
                    conversation_id: id.clone(),
                    error: Some(err.to_string()),
                });
            }
        }
    }

    Ok(outcomes)
}

pub async fn archive_conversations(
    requester: &mut RateLimitedRequester,
    base_url: &str,
    ids: &[String],
) -> Result<Vec<MutationOutcome>> {
    mutate_conversations(requester, base_url, ids, Mutation::Archive).await
}

pub async fn delete_conversations(
    requester: &mut RateLimitedRequester,
    base_url: &str,
    ids: &[String],
) -> Result<Vec<MutationOutcome>> {
    mutate_conversations(requester, base_url, ids, Mutation::Delete).await
}
