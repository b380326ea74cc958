//! Batch export orchestration: list or accept conversation ids, extract
//! them serially through one shared rate limiter, and fold the session into
//! the requested artifact.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use chatarc_core::conversation::{ConversationFailure, ConversationSummary, ExportSession};
use chatarc_core::render::{render_as, Artifact, ExportFormat};
use chatarc_core::ExportConfig;

use crate::assets::AssetFetcher;
use crate::auth::CredentialSupplier;
use crate::error::Result;
use crate::extractor::{extract_conversation, TraversalProgress};
use crate::listing::{list_conversations, ListProgress};
use crate::mutations::{archive_conversations, delete_conversations, MutationOutcome};
use crate::requester::{PacingConfig, RateLimitedRequester};
use crate::transport::Transport;

/// Progress events surfaced to the caller. Purely advisory; the caller
/// renders them (progress bar, log line) and must never block on them.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Conversation-list pagination advanced.
    List(ListProgress),
    /// Extraction of one conversation is starting.
    ConversationStarted {
        index: usize,
        total: usize,
        conversation_id: String,
    },
    /// Node traversal advanced within the current conversation.
    Traversal {
        conversation_id: String,
        progress: TraversalProgress,
    },
}

/// What one export run hands back: per-id outcome, the populated session,
/// and the rendered artifact awaiting disposition.
#[derive(Debug)]
pub struct ExportOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub session: ExportSession,
    pub artifact: Artifact,
}

/// The extraction pipeline's front door. Owns the shared rate limiter and
/// the per-run asset cache; conversations are processed strictly one at a
/// time because all requests share one pacing budget.
pub struct Exporter {
    requester: RateLimitedRequester,
    assets: AssetFetcher,
    base_url: String,
    page_size: usize,
    conversation_limit: Option<usize>,
}

impl Exporter {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSupplier>,
        config: &ExportConfig,
        cancel: CancellationToken,
    ) -> Exporter {
        Exporter {
            requester: RateLimitedRequester::new(
                transport,
                credentials,
                PacingConfig::from_config(config),
                cancel,
            ),
            assets: AssetFetcher::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            page_size: config.page_size,
            conversation_limit: config.conversation_limit,
        }
    }

    /// Fetch the conversation listing, honoring the configured cap.
    pub async fn list(
        &mut self,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<Vec<ConversationSummary>> {
        list_conversations(
            &mut self.requester,
            &self.base_url,
            self.page_size,
            self.conversation_limit,
            &mut |progress| on_progress(ProgressEvent::List(progress)),
        )
        .await
    }

    /// Extract the given conversations and render the batch as `format`.
    ///
    /// The format string is validated before any network work. Fatal errors
    /// (auth expiry, cancellation) abort immediately; per-conversation
    /// failures are recorded in the session and the batch continues.
    #[instrument(skip_all, fields(count = ids.len(), format))]
    pub async fn export(
        &mut self,
        ids: &[String],
        format: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<ExportOutcome> {
        let format: ExportFormat = format.parse()?;

        let mut session = ExportSession::new();
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for (index, id) in ids.iter().enumerate() {
            on_progress(ProgressEvent::ConversationStarted {
                index,
                total: ids.len(),
                conversation_id: id.clone(),
            });

            let outcome = extract_conversation(
                &mut self.requester,
                &mut self.assets,
                &self.base_url,
                id,
                &mut |progress| {
                    on_progress(ProgressEvent::Traversal {
                        conversation_id: id.clone(),
                        progress,
                    })
                },
            )
            .await;

            match outcome {
                Ok(conv) => {
                    session.conversations.push(conv);
                    successful.push(id.clone());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(conversation_id = %id, error = %err, "conversation extraction failed");
                    session.errors.push(ConversationFailure {
                        conversation_id: id.clone(),
                        error: err.to_string(),
                    });
                    failed.push(id.clone());
                }
            }
        }

        let stats = session.stats();
        info!(
            conversations = stats.total_conversations,
            messages = stats.total_messages,
            files = stats.total_files,
            images = stats.total_images,
            failed = failed.len(),
            "extraction phase complete"
        );

        let artifact = render_as(&session, format)?;
        Ok(ExportOutcome {
            successful,
            failed,
            session,
            artifact,
        })
    }

    pub async fn archive(&mut self, ids: &[String]) -> Result<Vec<MutationOutcome>> {
        archive_conversations(&mut self.requester, &self.base_url, ids).await
    }

    pub async fn delete(&mut self, ids: &[String]) -> Result<Vec<MutationOutcome>> {
        delete_conversations(&mut self.requester, &self.base_url, ids).await
    }
}
