use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conversation::{ConversationFailure, ExportSession, ExtractedConversation, SessionStats};

/// The single-document JSON export shape. Conversations serialize with full
/// message arrays and reference-only asset maps; binary payloads are never
/// embedded inline (the `Asset` serializer skips them).
#[derive(Debug, Serialize)]
pub struct SessionDocument<'a> {
    pub exported_at: DateTime<Utc>,
    pub session_id: &'a str,
    pub stats: SessionStats,
    pub errors: &'a [ConversationFailure],
    pub conversations: &'a [ExtractedConversation],
}

pub fn session_document(session: &ExportSession) -> SessionDocument<'_> {
    SessionDocument {
        // The session start doubles as the export timestamp so rendering the
        // same session twice yields identical bytes.
        exported_at: session.started,
        session_id: &session.id,
        stats: session.stats(),
        errors: &session.errors,
        conversations: &session.conversations,
    }
}
