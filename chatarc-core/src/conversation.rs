use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Wire types: the backend API's conversation shapes, deserialized as-is.
// ---------------------------------------------------------------------------

/// One entry in a conversation's node mapping. A node without a `message`
/// payload is a structural placeholder (typically the conversation root) and
/// still carries children that must be traversed.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageNode {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub message: Option<NodeMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeMessage {
    pub id: String,
    pub author: NodeAuthor,
    #[serde(default)]
    pub create_time: Option<f64>,
    pub content: NodeContent,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeAuthor {
    pub role: String,
}

/// Message content in any of the API's shapes: plain text parts, multimodal
/// parts (strings mixed with asset-pointer objects), or a single `text` blob
/// for code and execution-output messages.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeContent {
    pub content_type: String,
    #[serde(default)]
    pub parts: Option<Vec<Value>>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Full conversation detail as returned by `GET conversation/{id}`.
///
/// The payload carries the id under `conversation_id` on newer responses and
/// `id` on older ones, sometimes both, so both are kept and resolved lazily.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetail {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub default_model_slug: Option<String>,
    pub mapping: HashMap<String, MessageNode>,
    #[serde(default)]
    pub current_node: Option<String>,
}

impl ConversationDetail {
    pub fn conversation_id(&self) -> &str {
        self.conversation_id
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or_default()
    }
}

/// One row of the paginated conversation listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// One page of `GET conversations?offset=&limit=`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationPage {
    #[serde(default)]
    pub items: Vec<ConversationSummary>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// Extracted model: what the pipeline produces and the renderers consume.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other,
}

impl Role {
    pub fn from_api(value: &str) -> Role {
        match value {
            "system" => Role::System,
            "user" | "human" => Role::User,
            "assistant" => Role::Assistant,
            "tool" | "function" => Role::Tool,
            _ => Role::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
            Role::Other => "Other",
        }
    }
}

/// One ordered piece of a processed message: verbatim text or a reference to
/// an asset registered on the owning conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    AssetRef { asset_id: String },
}

impl Segment {
    pub fn text(value: impl Into<String>) -> Segment {
        Segment::Text { text: value.into() }
    }

    pub fn asset(id: impl Into<String>) -> Segment {
        Segment::AssetRef {
            asset_id: id.into(),
        }
    }
}

/// A processed message. `id` and `parent_id` are mapping node ids, so the
/// tree builder can regroup messages without consulting the source mapping.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedMessage {
    pub id: String,
    pub parent_id: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub segments: Vec<Segment>,
}

impl ExtractedMessage {
    /// Concatenated text segments, asset references skipped.
    pub fn text(&self) -> String {
        let mut joined = String::new();
        for segment in &self.segments {
            if let Segment::Text { text } = segment {
                if !joined.is_empty() {
                    joined.push_str("\n\n");
                }
                joined.push_str(text);
            }
        }
        joined
    }
}

/// A binary attachment referenced by one or more messages. `bytes` is only
/// present after a successful download; a reference-only asset (download
/// failed or skipped) still carries id, name, size, and media type.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

impl Asset {
    pub fn reference(
        id: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Asset {
        Asset {
            id: id.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            bytes: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn downloaded(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Captured output of a code-execution block, with any files it produced.
#[derive(Debug, Clone, Serialize)]
pub struct CodeOutput {
    pub message_id: String,
    pub stdout: String,
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRevision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub content: String,
}

/// A long-form document block (canvas-style), with revision history when the
/// source provides one.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub revisions: Vec<DocumentRevision>,
}

/// Everything extracted from one conversation. Message order is traversal
/// order, not chronological order. Asset maps are keyed by asset id; BTreeMap
/// keeps render output deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedConversation {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ExtractedMessage>,
    pub files: BTreeMap<String, Asset>,
    pub images: BTreeMap<String, Asset>,
    pub code_outputs: Vec<CodeOutput>,
    pub documents: Vec<DocumentRecord>,
}

impl ExtractedConversation {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> ExtractedConversation {
        ExtractedConversation {
            id: id.into(),
            title: title.into(),
            created: None,
            updated: None,
            model: None,
            messages: Vec::new(),
            files: BTreeMap::new(),
            images: BTreeMap::new(),
            code_outputs: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.files.get(id).or_else(|| self.images.get(id))
    }

    /// Register an asset, routed to files or images by media type. A
    /// downloaded copy is never displaced by a reference-only one.
    pub fn register_asset(&mut self, asset: Asset) {
        let slot = if asset.is_image() {
            &mut self.images
        } else {
            &mut self.files
        };
        match slot.get(&asset.id) {
            Some(existing) if existing.downloaded() && !asset.downloaded() => {}
            _ => {
                slot.insert(asset.id.clone(), asset);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub total_files: usize,
    pub total_images: usize,
}

/// One per-conversation extraction failure, recorded without aborting the
/// batch.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationFailure {
    pub conversation_id: String,
    pub error: String,
}

/// One run of the export pipeline. Created fresh per invocation, populated
/// during extraction, consumed by the renderer, then discarded.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSession {
    pub id: String,
    pub started: DateTime<Utc>,
    pub conversations: Vec<ExtractedConversation>,
    pub errors: Vec<ConversationFailure>,
}

impl ExportSession {
    pub fn new() -> ExportSession {
        ExportSession {
            id: Uuid::new_v4().to_string(),
            started: Utc::now(),
            conversations: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn conversation(&self, id: &str) -> Option<&ExtractedConversation> {
        self.conversations.iter().find(|conv| conv.id == id)
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total_conversations: self.conversations.len(),
            ..SessionStats::default()
        };
        for conv in &self.conversations {
            stats.total_messages += conv.messages.len();
            stats.total_files += conv.files.len();
            stats.total_images += conv.images.len();
        }
        stats
    }
}

impl Default for ExportSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert the API's fractional epoch timestamps to UTC datetimes.
pub fn timestamp_from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_id_resolves_either_field() {
        let detail: ConversationDetail = serde_json::from_value(json!({
            "conversation_id": "conv-1",
            "title": "t",
            "mapping": {},
        }))
        .unwrap();
        assert_eq!(detail.conversation_id(), "conv-1");

        let detail: ConversationDetail = serde_json::from_value(json!({
            "id": "conv-2",
            "mapping": {},
        }))
        .unwrap();
        assert_eq!(detail.conversation_id(), "conv-2");
    }

    #[test]
    fn structural_node_deserializes_without_message() {
        let node: MessageNode = serde_json::from_value(json!({
            "id": "root",
            "children": ["a"],
            "message": null,
        }))
        .unwrap();
        assert!(node.message.is_none());
        assert_eq!(node.children, vec!["a"]);
    }

    #[test]
    fn register_asset_keeps_downloaded_copy() {
        let mut conv = ExtractedConversation::new("c", "title");
        let mut downloaded = Asset::reference("file-1", "a.txt", 3, "text/plain");
        downloaded.bytes = Some(b"abc".to_vec());
        conv.register_asset(downloaded);
        conv.register_asset(Asset::reference("file-1", "a.txt", 3, "text/plain"));

        assert!(conv.files["file-1"].downloaded());
        assert!(conv.asset("file-1").is_some());
    }

    #[test]
    fn stats_count_reference_only_assets() {
        let mut conv = ExtractedConversation::new("c", "title");
        conv.register_asset(Asset::reference("file-1", "a.txt", 3, "text/plain"));
        conv.register_asset(Asset::reference("img-1", "p.png", 9, "image/png"));

        let mut session = ExportSession::new();
        session.conversations.push(conv);

        let stats = session.stats();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_images, 1);
    }

    #[test]
    fn epoch_conversion() {
        let dt = timestamp_from_epoch(1700000000.5).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
        assert!(timestamp_from_epoch(f64::NAN).is_none());
    }
}
