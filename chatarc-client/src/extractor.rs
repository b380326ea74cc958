//! Single-conversation extraction: fetch the detail payload, walk its node
//! mapping once, classify content, and resolve referenced assets.

use serde_json::Value;
use tracing::{debug, instrument};

use chatarc_core::conversation::{
    timestamp_from_epoch, CodeOutput, ConversationDetail, DocumentRecord, DocumentRevision,
    ExtractedConversation, ExtractedMessage, MessageNode, NodeMessage, Role, Segment,
};
use chatarc_core::tree::mapping_order;

use crate::assets::{AssetFetcher, AssetHint};
use crate::error::{ClientError, Result};
use crate::requester::RateLimitedRequester;
use crate::transport::Method;

/// Per-conversation traversal progress. Advisory only: callbacks must never
/// block or affect traversal order.
#[derive(Debug, Clone, Copy)]
pub struct TraversalProgress {
    pub processed: usize,
    pub total: usize,
}

/// Extract one conversation.
///
/// A failed detail fetch is unrecoverable and surfaces as
/// [`ClientError::Extraction`]; individual asset or content failures degrade
/// to reference-only entries and never abort the conversation.
#[instrument(skip_all, fields(conversation_id))]
pub async fn extract_conversation(
    requester: &mut RateLimitedRequester,
    assets: &mut AssetFetcher,
    base_url: &str,
    conversation_id: &str,
    on_progress: &mut dyn FnMut(TraversalProgress),
) -> Result<ExtractedConversation> {
    let detail = match fetch_detail(requester, base_url, conversation_id).await {
        Ok(detail) => detail,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => return Err(ClientError::extraction(conversation_id, err)),
    };

    let id = if detail.conversation_id().is_empty() {
        conversation_id.to_owned()
    } else {
        detail.conversation_id().to_owned()
    };
    let mut conv = ExtractedConversation::new(
        id,
        detail.title.clone().unwrap_or_else(|| "Untitled".to_owned()),
    );
    conv.created = detail.create_time.and_then(timestamp_from_epoch);
    conv.updated = detail.update_time.and_then(timestamp_from_epoch);
    conv.model = detail.default_model_slug.clone();

    let order = mapping_order(&detail.mapping);
    let total = detail.mapping.len();
    let mut processed = 0usize;

    for node_id in &order {
        let Some(node) = detail.mapping.get(node_id) else {
            continue;
        };
        if let Some(message) = &node.message {
            if !is_hidden(message) {
                let extracted =
                    process_message(requester, assets, base_url, &mut conv, node, message).await?;
                conv.messages.push(extracted);
            }
        }
        processed += 1;
        on_progress(TraversalProgress { processed, total });
    }

    Ok(conv)
}

async fn fetch_detail(
    requester: &mut RateLimitedRequester,
    base_url: &str,
    conversation_id: &str,
) -> Result<ConversationDetail> {
    let url = format!("{}/conversation/{}", base_url, conversation_id);
    let response = requester.execute(Method::Get, &url, None).await?;
    serde_json::from_slice(&response.body)
        .map_err(|err| ClientError::decode(format!("conversation {conversation_id}"), err))
}

/// Messages the UI never shows (structural system prompts, memory updates)
/// are traversed for their children but not captured.
fn is_hidden(message: &NodeMessage) -> bool {
    message
        .metadata
        .get("is_visually_hidden_from_conversation")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

async fn process_message(
    requester: &mut RateLimitedRequester,
    assets: &mut AssetFetcher,
    base_url: &str,
    conv: &mut ExtractedConversation,
    node: &MessageNode,
    message: &NodeMessage,
) -> Result<ExtractedMessage> {
    let mut segments = Vec::new();
    let content = &message.content;

    if content.content_type == "multimodal_text" {
        for part in content.parts.iter().flatten() {
            match part {
                Value::String(text) => {
                    if !text.is_empty() {
                        segments.push(Segment::text(text.clone()));
                    }
                }
                Value::Object(_) => {
                    process_pointer_part(requester, assets, base_url, conv, part, &mut segments)
                        .await?;
                }
                _ => {}
            }
        }
    } else {
        for part in content.parts.iter().flatten() {
            if let Some(text) = part.as_str() {
                if !text.is_empty() {
                    segments.push(Segment::text(text));
                }
            }
        }
        if let Some(text) = &content.text {
            if !text.is_empty() {
                segments.push(Segment::text(text.clone()));
            }
        }
    }

    process_metadata(requester, assets, base_url, conv, node, message).await?;

    Ok(ExtractedMessage {
        id: node.id.clone(),
        parent_id: node.parent.clone(),
        role: Role::from_api(&message.author.role),
        created: message.create_time.and_then(timestamp_from_epoch),
        status: message.status.clone(),
        segments,
    })
}

/// Resolve one object-shaped multimodal part. Any part carrying an asset
/// pointer is fetched; classification into images vs files happens by media
/// type when the asset is registered. Parts with no pointer at all (text
/// fragments in object form, tool chrome) are skipped.
async fn process_pointer_part(
    requester: &mut RateLimitedRequester,
    assets: &mut AssetFetcher,
    base_url: &str,
    conv: &mut ExtractedConversation,
    part: &Value,
    segments: &mut Vec<Segment>,
) -> Result<()> {
    let content_type = part
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(pointer) = part.get("asset_pointer").and_then(Value::as_str) else {
        debug!(content_type, "skipping multimodal part without asset pointer");
        return Ok(());
    };
    let asset_id = strip_pointer_scheme(pointer);
    if asset_id.is_empty() {
        return Ok(());
    }

    let mut hint = AssetHint {
        name: None,
        mime_type: part
            .get("mime_type")
            .and_then(Value::as_str)
            .map(str::to_owned),
        size: part.get("size_bytes").and_then(Value::as_u64),
    };
    if content_type == "image_asset_pointer" {
        if hint.mime_type.is_none() {
            hint.mime_type = Some("image/png".to_owned());
        }
        hint.name = Some(format!("{}.png", asset_id));
    }

    // generated images carry a direct URL; uploaded assets go through the
    // authenticated download endpoint
    let asset = match part.get("url").and_then(Value::as_str) {
        Some(url) => {
            assets
                .fetch_direct(requester, url, asset_id, &hint)
                .await?
        }
        None => assets.fetch(requester, base_url, asset_id, &hint).await?,
    };
    conv.register_asset(asset);
    segments.push(Segment::asset(asset_id));
    Ok(())
}

/// Capture the special payloads the API tucks into message metadata:
/// attachments, code-execution results, canvas documents, and file
/// citations.
async fn process_metadata(
    requester: &mut RateLimitedRequester,
    assets: &mut AssetFetcher,
    base_url: &str,
    conv: &mut ExtractedConversation,
    node: &MessageNode,
    message: &NodeMessage,
) -> Result<()> {
    let meta = &message.metadata;

    if let Some(attachments) = meta.get("attachments").and_then(Value::as_array) {
        for attachment in attachments {
            let Some(id) = attachment.get("id").and_then(Value::as_str) else {
                continue;
            };
            let hint = AssetHint {
                name: attachment
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                mime_type: attachment
                    .get("mime_type")
                    .or_else(|| attachment.get("mimeType"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                size: attachment.get("size").and_then(Value::as_u64),
            };
            let asset = assets.fetch(requester, base_url, id, &hint).await?;
            conv.register_asset(asset);
        }
    }

    if let Some(aggregate) = meta.get("aggregate_result") {
        let mut stdout = String::new();
        for entry in aggregate
            .get("messages")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if entry.get("message_type").and_then(Value::as_str) == Some("stream") {
                if let Some(text) = entry.get("text").and_then(Value::as_str) {
                    stdout.push_str(text);
                }
            }
        }

        let mut file_ids = Vec::new();
        for produced in aggregate
            .get("files")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(file_id) = produced.get("file_id").and_then(Value::as_str) else {
                continue;
            };
            let hint = AssetHint {
                name: produced
                    .get("file_name")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                ..AssetHint::default()
            };
            let asset = assets.fetch(requester, base_url, file_id, &hint).await?;
            conv.register_asset(asset);
            file_ids.push(file_id.to_owned());
        }

        if !stdout.is_empty() || !file_ids.is_empty() {
            conv.code_outputs.push(CodeOutput {
                message_id: node.id.clone(),
                stdout,
                file_ids,
            });
        }
    }

    if let Some(canvas) = meta.get("canvas") {
        if let Some(doc_id) = canvas.get("textdoc_id").and_then(Value::as_str) {
            let revisions = canvas
                .get("revisions")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|rev| {
                    rev.get("content").and_then(Value::as_str).map(|content| {
                        DocumentRevision {
                            version: rev.get("version").and_then(Value::as_i64),
                            content: content.to_owned(),
                        }
                    })
                })
                .collect();

            conv.documents.push(DocumentRecord {
                id: doc_id.to_owned(),
                title: canvas
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                content: canvas
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                version: canvas.get("version").and_then(Value::as_i64),
                revisions,
            });
        }
    }

    if let Some(citations) = meta.get("citations").and_then(Value::as_array) {
        for citation in citations {
            let Some(cite_meta) = citation.get("metadata") else {
                continue;
            };
            if cite_meta.get("type").and_then(Value::as_str) != Some("file") {
                continue;
            }
            let Some(id) = cite_meta.get("id").and_then(Value::as_str) else {
                continue;
            };
            let hint = AssetHint {
                name: cite_meta
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                ..AssetHint::default()
            };
            let asset = assets.fetch(requester, base_url, id, &hint).await?;
            conv.register_asset(asset);
        }
    }

    Ok(())
}

/// `file-service://file-abc` and `sediment://file_xyz` both reduce to the
/// bare asset id.
fn strip_pointer_scheme(pointer: &str) -> &str {
    pointer
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(pointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pointer_scheme_stripping() {
        assert_eq!(strip_pointer_scheme("file-service://file-abc"), "file-abc");
        assert_eq!(strip_pointer_scheme("sediment://file_xyz"), "file_xyz");
        assert_eq!(strip_pointer_scheme("file-plain"), "file-plain");
    }

    #[test]
    fn hidden_flag_detected() {
        let message: NodeMessage = serde_json::from_value(json!({
            "id": "m1",
            "author": {"role": "system"},
            "content": {"content_type": "text", "parts": []},
            "metadata": {"is_visually_hidden_from_conversation": true},
        }))
        .unwrap();
        assert!(is_hidden(&message));

        let message: NodeMessage = serde_json::from_value(json!({
            "id": "m2",
            "author": {"role": "user"},
            "content": {"content_type": "text", "parts": ["hi"]},
        }))
        .unwrap();
        assert!(!is_hidden(&message));
    }
}
