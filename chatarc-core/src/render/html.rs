use once_cell::sync::Lazy;
use regex::Regex;

use crate::conversation::{Asset, ExportSession, ExtractedConversation, Segment};
use crate::render::archive::asset_path;
use crate::tree::MessageTree;

/// Escape free text against markup injection. Must run before any inline
/// formatting so substituted tags are not escaped themselves.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^()\s]+)\)").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());

/// Apply markdown-style inline formatting to already-escaped text. Running
/// on escaped input keeps user-supplied angle brackets inert while the
/// inserted tags stay live.
pub fn inline_format(escaped: &str) -> String {
    let formatted = CODE_RE.replace_all(escaped, "<code>$1</code>");
    let formatted = LINK_RE.replace_all(&formatted, r#"<a href="$2">$1</a>"#);
    let formatted = BOLD_RE.replace_all(&formatted, "<strong>$1</strong>");
    let formatted = ITALIC_RE.replace_all(&formatted, "<em>$1</em>");
    formatted.into_owned()
}

fn format_text_block(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| inline_format(&escape_html(line)))
        .collect();
    lines.join("<br>\n")
}

const STYLE: &str = "\
body { font-family: sans-serif; max-width: 56rem; margin: 2rem auto; padding: 0 1rem; }\n\
.message { border-left: 3px solid #ccc; padding: 0.5rem 1rem; margin: 0.75rem 0; }\n\
.message.user { border-color: #2e7d32; background: #f4faf4; }\n\
.message.assistant { border-color: #1565c0; background: #f4f7fb; }\n\
.message.system, .message.tool { border-color: #9e9e9e; background: #fafafa; }\n\
.role { font-weight: bold; margin-bottom: 0.25rem; }\n\
.missing { color: #9e9e9e; }\n\
img { max-width: 100%; }\n\
pre { background: #f5f5f5; padding: 0.5rem; overflow-x: auto; }\n";

fn page_header(out: &mut String, title: &str) {
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    out.push_str(&format!("<style>\n{}</style>\n</head>\n<body>\n", STYLE));
}

/// Index page: aggregate stats plus one link per conversation.
pub fn render_index(session: &ExportSession) -> String {
    let stats = session.stats();
    let mut out = String::new();
    page_header(&mut out, "Conversation export");

    out.push_str("<h1>Conversation export</h1>\n");
    out.push_str(&format!(
        "<p>Session <code>{}</code>, generated {}.</p>\n",
        escape_html(&session.id),
        session.started.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "<p>{} conversations &middot; {} messages &middot; {} files &middot; {} images</p>\n",
        stats.total_conversations, stats.total_messages, stats.total_files, stats.total_images
    ));

    out.push_str("<ul>\n");
    for conv in &session.conversations {
        out.push_str(&format!(
            "<li><a href=\"{}.html\">{}</a> ({} messages)</li>\n",
            escape_html(&crate::render::sanitize_filename(&conv.id)),
            escape_html(&conv.title),
            conv.messages.len()
        ));
    }
    out.push_str("</ul>\n");

    if !session.errors.is_empty() {
        out.push_str("<h2>Failed conversations</h2>\n<ul>\n");
        for failure in &session.errors {
            out.push_str(&format!(
                "<li><code>{}</code>: {}</li>\n",
                escape_html(&failure.conversation_id),
                escape_html(&failure.error)
            ));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// One conversation page: the depth-first message tree with role-specific
/// styling, inline images, download links for files, and trailing sections
/// for assets, code output, and long-form documents.
pub fn render_conversation(conv: &ExtractedConversation) -> String {
    let mut out = String::new();
    page_header(&mut out, &conv.title);

    out.push_str(&format!("<h1>{}</h1>\n", escape_html(&conv.title)));
    if let Some(model) = &conv.model {
        out.push_str(&format!("<p>Model: <code>{}</code></p>\n", escape_html(model)));
    }

    let tree = MessageTree::build(&conv.messages);
    for (depth, message) in tree.walk(&conv.messages) {
        let role = message.role.label();
        out.push_str(&format!(
            "<div class=\"message {}\" style=\"margin-left: {}px\">\n",
            role.to_lowercase(),
            depth * 24
        ));
        out.push_str(&format!("<div class=\"role\">{}</div>\n", role));

        for segment in &message.segments {
            match segment {
                Segment::Text { text } => {
                    if !text.is_empty() {
                        out.push_str(&format!("<p>{}</p>\n", format_text_block(text)));
                    }
                }
                Segment::AssetRef { asset_id } => match conv.asset(asset_id) {
                    Some(asset) if asset.downloaded() && asset.is_image() => {
                        let path = asset_path(&conv.id, asset);
                        out.push_str(&format!(
                            "<p><img src=\"{}\" alt=\"{}\"></p>\n",
                            escape_html(&path),
                            escape_html(&asset.name)
                        ));
                    }
                    Some(asset) if asset.downloaded() => {
                        let path = asset_path(&conv.id, asset);
                        out.push_str(&format!(
                            "<p><a href=\"{}\" download>{}</a></p>\n",
                            escape_html(&path),
                            escape_html(&asset.name)
                        ));
                    }
                    Some(asset) => {
                        out.push_str(&format!(
                            "<p><span class=\"missing\">[{}]</span></p>\n",
                            escape_html(&asset.name)
                        ));
                    }
                    None => {
                        out.push_str(&format!(
                            "<p><span class=\"missing\">[{}]</span></p>\n",
                            escape_html(asset_id)
                        ));
                    }
                },
            }
        }
        out.push_str("</div>\n");
    }

    if !conv.files.is_empty() {
        out.push_str("<h2>Attachments</h2>\n");
        asset_list(&mut out, conv, conv.files.values());
    }

    if !conv.images.is_empty() {
        out.push_str("<h2>Images</h2>\n");
        asset_list(&mut out, conv, conv.images.values());
    }

    if !conv.code_outputs.is_empty() {
        out.push_str("<h2>Code execution output</h2>\n");
        for output in &conv.code_outputs {
            out.push_str(&format!("<pre>{}</pre>\n", escape_html(&output.stdout)));
        }
    }

    if !conv.documents.is_empty() {
        out.push_str("<h2>Documents</h2>\n");
        for doc in &conv.documents {
            let title = doc.title.as_deref().unwrap_or(&doc.id);
            out.push_str(&format!("<h3>{}</h3>\n", escape_html(title)));
            out.push_str(&format!("<pre>{}</pre>\n", escape_html(&doc.content)));
            if !doc.revisions.is_empty() {
                out.push_str(&format!(
                    "<p>{} earlier revision(s) captured.</p>\n",
                    doc.revisions.len()
                ));
            }
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Reference list for a class of assets. Every asset is listed, downloaded
/// or not, so a payload-less reference stays visible with its id.
fn asset_list<'a>(
    out: &mut String,
    conv: &ExtractedConversation,
    assets: impl Iterator<Item = &'a Asset>,
) {
    out.push_str("<ul>\n");
    for asset in assets {
        if asset.downloaded() {
            out.push_str(&format!(
                "<li><a href=\"{}\" download>{}</a></li>\n",
                escape_html(&asset_path(conv.id.as_str(), asset)),
                escape_html(&asset.name)
            ));
        } else {
            out.push_str(&format!(
                "<li><span class=\"missing\">{} ({}, not downloaded)</span></li>\n",
                escape_html(&asset.name),
                escape_html(&asset.id)
            ));
        }
    }
    out.push_str("</ul>\n");
}
