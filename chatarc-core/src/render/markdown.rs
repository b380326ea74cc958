use crate::conversation::{Asset, ExtractedConversation, Segment};
use crate::render::archive::asset_path;
use crate::tree::MessageTree;

/// Render one conversation as a Markdown document.
///
/// Messages follow the depth-first tree order; each branch level indents its
/// content one step further. Asset references inline in a message become
/// bracketed filename placeholders, while downloaded assets get relative
/// links in the trailing Attachments/Images sections.
pub fn render_markdown(conv: &ExtractedConversation) -> String {
    let mut md = String::new();

    md.push_str("---\n");
    md.push_str(&format!("id: {}\n", conv.id));
    md.push_str(&format!(
        "title: \"{}\"\n",
        conv.title.replace('"', "\\\"")
    ));
    if let Some(created) = conv.created {
        md.push_str(&format!("created: {}\n", created.to_rfc3339()));
    }
    if let Some(updated) = conv.updated {
        md.push_str(&format!("updated: {}\n", updated.to_rfc3339()));
    }
    if let Some(model) = &conv.model {
        md.push_str(&format!("model: {}\n", model));
    }
    md.push_str(&format!("messages: {}\n", conv.messages.len()));
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", conv.title));

    let tree = MessageTree::build(&conv.messages);
    for (depth, message) in tree.walk(&conv.messages) {
        let indent = "  ".repeat(depth);
        push_indented(&mut md, &indent, &format!("**{}:**", message.role.label()));
        md.push('\n');

        for segment in &message.segments {
            match segment {
                Segment::Text { text } => {
                    for line in text.lines() {
                        push_indented(&mut md, &indent, line);
                    }
                }
                Segment::AssetRef { asset_id } => {
                    let placeholder = conv
                        .asset(asset_id)
                        .map(|asset| asset.name.clone())
                        .unwrap_or_else(|| asset_id.clone());
                    push_indented(&mut md, &indent, &format!("[{}]", placeholder));
                }
            }
        }
        md.push('\n');
    }

    if !conv.files.is_empty() {
        md.push_str("## Attachments\n\n");
        for asset in conv.files.values() {
            md.push_str(&asset_line(conv, asset, false));
        }
        md.push('\n');
    }

    if !conv.images.is_empty() {
        md.push_str("## Images\n\n");
        for asset in conv.images.values() {
            md.push_str(&asset_line(conv, asset, true));
        }
        md.push('\n');
    }

    md
}

fn push_indented(md: &mut String, indent: &str, line: &str) {
    if line.is_empty() {
        md.push('\n');
    } else {
        md.push_str(indent);
        md.push_str(line);
        md.push('\n');
    }
}

fn asset_line(conv: &ExtractedConversation, asset: &Asset, image: bool) -> String {
    if asset.downloaded() {
        let path = asset_path(&conv.id, asset);
        if image {
            format!("- ![{}]({})\n", asset.name, path)
        } else {
            format!("- [{}]({})\n", asset.name, path)
        }
    } else {
        format!("- {} ({}, not downloaded)\n", asset.name, asset.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ExtractedMessage, Role};

    fn message(id: &str, parent: Option<&str>, role: Role, text: &str) -> ExtractedMessage {
        ExtractedMessage {
            id: id.to_owned(),
            parent_id: parent.map(str::to_owned),
            role,
            created: None,
            status: None,
            segments: vec![Segment::text(text)],
        }
    }

    fn branched_conversation() -> ExtractedConversation {
        let mut conv = ExtractedConversation::new("conv-1", "Branching");
        conv.messages = vec![
            message("a", None, Role::User, "question"),
            message("b", Some("a"), Role::Assistant, "first answer"),
            message("c", Some("a"), Role::Assistant, "second answer"),
        ];
        conv
    }

    #[test]
    fn branch_children_render_indented_in_order() {
        let md = render_markdown(&branched_conversation());

        let first = md.find("first answer").unwrap();
        let second = md.find("second answer").unwrap();
        assert!(first < second);
        assert!(md.contains("  first answer"));
        assert!(md.contains("  **Assistant:**"));
        // the root is not indented
        assert!(md.contains("\nquestion\n"));
    }

    #[test]
    fn inline_asset_becomes_bracketed_placeholder() {
        let mut conv = ExtractedConversation::new("conv-1", "Assets");
        conv.register_asset(Asset::reference("file-9", "report.pdf", 10, "application/pdf"));
        conv.messages = vec![ExtractedMessage {
            id: "a".to_owned(),
            parent_id: None,
            role: Role::User,
            created: None,
            status: None,
            segments: vec![Segment::text("see attached"), Segment::asset("file-9")],
        }];

        let md = render_markdown(&conv);
        assert!(md.contains("[report.pdf]"));
        // placeholder is not a link
        assert!(!md.contains("[report.pdf]("));
        // but the attachments section lists it without a link since there is
        // no payload
        assert!(md.contains("report.pdf (file-9, not downloaded)"));
    }

    #[test]
    fn downloaded_assets_get_relative_links() {
        let mut conv = ExtractedConversation::new("conv-1", "Assets");
        let mut image = Asset::reference("img-1", "plot.png", 3, "image/png");
        image.bytes = Some(vec![1, 2, 3]);
        conv.register_asset(image);

        let md = render_markdown(&conv);
        assert!(md.contains("![plot.png](conv-1/images/img-1/plot.png)"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let conv = branched_conversation();
        assert_eq!(render_markdown(&conv), render_markdown(&conv));
    }
}
