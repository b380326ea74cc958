//! Export rendering: fold a completed [`ExportSession`] into one of the
//! supported artifact shapes.
//!
//! Renderers are deterministic: the same session renders to byte-identical
//! output. The only timestamp embedded anywhere is the session's own start
//! time, so re-rendering never changes bytes.

use std::fmt;
use std::str::FromStr;

use tracing::instrument;

use crate::conversation::ExportSession;
use crate::error::{CoreError, Result};

pub mod archive;
mod html;
mod json;
mod markdown;

pub use archive::{asset_path, sanitize_filename};
pub use html::{escape_html, inline_format};
pub use json::session_document;
pub use markdown::render_markdown;

use archive::ArchiveBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    JsonArchive,
    MarkdownArchive,
    HtmlArchive,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            _ => "zip",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            _ => "application/zip",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(ExportFormat::Json),
            "json-archive" => Ok(ExportFormat::JsonArchive),
            "markdown-archive" => Ok(ExportFormat::MarkdownArchive),
            "html-archive" => Ok(ExportFormat::HtmlArchive),
            other => Err(CoreError::unsupported_format(other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::JsonArchive => "json-archive",
            ExportFormat::MarkdownArchive => "markdown-archive",
            ExportFormat::HtmlArchive => "html-archive",
        };
        f.write_str(name)
    }
}

/// The final output payload handed to the caller for disposition. Persisting
/// it (file save, download trigger) is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render with a raw format string; unrecognized values surface
/// [`CoreError::UnsupportedFormat`] before any work is done.
pub fn render(session: &ExportSession, format: &str) -> Result<Artifact> {
    let format: ExportFormat = format.parse()?;
    render_as(session, format)
}

#[instrument(skip_all, fields(format = %format))]
pub fn render_as(session: &ExportSession, format: ExportFormat) -> Result<Artifact> {
    let stamp = session.started.format("%Y%m%dT%H%M%SZ");
    let filename = format!("chatarc-export-{}.{}", stamp, format.extension());

    let bytes = match format {
        ExportFormat::Json => serde_json::to_vec_pretty(&json::session_document(session))
            .map_err(|err| CoreError::json("session document", err))?,
        ExportFormat::JsonArchive => {
            let mut builder = ArchiveBuilder::new();
            let document = serde_json::to_vec_pretty(&json::session_document(session))
                .map_err(|err| CoreError::json("session document", err))?;
            builder.add_file("export.json", &document)?;
            archive::add_session_assets(&mut builder, session)?;
            builder.finish()?
        }
        ExportFormat::MarkdownArchive => {
            let mut builder = ArchiveBuilder::new();
            for conv in &session.conversations {
                let path = format!("{}.md", sanitize_filename(&conv.id));
                builder.add_file(&path, markdown::render_markdown(conv).as_bytes())?;
            }
            archive::add_session_assets(&mut builder, session)?;
            builder.finish()?
        }
        ExportFormat::HtmlArchive => {
            let mut builder = ArchiveBuilder::new();
            builder.add_file("index.html", html::render_index(session).as_bytes())?;
            for conv in &session.conversations {
                let path = format!("{}.html", sanitize_filename(&conv.id));
                builder.add_file(&path, html::render_conversation(conv).as_bytes())?;
            }
            archive::add_session_assets(&mut builder, session)?;
            builder.finish()?
        }
    };

    Ok(Artifact {
        filename,
        media_type: format.media_type(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_round_trip() {
        for name in ["json", "json-archive", "markdown-archive", "html-archive"] {
            let format: ExportFormat = name.parse().unwrap();
            assert_eq!(format.to_string(), name);
        }
    }

    #[test]
    fn unknown_format_rejected() {
        let err = "csv".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat { .. }));

        let session = ExportSession::new();
        assert!(render(&session, "csv").is_err());
    }
}
