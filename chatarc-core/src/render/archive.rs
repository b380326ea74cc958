//! In-memory zip assembly for the archive export formats.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::conversation::{Asset, ExportSession};
use crate::error::Result;

pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl ArchiveBuilder {
    pub fn new() -> ArchiveBuilder {
        ArchiveBuilder {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.writer.start_file(path, FileOptions::default())?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a filename by replacing invalid characters
pub fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Archive path for an asset's binary payload:
/// `<conversation_id>/<files|images>/<asset_id>/<name>`.
pub fn asset_path(conversation_id: &str, asset: &Asset) -> String {
    let class = if asset.is_image() { "images" } else { "files" };
    format!(
        "{}/{}/{}/{}",
        sanitize_filename(conversation_id),
        class,
        sanitize_filename(&asset.id),
        sanitize_filename(&asset.name)
    )
}

/// Place every successfully downloaded asset of the session into the
/// archive. Payload-less assets are skipped here; they stay listed in the
/// document renderings.
pub fn add_session_assets(builder: &mut ArchiveBuilder, session: &ExportSession) -> Result<()> {
    for conv in &session.conversations {
        for asset in conv.files.values().chain(conv.images.values()) {
            if let Some(bytes) = &asset.bytes {
                builder.add_file(&asset_path(&conv.id, asset), bytes)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("plain.txt"), "plain.txt");
    }

    #[test]
    fn asset_path_classifies_by_media_type() {
        let file = Asset::reference("file-1", "notes.txt", 1, "text/plain");
        assert_eq!(asset_path("conv", &file), "conv/files/file-1/notes.txt");

        let image = Asset::reference("img-1", "shot.png", 1, "image/png");
        assert_eq!(asset_path("conv", &image), "conv/images/img-1/shot.png");
    }

    #[test]
    fn builder_produces_readable_zip() {
        let mut builder = ArchiveBuilder::new();
        builder.add_file("hello.txt", b"hi").unwrap();
        let bytes = builder.finish().unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut member = archive.by_name("hello.txt").unwrap();
        let mut content = String::new();
        std::io::Read::read_to_string(&mut member, &mut content).unwrap();
        assert_eq!(content, "hi");
    }
}
