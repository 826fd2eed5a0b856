// Transient artifacts flowing through one transcode call

use crate::format::Format;
use std::path::Path;

/// The user-selected file: original name plus raw bytes. Read once,
/// staged into the engine filesystem, then discardable.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Read a source file from disk, keeping only the final path
    /// component as the staged name.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let bytes = std::fs::read(path)?;
        Ok(Self { name, bytes })
    }
}

/// The converted result: fixed filename, declared MIME type, raw bytes.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn new(format: Format, bytes: Vec<u8>) -> Self {
        Self {
            filename: format.output_name(),
            mime: format.mime(),
            bytes,
        }
    }
}
