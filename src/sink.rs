// Download sink: where a finished artifact is handed off

use crate::artifact::OutputArtifact;
use std::io;
use std::path::{Path, PathBuf};

/// Receives the converted bytes once a transcode completes. The CLI saves
/// to a directory; tests capture in memory.
pub trait DownloadSink {
    fn deliver(&mut self, artifact: &OutputArtifact) -> io::Result<()>;
}

/// Writes artifacts into a target directory under their fixed filename,
/// creating the directory if needed.
#[derive(Debug)]
pub struct SaveDirSink {
    dir: PathBuf,
    last_saved: Option<PathBuf>,
}

impl SaveDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_saved: None,
        }
    }

    /// Path of the most recently delivered artifact.
    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }
}

impl DownloadSink for SaveDirSink {
    fn deliver(&mut self, artifact: &OutputArtifact) -> io::Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.bytes)?;
        tracing::info!(path = %path.display(), mime = artifact.mime, "saved output");
        self.last_saved = Some(path);
        Ok(())
    }
}
