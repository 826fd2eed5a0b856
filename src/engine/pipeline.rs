// The transcode sequence: stage input, convert, read back, hand off

use super::lifecycle::{Engine, EngineError, EngineManager};
use crate::artifact::{OutputArtifact, SourceFile};
use crate::format::Format;
use crate::progress::ProgressReporter;
use crate::sink::DownloadSink;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The user supplied no file. Reported before any engine
    /// interaction; lifecycle state is untouched.
    #[error("no input file selected")]
    NoInput,

    #[error("input file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("failed to read input '{name}'")]
    ReadSource {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to deliver output")]
    Sink(#[source] std::io::Error),
}

impl TranscodeError {
    /// True when the failure is the user's cancel request surfacing, not
    /// a fault of its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranscodeError::Engine(EngineError::Cancelled))
    }
}

/// Convert `source` into `format`, delivering the result to `sink`.
///
/// The steps are strictly sequential: staging completes before the
/// conversion starts, and the conversion completes before read-back.
/// Errors propagate without retry; lifecycle state is left as-is so a
/// manual retry re-enters at `ensure_ready` (cheap once loaded) and
/// re-stages the file. The exclusive borrow of the manager means a
/// second call cannot overlap a running one.
pub fn transcode<E: Engine>(
    manager: &mut EngineManager<E>,
    source: Option<&Path>,
    format: Format,
    reporter: &ProgressReporter,
    sink: &mut dyn DownloadSink,
) -> Result<OutputArtifact, TranscodeError> {
    let path = source.ok_or(TranscodeError::NoInput)?;
    if !path.is_file() {
        return Err(TranscodeError::SourceNotFound(path.to_path_buf()));
    }

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, source = %path.display(), %format, "transcode requested");

    let engine = manager.ensure_ready()?;

    let source_file = SourceFile::read(path).map_err(|source| TranscodeError::ReadSource {
        name: path.display().to_string(),
        source,
    })?;
    engine.write_input(&source_file.name, &source_file.bytes)?;

    // Subscribe under the current epoch so ticks from a handle that gets
    // cancelled mid-run are dropped instead of overwriting a later run.
    let token = reporter.subscribe();
    let output_name = format.output_name();
    engine.run(&source_file.name, &output_name, &mut |ratio| {
        token.update(ratio)
    })?;

    let bytes = engine.read_output(&output_name)?;
    let artifact = OutputArtifact::new(format, bytes);
    sink.deliver(&artifact).map_err(TranscodeError::Sink)?;

    tracing::info!(
        %run_id,
        filename = %artifact.filename,
        len = artifact.bytes.len(),
        "transcode complete"
    );
    Ok(artifact)
}
