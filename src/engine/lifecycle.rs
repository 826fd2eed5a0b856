// Engine handle ownership: construction, loading, teardown

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Registry of engine child process ids, shared with the cancellation
/// controller so an in-flight conversion can be killed from outside the
/// worker thread.
pub type PidRegistry = Arc<Mutex<HashSet<u32>>>;

/// Fixed engine configuration, set at construction. Mirrors the only two
/// tunables the engine exposes: diagnostic logging and the pinned
/// runtime binaries, plus optional pass-through arguments.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub binary: std::path::PathBuf,
    pub probe_binary: std::path::PathBuf,
    /// Diagnostic logging: engine stderr at debug level plus an
    /// append-only command log file.
    pub log: bool,
    /// Extra arguments inserted before the output name, shell-style.
    pub extra_args: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".into(),
            probe_binary: "ffprobe".into(),
            log: true,
            extra_args: String::new(),
        }
    }
}

/// Observable state of a constructed engine handle. An absent handle is
/// represented by the manager holding `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, load step not performed yet.
    Unloaded,
    /// Loaded and idle; ready to run a conversion.
    Idle,
    /// A conversion is in flight.
    Busy,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine failed to load: {reason}")]
    Load { reason: String },

    #[error("engine is not loaded")]
    NotLoaded,

    #[error("failed to stage '{name}' into the engine filesystem")]
    Stage {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("conversion failed: {detail}")]
    Conversion { detail: String },

    #[error("conversion was terminated")]
    Cancelled,

    #[error("engine termination failed: {detail}")]
    Terminate { detail: String },

    #[error("engine produced no output named '{name}'")]
    MissingOutput {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fixed contract to the opaque transcoding engine.
///
/// The engine retains a private filesystem between calls: input is staged
/// under its original name, a run reads that name and writes the fixed
/// output name, and the artifact is read back afterwards. `run` reports
/// fractional completion through the callback on its own cadence.
pub trait Engine {
    fn state(&self) -> EngineState;

    /// The potentially slow one-time load step.
    fn load(&mut self) -> Result<(), EngineError>;

    /// Stage bytes into the engine filesystem. Completes fully before
    /// returning; a run never observes a partial write.
    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Single-pass conversion from the staged `input` name to `output`.
    fn run(
        &mut self,
        input: &str,
        output: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError>;

    /// Read an artifact out of the engine filesystem.
    fn read_output(&mut self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Best-effort termination of anything in flight. Callers ignore the
    /// error; it exists so faults can be logged.
    fn exit(&mut self) -> Result<(), EngineError>;
}

/// Cross-thread signal from the cancellation controller to the manager:
/// the current handle has been torn down externally and must not be
/// reused.
#[derive(Debug, Default)]
pub(crate) struct LifecycleSignal {
    pub(crate) discard_requested: AtomicBool,
}

/// Sole owner of the engine handle.
///
/// The engine is expensive to initialize and stateful once loaded, so the
/// handle lives across transcode calls instead of being re-created per
/// call. `ensure_ready` is idempotent; the `&mut self` receiver makes a
/// second concurrent load for the same handle unrepresentable.
pub struct EngineManager<E: Engine> {
    config: EngineConfig,
    factory: Box<dyn Fn(&EngineConfig, PidRegistry) -> E + Send>,
    engine: Option<E>,
    generation: u64,
    pub(crate) pids: PidRegistry,
    pub(crate) signal: Arc<LifecycleSignal>,
}

impl<E: Engine> EngineManager<E> {
    pub fn new(
        config: EngineConfig,
        factory: impl Fn(&EngineConfig, PidRegistry) -> E + Send + 'static,
    ) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            engine: None,
            generation: 0,
            pids: Arc::new(Mutex::new(HashSet::new())),
            signal: Arc::new(LifecycleSignal::default()),
        }
    }

    /// Return a loaded engine, constructing and loading one if needed.
    ///
    /// A repeat call on a loaded handle returns immediately. A failed
    /// load never leaves a half-loaded handle behind; the next call
    /// reconstructs from scratch.
    pub fn ensure_ready(&mut self) -> Result<&mut E, EngineError> {
        if self.signal.discard_requested.swap(false, Ordering::SeqCst) {
            tracing::debug!("handle was cancelled externally, dropping it");
            self.teardown_current();
        }

        if self.engine.is_none() {
            self.generation += 1;
            tracing::info!(generation = self.generation, "constructing conversion engine");
            self.engine = Some((self.factory)(&self.config, Arc::clone(&self.pids)));
        }

        let needs_load = self
            .engine
            .as_ref()
            .is_some_and(|e| e.state() == EngineState::Unloaded);
        if needs_load {
            if let Some(engine) = self.engine.as_mut() {
                if let Err(err) = engine.load() {
                    self.engine = None;
                    return Err(err);
                }
            }
            tracing::info!(generation = self.generation, "engine loaded");
        }

        self.engine.as_mut().ok_or(EngineError::NotLoaded)
    }

    /// Terminate anything in flight and release the handle. Termination
    /// faults are not user-visible; a discarded engine is never reused.
    pub fn discard(&mut self) {
        if self.engine.is_some() {
            tracing::info!(generation = self.generation, "discarding conversion engine");
        }
        self.teardown_current();
    }

    /// `None` while no handle exists. A handle the cancellation
    /// controller has torn down counts as absent even before this
    /// manager observes the request.
    pub fn state(&self) -> Option<EngineState> {
        if self.signal.discard_requested.load(Ordering::SeqCst) {
            return None;
        }
        self.engine.as_ref().map(Engine::state)
    }

    /// Monotone counter distinguishing successive handles.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn teardown_current(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if let Err(err) = engine.exit() {
                tracing::debug!(error = %err, "engine termination fault ignored");
            }
        }
    }
}

impl<E: Engine> std::fmt::Debug for EngineManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineManager")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
