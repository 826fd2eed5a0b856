#![allow(dead_code)]

use ffconvert::artifact::OutputArtifact;
use ffconvert::engine::{Engine, EngineConfig, EngineError, EngineManager, EngineState};
use ffconvert::sink::DownloadSink;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Counters shared between a stub factory and the test body.
#[derive(Debug, Default)]
pub struct StubStats {
    pub constructed: u32,
    pub loads: u32,
    pub runs: u32,
    pub exits: u32,
}

/// Scripted behavior for a stub engine.
#[derive(Debug, Clone)]
pub struct StubBehavior {
    pub fail_load: bool,
    /// Fail this many runs before succeeding.
    pub fail_runs: u32,
    /// Progress ticks emitted during each successful run.
    pub ticks: Vec<f64>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            fail_load: false,
            fail_runs: 0,
            ticks: vec![0.25, 0.5, 1.0],
        }
    }
}

/// In-memory engine honoring the `Engine` contract: a private file map
/// as its filesystem, scripted progress ticks, scripted failures.
pub struct StubEngine {
    state: EngineState,
    files: HashMap<String, Vec<u8>>,
    behavior: StubBehavior,
    remaining_failures: u32,
    stats: Arc<Mutex<StubStats>>,
}

impl Engine for StubEngine {
    fn state(&self) -> EngineState {
        self.state
    }

    fn load(&mut self) -> Result<(), EngineError> {
        self.stats.lock().unwrap().loads += 1;
        if self.behavior.fail_load {
            return Err(EngineError::Load {
                reason: "stub load failure".to_string(),
            });
        }
        self.state = EngineState::Idle;
        Ok(())
    }

    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        if self.state == EngineState::Unloaded {
            return Err(EngineError::NotLoaded);
        }
        self.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn run(
        &mut self,
        input: &str,
        output: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError> {
        self.stats.lock().unwrap().runs += 1;
        if self.state == EngineState::Unloaded {
            return Err(EngineError::NotLoaded);
        }

        let Some(source) = self.files.get(input).cloned() else {
            return Err(EngineError::Conversion {
                detail: format!("no staged input named '{input}'"),
            });
        };

        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Err(EngineError::Conversion {
                detail: "stub conversion failure".to_string(),
            });
        }

        for tick in self.behavior.ticks.clone() {
            on_progress(tick);
        }

        let mut converted = source;
        converted.extend_from_slice(b" converted");
        self.files.insert(output.to_string(), converted);
        Ok(())
    }

    fn read_output(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MissingOutput {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such stub file"),
            })
    }

    fn exit(&mut self) -> Result<(), EngineError> {
        self.stats.lock().unwrap().exits += 1;
        self.files.clear();
        self.state = EngineState::Unloaded;
        Ok(())
    }
}

/// Manager over stub engines plus the shared counters.
pub fn stub_manager(behavior: StubBehavior) -> (EngineManager<StubEngine>, Arc<Mutex<StubStats>>) {
    let stats = Arc::new(Mutex::new(StubStats::default()));
    let factory_stats = Arc::clone(&stats);
    let manager = EngineManager::new(EngineConfig::default(), move |_config, _pids| {
        factory_stats.lock().unwrap().constructed += 1;
        StubEngine {
            state: EngineState::Unloaded,
            files: HashMap::new(),
            behavior: behavior.clone(),
            remaining_failures: behavior.fail_runs,
            stats: Arc::clone(&factory_stats),
        }
    });
    (manager, stats)
}

/// Captures delivered artifacts instead of writing them anywhere.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: Vec<(String, String, Vec<u8>)>,
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, artifact: &OutputArtifact) -> io::Result<()> {
        self.delivered.push((
            artifact.filename.clone(),
            artifact.mime.to_string(),
            artifact.bytes.clone(),
        ));
        Ok(())
    }
}

/// Write a small fake video file and return its path.
pub fn sample_video(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"fake video").unwrap();
    path
}
