// Process-backed conversion engine
//
// The engine owns a scratch directory that plays the role of its private
// filesystem: inputs are staged into it under their original name, a run
// produces the fixed output name next to them, and teardown releases the
// whole directory.

use super::cancel::terminate_pid;
use super::lifecycle::{Engine, EngineConfig, EngineError, EngineManager, EngineState, PidRegistry};
use super::log::write_debug_log;
use super::probe;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::TempDir;

/// Check if the engine process was stopped by a user signal (SIGTERM,
/// SIGINT, SIGQUIT), as opposed to failing on its own.
///
/// FFmpeg catches signals and exits gracefully, printing "Exiting
/// normally, received signal X", so we check both the process signal
/// status AND the stderr for this message.
#[cfg(unix)]
fn was_user_cancelled(status: &ExitStatus, stderr: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if matches!(signal, 2 | 3 | 15) {
            return true;
        }
    }

    stderr.contains("received signal 2")
        || stderr.contains("received signal 3")
        || stderr.contains("received signal 15")
}

#[cfg(not(unix))]
fn was_user_cancelled(_status: &ExitStatus, stderr: &str) -> bool {
    stderr.contains("received signal")
}

/// Apply additional user-provided arguments to the command.
/// Uses shell-style parsing so quoted strings with spaces are preserved.
fn apply_extra_args(cmd: &mut Command, extra_args: &str) {
    if extra_args.is_empty() {
        return;
    }

    if let Some(args) = shlex::split(extra_args) {
        for arg in args {
            cmd.arg(arg);
        }
    } else {
        // Unbalanced quotes; fall back to simple whitespace split
        for arg in extra_args.split_whitespace() {
            cmd.arg(arg);
        }
    }
}

/// Single-pass conversion command: read the staged input, infer the
/// target container from the output extension.
fn build_convert_cmd(
    binary: &Path,
    input_path: &Path,
    output_path: &Path,
    extra_args: &str,
) -> Command {
    let mut cmd = Command::new(binary);

    cmd.arg("-i").arg(input_path);

    // Structured key=value progress on stdout
    cmd.arg("-progress").arg("-").arg("-nostats");

    apply_extra_args(&mut cmd, extra_args);

    cmd.arg("-y");
    cmd.arg(output_path);

    cmd
}

fn format_cmd(cmd: &Command) -> String {
    format!(
        "{} {}",
        cmd.get_program().to_string_lossy(),
        cmd.get_args()
            .map(|arg| {
                let s = arg.to_string_lossy();
                if s.contains(' ') {
                    format!("\"{}\"", s)
                } else {
                    s.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    )
}

/// Last few stderr lines, which is where ffmpeg puts the actual reason.
fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 6;
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

/// Parser for the engine's progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub speed: Option<f64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "out_time_us" => {
                    if let Ok(us) = value.trim().parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "speed" => {
                    // Speed is in format "1.23x", strip the 'x'
                    let speed_str = value.trim().trim_end_matches('x');
                    if let Ok(s) = speed_str.parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "progress" => {
                    if value.trim() == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Fractional completion given the probed input duration. Without a
    /// duration the ratio stays 0 until the terminal record. Not clamped
    /// here; the display side clamps.
    pub fn ratio(&self, duration_s: Option<f64>) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        match duration_s {
            Some(dur) if dur > 0.0 => self.out_time_s() / dur,
            _ => 0.0,
        }
    }
}

/// Engine handle backed by a spawned ffmpeg process per conversion.
pub struct FfmpegEngine {
    config: EngineConfig,
    pids: PidRegistry,
    scratch: Option<TempDir>,
    state: EngineState,
    version: Option<String>,
}

impl FfmpegEngine {
    pub fn new(config: &EngineConfig, pids: PidRegistry) -> Self {
        Self {
            config: config.clone(),
            pids,
            scratch: None,
            state: EngineState::Unloaded,
            version: None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn scratch_path(&self) -> Result<&Path, EngineError> {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .ok_or(EngineError::NotLoaded)
    }

    /// Resolve a name inside the scratch directory, refusing anything
    /// that is not a plain file name.
    fn scratch_file(&self, name: &str) -> Result<PathBuf, EngineError> {
        let root = self.scratch_path()?;
        let file_name = Path::new(name)
            .file_name()
            .filter(|f| *f == Path::new(name).as_os_str())
            .ok_or_else(|| EngineError::Stage {
                name: name.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a plain file name",
                ),
            })?;
        Ok(root.join(file_name))
    }

    fn run_child(
        &self,
        mut cmd: Command,
        duration: Option<f64>,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError> {
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EngineError::Conversion {
            detail: format!("failed to spawn engine process: {e}"),
        })?;

        // Register the PID so an in-flight run can be killed from outside
        let pid = child.id();
        self.pids.lock().unwrap().insert(pid);

        let log_engine_output = self.config.log;
        let stderr = child.stderr.take().ok_or_else(|| EngineError::Conversion {
            detail: "failed to capture engine stderr".to_string(),
        })?;
        let stderr_thread = std::thread::spawn(move || {
            let mut stderr_output = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                if log_engine_output {
                    tracing::debug!(target: "ffconvert::engine", "{line}");
                }
                stderr_output.push_str(&line);
                stderr_output.push('\n');
            }
            stderr_output
        });

        let stdout = child.stdout.take().ok_or_else(|| EngineError::Conversion {
            detail: "failed to capture engine stdout".to_string(),
        })?;
        let reader = BufReader::new(stdout);
        let mut parser = ProgressParser::new();

        for line in reader.lines().map_while(Result::ok) {
            parser.parse_line(&line);
            let ratio = parser.ratio(duration);
            tracing::trace!(ratio, speed = ?parser.speed, "progress tick");
            on_progress(ratio);
        }

        let status = child.wait().map_err(|e| EngineError::Conversion {
            detail: format!("failed to wait for engine process: {e}"),
        })?;

        self.pids.lock().unwrap().remove(&pid);

        let stderr_output = stderr_thread
            .join()
            .unwrap_or_else(|_| "Failed to capture stderr".to_string());

        if status.success() {
            Ok(())
        } else if was_user_cancelled(&status, &stderr_output) {
            Err(EngineError::Cancelled)
        } else {
            Err(EngineError::Conversion {
                detail: stderr_tail(&stderr_output),
            })
        }
    }
}

impl Engine for FfmpegEngine {
    fn state(&self) -> EngineState {
        self.state
    }

    fn load(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Unloaded {
            return Ok(());
        }

        let version =
            probe::ffmpeg_version(&self.config.binary).map_err(|e| EngineError::Load {
                reason: format!("{e:#}"),
            })?;
        let scratch = tempfile::tempdir().map_err(|e| EngineError::Load {
            reason: format!("failed to create engine filesystem: {e}"),
        })?;

        tracing::debug!(%version, scratch = %scratch.path().display(), "engine loaded");
        if self.config.log {
            let _ = write_debug_log(&format!("engine loaded: {version}"));
        }

        self.version = Some(version);
        self.scratch = Some(scratch);
        self.state = EngineState::Idle;
        Ok(())
    }

    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let dest = self.scratch_file(name)?;
        std::fs::write(&dest, bytes).map_err(|source| EngineError::Stage {
            name: name.to_string(),
            source,
        })?;
        tracing::debug!(name, len = bytes.len(), "staged input");
        Ok(())
    }

    fn run(
        &mut self,
        input: &str,
        output: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError> {
        let input_path = self.scratch_file(input)?;
        let output_path = self.scratch_file(output)?;
        if !input_path.is_file() {
            return Err(EngineError::Conversion {
                detail: format!("no staged input named '{input}'"),
            });
        }

        // Duration drives the progress ratio; exotic inputs may not
        // report one, in which case progress jumps on completion.
        let duration = probe::probe_duration(&self.config.probe_binary, &input_path).ok();

        let cmd = build_convert_cmd(
            &self.config.binary,
            &input_path,
            &output_path,
            &self.config.extra_args,
        );

        tracing::info!(input, output, ?duration, "starting conversion");
        if self.config.log {
            let _ = write_debug_log(&format!("run: {}", format_cmd(&cmd)));
        }

        self.state = EngineState::Busy;
        let result = self.run_child(cmd, duration, on_progress);

        match &result {
            Ok(()) => {
                tracing::info!(output, "conversion finished");
                self.state = EngineState::Idle;
            }
            Err(EngineError::Cancelled) => {
                // Handle is dead from the caller's perspective; the
                // manager drops it rather than reusing it.
                tracing::info!(output, "conversion terminated");
            }
            Err(err) => {
                // A failed conversion does not corrupt the engine; the
                // handle stays usable for a retry.
                tracing::warn!(output, error = %err, "conversion failed");
                self.state = EngineState::Idle;
            }
        }

        result
    }

    fn read_output(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.scratch_file(name)?;
        std::fs::read(&path).map_err(|source| EngineError::MissingOutput {
            name: name.to_string(),
            source,
        })
    }

    fn exit(&mut self) -> Result<(), EngineError> {
        let pids: Vec<u32> = self.pids.lock().unwrap().iter().copied().collect();
        let mut fault: Option<std::io::Error> = None;
        for pid in pids {
            if let Err(err) = terminate_pid(pid) {
                tracing::debug!(pid, error = %err, "failed to signal engine process");
                fault.get_or_insert(err);
            }
        }

        // Releasing the TempDir removes the engine filesystem.
        self.scratch = None;
        self.state = EngineState::Unloaded;

        match fault {
            None => Ok(()),
            Some(err) => Err(EngineError::Terminate {
                detail: err.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for FfmpegEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEngine")
            .field("state", &self.state)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl EngineManager<FfmpegEngine> {
    /// Manager over the process-backed engine with the fixed config.
    pub fn ffmpeg(config: EngineConfig) -> Self {
        EngineManager::new(config, FfmpegEngine::new)
    }
}
