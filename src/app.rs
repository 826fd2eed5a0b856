use crate::cli::{Cli, Commands};
use ffconvert::config::Config;
use ffconvert::engine::{self, CancelController, EngineManager, transcode};
use ffconvert::format::Format;
use ffconvert::progress::ProgressReporter;
use ffconvert::sink::SaveDirSink;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_sig: libc::c_int) {
    SIGINT_RECEIVED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_sigint_handler() {
    // SAFETY: the handler only touches an atomic flag.
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

/// Outcome reported by the conversion worker thread.
enum WorkerMessage {
    Completed { saved: Option<PathBuf> },
    Failed { error: String },
    Cancelled,
}

pub fn run(cli: Cli) {
    // Handle subcommands first
    if let Some(command) = cli.command {
        let config = Config::load().unwrap_or_default();
        match command {
            Commands::CheckFfmpeg => handle_check_ffmpeg(&config),
            Commands::Probe { file } => handle_probe(&config, file),
            Commands::Formats => handle_formats(),
            Commands::InitConfig => handle_init_config(),
        }
        return;
    }

    let config = Config::load().unwrap_or_default();

    // Resolve the requested format against the whitelist; CLI argument
    // first, then the configured default, then the built-in default.
    let requested = cli.format.as_deref().or(Some(config.defaults.format.as_str()));
    let resolution = Format::resolve(requested);
    if resolution.redirected {
        eprintln!(
            "Unrecognized format, converting to .{} instead",
            resolution.format
        );
    }

    let output_dir = cli
        .output_dir
        .or_else(|| config.output.dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    if let Err(code) = run_conversion(&config, resolution.format, cli.input, output_dir) {
        process::exit(code);
    }
}

fn run_conversion(
    config: &Config,
    format: Format,
    input: Option<PathBuf>,
    output_dir: PathBuf,
) -> Result<(), i32> {
    let mut manager = EngineManager::ffmpeg(config.engine.to_engine_config());
    let reporter = ProgressReporter::new();
    let controller = CancelController::new(&manager, &reporter);

    install_sigint_handler();

    let (tx, rx) = mpsc::channel();
    let worker_reporter = reporter.clone();
    let worker = thread::spawn(move || {
        let mut sink = SaveDirSink::new(output_dir);
        let result = transcode(
            &mut manager,
            input.as_deref(),
            format,
            &worker_reporter,
            &mut sink,
        );
        let message = match result {
            Ok(_) => WorkerMessage::Completed {
                saved: sink.last_saved().map(PathBuf::from),
            },
            Err(err) if err.is_cancelled() => WorkerMessage::Cancelled,
            Err(err) => WorkerMessage::Failed {
                error: format!("{err:#}"),
            },
        };
        let _ = tx.send(message);
    });

    let mut cancel_sent = false;
    let outcome = loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(message) => break message,
            Err(RecvTimeoutError::Timeout) => {
                if SIGINT_RECEIVED.swap(false, Ordering::SeqCst) {
                    if cancel_sent {
                        // Second interrupt: stop waiting for the engine
                        eprintln!("\nAborting");
                        process::exit(130);
                    }
                    eprintln!("\nCancelling...");
                    controller.cancel();
                    cancel_sent = true;
                } else {
                    render_progress(&reporter);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break WorkerMessage::Failed {
                error: "conversion worker exited unexpectedly".to_string(),
            },
        }
    };

    let _ = worker.join();

    match outcome {
        WorkerMessage::Completed { saved } => {
            render_progress(&reporter);
            println!();
            match saved {
                Some(path) => println!("Saved {}", path.display()),
                None => println!("Done"),
            }
            Ok(())
        }
        WorkerMessage::Cancelled => {
            println!("Conversion cancelled");
            Err(130)
        }
        WorkerMessage::Failed { error } => {
            eprintln!("Error: {}", error);
            Err(1)
        }
    }
}

fn render_progress(reporter: &ProgressReporter) {
    let pct = reporter.percent();
    if pct > 0.0 {
        print!("\rProgress: {:.1}%", pct);
        std::io::stdout().flush().ok();
    }
}

fn handle_check_ffmpeg(config: &Config) {
    match engine::probe::ffmpeg_version(&config.engine.binary) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::probe::ffprobe_version(&config.engine.probe_binary) {
                Ok(probe_version) => {
                    println!("ffprobe found: {}", probe_version);
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_probe(config: &Config, file: PathBuf) {
    match engine::probe::probe_duration(&config.engine.probe_binary, &file) {
        Ok(duration) => {
            println!("{}: {:.2}s", file.display(), duration);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_formats() {
    for format in Format::ALL {
        if format == Format::DEFAULT {
            println!("{} (default)", format);
        } else {
            println!("{}", format);
        }
    }
}

fn handle_init_config() {
    match Config::config_path() {
        Ok(path) => {
            if Config::exists() {
                println!("Config file already exists: {}", path.display());
            } else if let Err(e) = Config::ensure_default() {
                eprintln!("Error: could not create config file: {:#}", e);
                process::exit(1);
            } else {
                println!("Created config file: {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
