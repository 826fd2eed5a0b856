// Input probing using ffprobe

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

/// Check that the pinned ffmpeg binary responds and return its version line
pub fn ffmpeg_version(binary: &Path) -> Result<String> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is ffmpeg installed and in PATH?",
                binary.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!("ffmpeg command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Check that the pinned ffprobe binary responds and return its version line
pub fn ffprobe_version(binary: &Path) -> Result<String> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is ffprobe installed and in PATH?",
                binary.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!("ffprobe command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Probe a video file to get its duration in seconds
pub fn probe_duration(binary: &Path, path: &Path) -> Result<f64> {
    let output = Command::new(binary)
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .context("Failed to execute ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    parse_ffprobe_duration(&json_str)
}

/// Parse duration from ffprobe JSON output
pub fn parse_ffprobe_duration(json: &str) -> Result<f64> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;

    let duration_str = probe
        .format
        .duration
        .context("No duration found in ffprobe output")?;

    duration_str
        .parse::<f64>()
        .context("Failed to parse duration as float")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffprobe_duration() {
        let json = r#"{
            "format": {
                "filename": "test.mp4",
                "duration": "123.456",
                "size": "1024000"
            }
        }"#;

        let duration = parse_ffprobe_duration(json).expect("Failed to parse duration");
        assert_eq!(duration, 123.456);
    }

    #[test]
    fn test_parse_ffprobe_duration_integer() {
        let json = r#"{
            "format": {
                "duration": "60"
            }
        }"#;

        let duration = parse_ffprobe_duration(json).expect("Failed to parse duration");
        assert_eq!(duration, 60.0);
    }

    #[test]
    fn test_parse_ffprobe_duration_missing() {
        let json = r#"{ "format": {} }"#;
        assert!(parse_ffprobe_duration(json).is_err());
    }
}
