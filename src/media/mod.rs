//! FFmpeg-backed audio extraction and segmentation.
//!
//! The pipeline only talks to the [`Transcoder`] trait; ffmpeg itself is a
//! black box invoked as a subprocess.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::TranscodeError;

/// Output contract for extracted audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioProfile {
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate: String,
    /// ffmpeg muxer name, also the file extension.
    pub container: String,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 16_000,
            bitrate: "64k".to_string(),
            container: "mp3".to_string(),
        }
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Drop the video stream and write normalized audio to `output`.
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        profile: &AudioProfile,
    ) -> Result<(), TranscodeError>;

    /// Split `input` into `segment_seconds` long pieces named by `output_pattern`
    /// (a printf-style pattern such as `talk_part%03d.mp3`).
    async fn segment(
        &self,
        input: &Path,
        output_pattern: &Path,
        segment_seconds: u64,
    ) -> Result<(), TranscodeError>;
}

pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    /// Use `binary` if given, otherwise find `ffmpeg` on `PATH`.
    pub fn new(binary: Option<&str>) -> Result<Self, TranscodeError> {
        let binary = match binary {
            Some(path) => PathBuf::from(path),
            None => which::which("ffmpeg").map_err(|_| TranscodeError::NotInstalled)?,
        };
        debug!("Using ffmpeg at {}", binary.display());
        Ok(Self { binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, command: &mut Command) -> Result<(), TranscodeError> {
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: last_lines(&stderr, 5),
            });
        }
        Ok(())
    }
}

/// Check if FFmpeg is available on the system.
pub fn check_ffmpeg_available(binary: Option<&str>) -> bool {
    std::process::Command::new(binary.unwrap_or("ffmpeg"))
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        profile: &AudioProfile,
    ) -> Result<(), TranscodeError> {
        // -vn: drop video, -ac: channels, -ar: sample rate, -b:a: bitrate,
        // -f: muxer (explicit because the temp output has no usable extension)
        let mut command = Command::new(&self.binary);
        command
            .args(["-hide_banner", "-nostdin", "-y"])
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .args(["-ac", &profile.channels.to_string()])
            .args(["-ar", &profile.sample_rate.to_string()])
            .args(["-b:a", &profile.bitrate])
            .args(["-f", &profile.container])
            .arg(output);
        self.run(&mut command).await?;

        if !output.exists() {
            return Err(TranscodeError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }

    async fn segment(
        &self,
        input: &Path,
        output_pattern: &Path,
        segment_seconds: u64,
    ) -> Result<(), TranscodeError> {
        let mut command = Command::new(&self.binary);
        command
            .args(["-hide_banner", "-nostdin", "-y"])
            .arg("-i")
            .arg(input)
            .args(["-f", "segment"])
            .args(["-segment_time", &segment_seconds.to_string()])
            .args(["-c", "copy"])
            .arg(output_pattern);
        self.run(&mut command).await
    }
}
