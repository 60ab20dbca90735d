//! Runs the real ffmpeg transcoder against a generated clip.
//!
//! ## Prerequisites
//! - FFmpeg with the lavfi input and libmp3lame encoder
//!
//! Tests print a message and return early when ffmpeg is missing.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use meeting_recap::media::{AudioProfile, FfmpegTranscoder, Transcoder};
use meeting_recap::store::{ArtifactKey, MediaStore};

fn ffmpeg_with_mp3() -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).contains("libmp3lame"))
        .unwrap_or(false)
}

/// A short video with a tone, or `false` if this ffmpeg build cannot make one.
fn make_clip(path: &Path, seconds: u32) -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-nostdin", "-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={seconds}:size=160x120:rate=10"))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={seconds}"))
        .args(["-shortest", "-c:v", "mpeg4", "-c:a", "aac"])
        .arg(path)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_extract_then_segment() {
    if !ffmpeg_with_mp3() {
        eprintln!("Skipping: FFmpeg with libmp3lame not installed");
        return;
    }

    let dir = TempDir::new().unwrap();
    let store = MediaStore::open(dir.path().join("page"), "mp3").unwrap();
    let video = store.video("clip.mp4");
    if !make_clip(&video.path, 4) {
        eprintln!("Skipping: could not generate a test clip");
        return;
    }

    let transcoder = FfmpegTranscoder::new(None).unwrap();
    let audio = store.audio(&video.key);
    transcoder
        .extract_audio(&video.path, &audio.path, &AudioProfile::default())
        .await
        .unwrap();

    let audio_size = std::fs::metadata(&audio.path).unwrap().len();
    assert!(audio_size > 0);
    assert!(audio_size < std::fs::metadata(&video.path).unwrap().len());

    let key = ArtifactKey::from_title("clip.mp4");
    transcoder
        .segment(&audio.path, &store.chunk_pattern(&key), 1)
        .await
        .unwrap();

    let chunks = store.chunks(&key).unwrap();
    assert!(chunks.len() >= 2, "expected several chunks, got {}", chunks.len());
    assert_eq!(chunks[0].ordinal, Some(0));
}

#[tokio::test]
async fn test_extract_from_non_media_fails() {
    if !ffmpeg_with_mp3() {
        eprintln!("Skipping: FFmpeg not installed");
        return;
    }

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.mp4");
    std::fs::write(&input, b"this is not a video").unwrap();

    let transcoder = FfmpegTranscoder::new(None).unwrap();
    let result = transcoder
        .extract_audio(&input, &dir.path().join("notes.mp3"), &AudioProfile::default())
        .await;

    assert!(result.is_err());
}
