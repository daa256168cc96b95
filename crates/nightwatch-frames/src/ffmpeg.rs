//! Shells out to `ffprobe`/`ffmpeg` to read clip metadata and extract
//! individual frames, rather than linking a native decoding library.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Coarse metadata about a video clip, enough to compute evenly-spaced
/// frame indices.
#[derive(Debug, Clone, Copy)]
pub struct ClipInfo {
    pub duration_secs: f64,
    pub total_frames: u32,
}

/// Probes a clip's duration and frame rate with `ffprobe`, then estimates
/// its total frame count as `duration * frame_rate`.
pub async fn probe_clip(path: &Path) -> Result<ClipInfo> {
    let path_str = path.to_string_lossy().to_string();
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate,duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(&path_str)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Probe {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::Probe {
            path: path_str,
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    let frame_rate_raw = lines.next().ok_or_else(|| Error::Probe {
        path: path_str.clone(),
        message: "ffprobe returned no frame rate".to_string(),
    })?;
    let duration_raw = lines.next().ok_or_else(|| Error::Probe {
        path: path_str.clone(),
        message: "ffprobe returned no duration".to_string(),
    })?;

    let frame_rate = parse_frame_rate(frame_rate_raw).ok_or_else(|| Error::Probe {
        path: path_str.clone(),
        message: format!("unparseable frame rate: {frame_rate_raw}"),
    })?;
    let duration_secs: f64 = duration_raw.trim().parse().map_err(|_| Error::Probe {
        path: path_str.clone(),
        message: format!("unparseable duration: {duration_raw}"),
    })?;

    let total_frames = (duration_secs * frame_rate).round().max(0.0) as u32;
    Ok(ClipInfo {
        duration_secs,
        total_frames,
    })
}

fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        raw.parse().ok()
    }
}

/// Extracts a single frame at `timestamp_secs` into a temp file under
/// `dest_dir`, decodes it and returns the raw pixel bytes as a PNG-free
/// decoded image buffer via the `image` crate.
pub async fn extract_frame_at(
    clip_path: &Path,
    timestamp_secs: f64,
    dest_dir: &Path,
    index: u32,
) -> Result<image::DynamicImage> {
    let frame_path = dest_dir.join(format!("frame_{index:06}.jpg"));
    let path_str = clip_path.to_string_lossy().to_string();

    let status = Command::new("ffmpeg")
        .args([
            "-ss",
            &format!("{timestamp_secs:.3}"),
            "-i",
            &path_str,
            "-vframes",
            "1",
            "-q:v",
            "2",
            "-y",
        ])
        .arg(&frame_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| Error::Extract {
            path: path_str.clone(),
            index,
            message: e.to_string(),
        })?;

    if !status.success() || !frame_path.exists() {
        return Err(Error::Extract {
            path: path_str,
            index,
            message: "ffmpeg did not produce the expected frame file".to_string(),
        });
    }

    let bytes = tokio::fs::read(&frame_path).await.map_err(|e| Error::Extract {
        path: path_str.clone(),
        index,
        message: e.to_string(),
    })?;
    let _ = tokio::fs::remove_file(&frame_path).await;

    image::load_from_memory(&bytes).map_err(|e| Error::Decode {
        index,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(30000.0 / 1001.0));
    }

    #[test]
    fn parses_whole_number_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
    }

    #[test]
    fn parses_plain_decimal_frame_rate() {
        assert_eq!(parse_frame_rate("29.97"), Some(29.97));
    }

    #[test]
    fn rejects_zero_denominator() {
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn rejects_garbage_input() {
        assert_eq!(parse_frame_rate("not-a-rate"), None);
    }
}
