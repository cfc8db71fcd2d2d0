use std::path::{Path, PathBuf};

use crate::foundation::{
    core::Fps,
    error::{FramelabError, FramelabResult},
};

#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

impl VideoSourceInfo {
    /// Byte length of one packed RGB24 frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

pub fn is_ffprobe_on_path() -> bool {
    std::process::Command::new("ffprobe")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read geometry and frame rate of the first video stream via `ffprobe`.
pub fn probe_video(source_path: &Path) -> FramelabResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        avg_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    if !source_path.is_file() {
        return Err(FramelabError::source_read(format!(
            "video source '{}' does not exist",
            source_path.display()
        )));
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| FramelabError::source_read(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(FramelabError::source_read(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| FramelabError::source_read(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed.streams.first().ok_or_else(|| {
        FramelabError::source_read(format!(
            "no video stream found in '{}'",
            source_path.display()
        ))
    })?;
    let width = stream
        .width
        .filter(|&w| w > 0)
        .ok_or_else(|| FramelabError::source_read("missing video width from ffprobe"))?;
    let height = stream
        .height
        .filter(|&h| h > 0)
        .ok_or_else(|| FramelabError::source_read("missing video height from ffprobe"))?;

    let (num, den) = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .find_map(|r| r.as_deref().and_then(parse_ff_ratio))
        .ok_or_else(|| FramelabError::source_read("invalid video frame rate from ffprobe"))?;
    let fps = Fps::new(num, den).map_err(|e| FramelabError::source_read(e.to_string()))?;

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.trim().parse::<u32>().ok()?;
    let b = match parts.next() {
        Some(b) => b.trim().parse::<u32>().ok()?,
        None => 1,
    };
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::ErrorKind;

    #[test]
    fn ratio_parsing_rejects_degenerate_rates() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("25"), Some((25, 1)));
        assert_eq!(parse_ff_ratio("0/0"), None);
        assert_eq!(parse_ff_ratio("30/0"), None);
        assert_eq!(parse_ff_ratio("abc"), None);
    }

    #[test]
    fn missing_file_is_a_source_read_failure() {
        let err = probe_video(Path::new("definitely/not/here.mp4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceReadFailure);
    }

    #[test]
    fn frame_len_is_rgb24() {
        let info = VideoSourceInfo {
            source_path: PathBuf::from("a.mp4"),
            width: 4,
            height: 2,
            fps: Fps::new(30, 1).unwrap(),
        };
        assert_eq!(info.frame_len(), 24);
    }
}
