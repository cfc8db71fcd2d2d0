use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use image::RgbImage;

use crate::foundation::{
    child::StderrTail,
    core::Fps,
    error::{FramelabError, FramelabResult},
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
}

impl EncodeConfig {
    pub fn validate(&self) -> FramelabResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramelabError::encode("encode width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(FramelabError::encode("encode fps must be non-zero"));
        }
        Ok(())
    }

    /// `yuv420p` needs even dimensions; odd geometries keep full chroma instead of being
    /// cropped or padded.
    pub fn output_pix_fmt(&self) -> &'static str {
        if self.width.is_multiple_of(2) && self.height.is_multiple_of(2) {
            "yuv420p"
        } else {
            "yuv444p"
        }
    }
}

pub fn default_mp4_config(
    out_path: impl Into<PathBuf>,
    width: u32,
    height: u32,
    fps: Fps,
) -> EncodeConfig {
    EncodeConfig {
        width,
        height,
        fps,
        out_path: out_path.into(),
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> FramelabResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            FramelabError::encode(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

/// Streams packed RGB24 frames into a system `ffmpeg` child writing an MP4.
///
/// The output path must not exist yet; ffmpeg is run with `-n`.
///
/// Dropping the encoder without [`FfmpegEncoder::finish`] closes its input and reaps the
/// child, so whatever was written so far is flushed to `out_path` and left there.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<StderrTail>,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> FramelabResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if cfg.out_path.exists() {
            return Err(FramelabError::encode(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(FramelabError::encode(
                "ffmpeg is required for video encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let rate = cfg.fps.ffmpeg_rate();
        cmd.args([
            "-n",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-framerate",
            &rate,
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            cfg.output_pix_fmt(),
            "-r",
            &rate,
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            FramelabError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let (stdin, stderr) = match (child.stdin.take(), child.stderr.take()) {
            (Some(stdin), Some(stderr)) => (stdin, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FramelabError::encode(
                    "failed to open ffmpeg encoder pipes (unexpected)",
                ));
            }
        };
        let stderr = match StderrTail::spawn(stderr, "ffmpeg-encode") {
            Ok(tail) => tail,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FramelabError::encode(format!(
                    "failed to start ffmpeg stderr reader: {e}"
                )));
            }
        };

        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            stderr: Some(stderr),
            frames_written: 0,
        })
    }

    pub fn encode_frame(&mut self, frame: &RgbImage) -> FramelabResult<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(FramelabError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramelabError::encode("ffmpeg encoder is already finalized"));
        };

        stdin.write_all(frame.as_raw()).map_err(|e| {
            FramelabError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> FramelabResult<u64> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(self.frames_written);
        };

        let status = child.wait().map_err(|e| {
            FramelabError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let diagnostics = self.stderr.take().map(StderrTail::collect).unwrap_or_default();

        if !status.success() {
            return Err(FramelabError::encode(format!(
                "ffmpeg exited with status {status}: {diagnostics}"
            )));
        }

        Ok(self.frames_written)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        drop(self.stderr.take());
    }
}
