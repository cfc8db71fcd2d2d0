use std::{
    io::{ErrorKind as IoErrorKind, Read},
    process::{Child, ChildStdout, Command, Stdio},
};

use image::RgbImage;

use crate::{
    foundation::{
        child::StderrTail,
        error::{FramelabError, FramelabResult},
    },
    media::probe::VideoSourceInfo,
};

/// Sequential RGB24 frame stream decoded by a system `ffmpeg` child process.
///
/// Dropping the reader before [`FrameReader::finish`] kills and reaps the child. The
/// child's stderr is drained concurrently, so diagnostics never stall the frame stream.
pub struct FrameReader {
    info: VideoSourceInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<StderrTail>,
    frames_read: u64,
}

impl FrameReader {
    pub fn open(info: &VideoSourceInfo) -> FramelabResult<Self> {
        if info.frame_len() == 0 {
            return Err(FramelabError::source_read(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }

        // No autorotate: frames must keep the geometry ffprobe reported.
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(&info.source_path)
            .args([
                "-map",
                "0:v:0",
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FramelabError::source_read(format!(
                    "failed to spawn ffmpeg for video decode (is it installed and on PATH?): {e}"
                ))
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                reap(&mut child);
                return Err(FramelabError::source_read(
                    "failed to open ffmpeg decoder pipes (unexpected)",
                ));
            }
        };
        let stderr = match StderrTail::spawn(stderr, "ffmpeg-decode") {
            Ok(tail) => tail,
            Err(e) => {
                reap(&mut child);
                return Err(FramelabError::source_read(format!(
                    "failed to start ffmpeg stderr reader: {e}"
                )));
            }
        };

        Ok(Self {
            info: info.clone(),
            child: Some(child),
            stdout: Some(stdout),
            stderr: Some(stderr),
            frames_read: 0,
        })
    }

    /// Next frame in source order; `Ok(None)` at end of stream.
    pub fn next_frame(&mut self) -> FramelabResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.info.frame_len()];
        let mut filled = 0usize;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(FramelabError::source_read(format!(
                        "failed to read frame {} from ffmpeg: {e}",
                        self.frames_read
                    )));
                }
            }
        }

        if filled == 0 {
            self.stdout = None;
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(FramelabError::source_read(format!(
                "truncated frame {}: got {filled} of {} bytes",
                self.frames_read,
                buf.len()
            )));
        }

        let frame = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| FramelabError::source_read("decoded frame buffer size mismatch"))?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Reap the decoder and surface any error it reported.
    pub fn finish(mut self) -> FramelabResult<u64> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(self.frames_read);
        };

        let status = child.wait().map_err(|e| {
            FramelabError::source_read(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let diagnostics = self.stderr.take().map(StderrTail::collect).unwrap_or_default();
        if !status.success() {
            return Err(FramelabError::source_read(format!(
                "ffmpeg decoder exited with status {status}: {diagnostics}"
            )));
        }
        Ok(self.frames_read)
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            reap(&mut child);
        }
        // Joined after the child is gone, so the pipe is already closed.
        drop(self.stderr.take());
    }
}
