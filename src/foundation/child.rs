use std::{
    io::Read,
    process::ChildStderr,
    thread::{self, JoinHandle},
};

/// Bytes of child diagnostics kept for error messages; older output is discarded.
pub const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// Drains a child's stderr on a background thread so the child never blocks on a full
/// pipe, keeping only the last [`STDERR_TAIL_BYTES`] bytes.
///
/// Dropping the drain joins the thread, which ends once every writer of the pipe has
/// exited or closed it.
#[derive(Debug)]
pub struct StderrTail {
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl StderrTail {
    pub fn spawn(mut stderr: ChildStderr, name: &str) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("{name}-stderr"))
            .spawn(move || {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 8192];
                loop {
                    match stderr.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => push_bounded(&mut tail, &chunk[..n], STDERR_TAIL_BYTES),
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
                tail
            })?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the child to close stderr and return what was kept, lossily decoded.
    pub fn collect(mut self) -> String {
        self.join()
    }

    fn join(&mut self) -> String {
        let Some(handle) = self.handle.take() else {
            return String::new();
        };
        let bytes = handle.join().unwrap_or_default();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

impl Drop for StderrTail {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

fn push_bounded(tail: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    tail.extend_from_slice(chunk);
    if tail.len() > cap {
        let excess = tail.len() - cap;
        tail.drain(..excess);
    }
}
