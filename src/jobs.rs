use std::panic::{AssertUnwindSafe, catch_unwind};

use crossbeam_channel::{Receiver, TryRecvError, bounded};

use crate::foundation::error::{FramelabError, FramelabResult};

/// Bounded pool that runs pipeline calls off the caller's thread.
pub struct JobQueue {
    pool: rayon::ThreadPool,
}

impl JobQueue {
    /// `threads = None` uses rayon's default sizing.
    pub fn new(threads: Option<usize>) -> FramelabResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `job`; its result (or panic) is delivered through the returned handle.
    pub fn submit<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> FramelabResult<T> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.pool.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(FramelabError::job(format!("job panicked: {msg}")))
            });
            // The caller may have dropped its handle; nobody is left to tell.
            let _ = tx.send(result);
        });
        JobHandle { rx }
    }
}

/// Pollable result of a queued job. The result can be taken once.
pub struct JobHandle<T> {
    rx: Receiver<FramelabResult<T>>,
}

impl<T> JobHandle<T> {
    /// Non-blocking: `None` while the job is still queued or running.
    pub fn try_result(&self) -> Option<FramelabResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FramelabError::job(
                "job result already taken or worker lost",
            ))),
        }
    }

    /// True once a result is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until the job completes.
    pub fn wait(self) -> FramelabResult<T> {
        self.rx
            .recv()
            .map_err(|_| FramelabError::job("worker dropped the job without a result"))?
    }
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn build_thread_pool(threads: Option<usize>) -> FramelabResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(FramelabError::validation(
            "worker pool 'threads' must be >= 1 when set",
        ));
    }

    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("framelab-worker-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| FramelabError::job(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::foundation::error::ErrorKind;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(JobQueue::new(Some(0)).is_err());
        assert_eq!(JobQueue::new(Some(2)).unwrap().threads(), 2);
    }

    #[test]
    fn handle_polls_then_delivers() {
        let q = JobQueue::new(Some(1)).unwrap();
        let (gate_tx, gate_rx) = unbounded::<()>();
        let handle = q.submit(move || {
            gate_rx.recv_timeout(Duration::from_secs(10)).ok();
            Ok(7u32)
        });
        assert!(handle.try_result().is_none());
        gate_tx.send(()).unwrap();
        assert_eq!(handle.wait().unwrap(), 7);
    }

    #[test]
    fn polling_eventually_yields_the_result() {
        let q = JobQueue::new(Some(1)).unwrap();
        let handle = q.submit(|| Ok("done"));
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !handle.is_ready() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.try_result().unwrap().unwrap(), "done");
    }

    #[test]
    fn panics_become_job_errors() {
        let q = JobQueue::new(Some(1)).unwrap();
        let handle = q.submit(|| -> FramelabResult<()> { panic!("kaboom") });
        let err = handle.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Job);
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn handle_debug_does_not_consume_the_result() {
        let q = JobQueue::new(Some(1)).unwrap();
        let handle = q.submit(|| Ok(String::from("artifact")));
        assert!(format!("{handle:?}").starts_with("JobHandle"));
        assert_eq!(handle.wait().unwrap(), "artifact");
    }

    #[test]
    fn errors_pass_through_unchanged() {
        let q = JobQueue::new(None).unwrap();
        let handle = q.submit(|| -> FramelabResult<()> { Err(FramelabError::encode("disk full")) });
        assert_eq!(handle.wait().unwrap_err().kind(), ErrorKind::EncodeFailure);
    }
}
