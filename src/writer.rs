//! Background snapshot writer
//!
//! One thread per store. There is a single pending slot: a request arriving
//! while another waits replaces it, so at most one write runs and at most one
//! waits behind it.

use crate::error::{Result, StoreError};
use crate::persist::{self, Snapshot};
use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A snapshot bound for a file
#[derive(Debug)]
pub struct SaveJob {
    pub snapshot: Snapshot,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct WriterState {
    pending: Option<SaveJob>,
    in_flight: bool,
    shutdown: bool,
    completed: u64,
}

#[derive(Debug, Default)]
struct WriterInner {
    state: Mutex<WriterState>,
    cv: Condvar,
}

#[derive(Debug)]
pub struct SaveWorker {
    inner: Arc<WriterInner>,
    handle: Option<JoinHandle<()>>,
}

impl SaveWorker {
    pub fn spawn() -> Result<Self> {
        let inner = Arc::new(WriterInner::default());
        let handle = thread::Builder::new()
            .name("tagindex-save".to_owned())
            .spawn({
                let inner = inner.clone();
                move || Self::run_worker(inner)
            })
            .map_err(StoreError::Worker)?;

        Ok(Self {
            inner,
            handle: Some(handle),
        })
    }

    /// Queue a write, replacing any write not yet started
    pub fn submit(&self, job: SaveJob) {
        let mut state = self.inner.state.lock();
        if let Some(replaced) = state.pending.replace(job) {
            log::debug!("Superseding queued save to {}", replaced.path.display());
        }
        self.inner.cv.notify_all();
    }

    /// Block until nothing is queued or being written
    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        while state.pending.is_some() || state.in_flight {
            self.inner.cv.wait(&mut state);
        }
    }

    /// Number of writes finished (successfully or not) so far
    #[cfg(test)]
    fn completed(&self) -> u64 {
        self.inner.state.lock().completed
    }

    fn run_worker(inner: Arc<WriterInner>) {
        loop {
            let job = {
                let mut state = inner.state.lock();
                loop {
                    if let Some(job) = state.pending.take() {
                        state.in_flight = true;
                        break job;
                    }
                    if state.shutdown {
                        return;
                    }
                    inner.cv.wait(&mut state);
                }
            };

            if let Err(e) = Self::write(&job) {
                log::error!("Failed to save state to {}: {}", job.path.display(), e);
            }

            let mut state = inner.state.lock();
            state.in_flight = false;
            state.completed += 1;
            log::trace!("Save worker finished {} writes", state.completed);
            inner.cv.notify_all();
        }
    }

    fn write(job: &SaveJob) -> Result<()> {
        let bytes = job.snapshot.encode()?;
        persist::write_atomic(&job.path, &bytes)
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            self.inner.cv.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Save worker thread panicked");
            }
        }
    }
}
