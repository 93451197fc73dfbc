//! Threading Primitives
//!
//! Named background threads for long-lived workers.

use std::thread::{self, JoinHandle};

use crate::{PlatformError, PlatformResult};

/// Thread wrapper that keeps its name for diagnostics
pub struct Thread {
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl Thread {
    /// Spawn a new thread with the given name and function
    pub fn spawn<F>(name: impl Into<String>, f: F) -> PlatformResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|source| PlatformError::ThreadSpawn {
                name: name.clone(),
                source,
            })?;

        log::trace!("Spawned thread '{}'", name);

        Ok(Self {
            handle: Some(handle),
            name,
        })
    }

    /// Get the thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join the thread, waiting for it to complete.
    ///
    /// Joining an already joined thread is a no-op.
    pub fn join(&mut self) -> PlatformResult<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlatformError::ThreadPanicked(self.name.clone())),
            None => Ok(()),
        }
    }

    /// Check if the thread has finished
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_thread_spawn() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let mut thread = Thread::spawn("test-thread", move || {
            counter_clone.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(thread.name(), "test-thread");
        thread.join().unwrap();
        assert!(thread.is_finished());
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_join_twice() {
        let mut thread = Thread::spawn("noop", || {}).unwrap();
        thread.join().unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_panicking_thread_reports_name() {
        let mut thread = Thread::spawn("doomed", || panic!("boom")).unwrap();
        let result = thread.join();
        assert!(matches!(result, Err(PlatformError::ThreadPanicked(name)) if name == "doomed"));
    }
}
