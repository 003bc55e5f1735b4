use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Lifecycle of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Running,
    Paused,
    Stopping,
    Done,
}

/// Shared pause/resume/stop state between a caller and the scan worker
///
/// Every transition happens under one mutex; the worker parks on the
/// condition variable while paused and is woken by `resume` or `stop`.
#[derive(Debug, Clone)]
pub struct ScanControl {
    inner: Arc<(Mutex<EnginePhase>, Condvar)>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(EnginePhase::Idle), Condvar::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnginePhase> {
        // The phase is a plain enum, a panic elsewhere cannot leave it half-written
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> EnginePhase {
        *self.lock()
    }

    /// Running → Paused. Returns whether the transition happened.
    pub fn pause(&self) -> bool {
        let mut phase = self.lock();
        if *phase != EnginePhase::Running {
            debug!("Ignoring pause while {:?}", *phase);
            return false;
        }
        *phase = EnginePhase::Paused;
        self.inner.1.notify_all();
        info!("Processing paused.");
        true
    }

    /// Paused → Running. Returns whether the transition happened.
    pub fn resume(&self) -> bool {
        let mut phase = self.lock();
        if *phase != EnginePhase::Paused {
            debug!("Ignoring resume while {:?}", *phase);
            return false;
        }
        *phase = EnginePhase::Running;
        self.inner.1.notify_all();
        info!("Processing resumed.");
        true
    }

    /// Any phase except Done → Stopping. Returns whether the transition happened.
    pub fn stop(&self) -> bool {
        let mut phase = self.lock();
        match *phase {
            EnginePhase::Done | EnginePhase::Stopping => false,
            _ => {
                *phase = EnginePhase::Stopping;
                self.inner.1.notify_all();
                info!("Processing stopped by user.");
                true
            }
        }
    }

    /// Idle or Done → Running. False if a stop arrived before the run started
    /// or a run is already in progress.
    pub(crate) fn begin(&self) -> bool {
        let mut phase = self.lock();
        match *phase {
            EnginePhase::Idle | EnginePhase::Done => {
                *phase = EnginePhase::Running;
                self.inner.1.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Frame boundary: block while paused, then report whether to keep going
    pub(crate) fn checkpoint(&self) -> bool {
        let guard = self.lock();
        let phase = self
            .inner
            .1
            .wait_while(guard, |phase| *phase == EnginePhase::Paused)
            .unwrap_or_else(PoisonError::into_inner);
        *phase == EnginePhase::Running
    }

    pub(crate) fn finish(&self) {
        let mut phase = self.lock();
        *phase = EnginePhase::Done;
        self.inner.1.notify_all();
    }

    /// Wait until the phase equals `target` or the timeout elapses
    pub fn wait_for(&self, target: EnginePhase, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut phase = self.lock();
        while *phase != target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            phase = self
                .inner
                .1
                .wait_timeout(phase, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}
