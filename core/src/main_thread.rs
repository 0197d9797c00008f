//! Main-thread marshalling
//!
//! The animation surface may only be touched from the game's main thread.
//! Background work posts jobs through a [`MainThread`] handle; the owner of
//! the surface drains them with a [`MainThreadPump`], once per frame or in a
//! dedicated loop.

use tokio::sync::mpsc;

use crate::host::AnimationSurface;

type Job = Box<dyn FnOnce(&mut dyn AnimationSurface) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("main thread pump has shut down")]
pub struct MainThreadClosed;

/// Cloneable handle for posting surface jobs
#[derive(Clone)]
pub struct MainThread {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving side, owned by whoever owns the surface
pub struct MainThreadPump {
    rx: mpsc::UnboundedReceiver<Job>,
}

/// Create a connected handle / pump pair
pub fn channel() -> (MainThread, MainThreadPump) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainThread { tx }, MainThreadPump { rx })
}

impl MainThread {
    /// Queue a job; it runs on the next pump
    pub fn post<F>(&self, job: F) -> Result<(), MainThreadClosed>
    where
        F: FnOnce(&mut dyn AnimationSurface) + Send + 'static,
    {
        self.tx.send(Box::new(job)).map_err(|_| MainThreadClosed)
    }
}

impl MainThreadPump {
    /// Run every queued job without blocking. Returns how many ran.
    pub fn pump(&mut self, surface: &mut dyn AnimationSurface) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(surface);
            ran += 1;
        }
        ran
    }

    /// Block the current (non-async) thread running jobs until every
    /// [`MainThread`] handle is dropped
    pub fn run_until_closed(mut self, surface: &mut dyn AnimationSurface) {
        while let Some(job) = self.rx.blocking_recv() {
            job(surface);
        }
        tracing::debug!("Main thread pump closed");
    }
}
