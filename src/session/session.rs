use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::state::{ActiveFlag, SharedMode};
use super::stats::PipelineCounters;
use super::workers;
use crate::bridge::BridgeHandle;
use crate::devices::{AudioChunk, DeviceProvider, Frame};
use crate::error::Error;
use crate::queue::BoundedQueue;

/// State shared by reference with every worker of one session
pub(crate) struct SessionShared {
    pub id: String,
    pub config: SessionConfig,
    pub active: ActiveFlag,
    pub mode: SharedMode,
    pub bridge: BridgeHandle,
    pub devices: Arc<dyn DeviceProvider>,

    pub video: BoundedQueue<Frame>,
    pub audio_out: BoundedQueue<AudioChunk>,
    pub audio_in: BoundedQueue<Vec<u8>>,

    pub counters: Arc<PipelineCounters>,
}

impl SessionShared {
    pub(crate) fn new(
        config: SessionConfig,
        mode: SharedMode,
        bridge: BridgeHandle,
        devices: Arc<dyn DeviceProvider>,
    ) -> Self {
        let id = format!("session-{}", uuid::Uuid::new_v4());
        Self {
            video: BoundedQueue::new(config.video_queue_capacity),
            audio_out: BoundedQueue::with_soft_cap(config.audio_out_soft_cap),
            audio_in: BoundedQueue::new(config.audio_in_capacity),
            counters: Arc::new(PipelineCounters::new(id.clone())),
            id,
            config,
            active: ActiveFlag::new(),
            mode,
            bridge,
            devices,
        }
    }
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Wait up to `timeout` for the thread; abandon it if still running.
    fn join(self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    "{} did not stop within {:?}, leaving it to finish in the background",
                    self.name, timeout
                );
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        if self.handle.join().is_err() {
            error!("{} thread panicked", self.name);
        }
    }
}

/// One running session: its shared state plus the six worker threads.
///
/// Created by a successful `start()` and consumed by `stop()`.
pub(crate) struct Session {
    shared: Arc<SessionShared>,
    workers: Vec<Worker>,
}

impl Session {
    /// Spawn every pipeline worker.
    ///
    /// If a spawn fails, the workers already running are told to stop.
    pub(crate) fn spawn(shared: SessionShared) -> Result<Self, Error> {
        let shared = Arc::new(shared);
        let mut workers = Vec::with_capacity(workers::PIPELINE.len());

        for &(name, body) in workers::PIPELINE {
            let context = Arc::clone(&shared);
            let spawned = std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || body(context));

            match spawned {
                Ok(handle) => workers.push(Worker { name, handle }),
                Err(source) => {
                    shared.active.deactivate();
                    return Err(Error::Spawn { name, source });
                }
            }
        }

        info!("Session {} running {} workers", shared.id, workers.len());
        Ok(Self { shared, workers })
    }

    pub(crate) fn id(&self) -> &str {
        &self.shared.id
    }

    pub(crate) fn bridge(&self) -> BridgeHandle {
        self.shared.bridge.clone()
    }

    pub(crate) fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.shared.counters)
    }

    /// Clear the active flag and join every worker with a bounded wait
    pub(crate) fn shutdown(self, join_timeout: Duration) {
        self.shared.active.deactivate();
        for worker in self.workers {
            worker.join(join_timeout);
        }
        self.shared.counters.mark_ended();
    }
}
