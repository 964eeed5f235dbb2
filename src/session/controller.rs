use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::session::{Session, SessionShared};
use super::state::{SessionState, SessionStatus, SharedMode, StateCell, VideoMode};
use super::stats::{PipelineCounters, SessionStats};
use crate::bridge::{BridgeHandle, ConnectionAdapter, DispatchBridge, Outbound};
use crate::devices::DeviceProvider;
use crate::error::{ConnectionError, Error, StateError};

#[derive(Default)]
struct Lifecycle {
    /// Survives across sessions; restarted if its thread has exited
    bridge: Option<DispatchBridge>,
    session: Option<Session>,
}

/// Owns the lifecycle of the single live session.
///
/// `start`, `stop`, `change_mode` and `send_text` block the caller and are
/// serialized against each other. `status` never blocks on them.
pub struct SessionController {
    config: SessionConfig,
    adapter: Arc<dyn ConnectionAdapter>,
    devices: Arc<dyn DeviceProvider>,
    state: StateCell,
    mode: SharedMode,
    lifecycle: Mutex<Lifecycle>,
    /// Counters of the current session, or the last one after stop
    stats: Mutex<Option<Arc<PipelineCounters>>>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        adapter: Arc<dyn ConnectionAdapter>,
        devices: Arc<dyn DeviceProvider>,
    ) -> Self {
        Self {
            config,
            adapter,
            devices,
            state: StateCell::new(),
            mode: SharedMode::default(),
            lifecycle: Mutex::new(Lifecycle::default()),
            stats: Mutex::new(None),
        }
    }

    /// Connect to the remote service and start every pipeline.
    pub fn start(&self, mode: VideoMode) -> Result<(), Error> {
        let mut lifecycle = self.lock_lifecycle();
        if self.state.get() != SessionState::Inactive {
            return Err(StateError::AlreadyActive.into());
        }

        info!("Starting session ({} mode)", mode);
        self.state.set(SessionState::Connecting);

        let bridge = match self.ensure_bridge(&mut lifecycle) {
            Ok(bridge) => bridge,
            Err(e) => {
                error!("Failed to start dispatch bridge: {}", e);
                self.state.set(SessionState::Inactive);
                return Err(e);
            }
        };

        if let Err(e) = bridge.connect() {
            error!("Error in connection: {}", e);
            // A connect that outlived its caller may still succeed inside the bridge
            bridge.request_close();
            self.state.set(SessionState::Inactive);
            return Err(match e {
                Error::Timeout(timeout) => ConnectionError::ConnectTimedOut(timeout.after).into(),
                other => other,
            });
        }

        let previous = self.mode.swap(mode);
        let shared = SessionShared::new(
            self.config.clone(),
            self.mode.clone(),
            bridge.clone(),
            Arc::clone(&self.devices),
        );

        let session = match Session::spawn(shared) {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to spawn session workers: {}", e);
                self.mode.swap(previous);
                bridge.request_close();
                self.state.set(SessionState::Inactive);
                return Err(e);
            }
        };

        info!("Session {} started", session.id());
        *self.lock_stats() = Some(session.counters());
        lifecycle.session = Some(session);
        self.state.set(SessionState::Active);
        Ok(())
    }

    /// Stop every pipeline and close the connection.
    pub fn stop(&self) -> Result<(), Error> {
        let mut lifecycle = self.lock_lifecycle();
        if self.state.get() != SessionState::Active {
            return Err(StateError::NotActive.into());
        }

        let Some(session) = lifecycle.session.take() else {
            self.state.set(SessionState::Inactive);
            return Err(StateError::NotActive.into());
        };

        self.state.set(SessionState::Stopping);
        info!("Stopping session {}", session.id());

        let bridge = session.bridge();
        session.shutdown(self.config.join_timeout);

        if let Err(e) = bridge.close() {
            warn!("Error closing session: {}", e);
        }

        self.state.set(SessionState::Inactive);
        info!("Session closed successfully");
        Ok(())
    }

    /// Switch the video source without restarting any pipeline.
    pub fn change_mode(&self, mode: VideoMode) -> Result<(), Error> {
        let _lifecycle = self.lock_lifecycle();
        if self.state.get() != SessionState::Active {
            return Err(StateError::NotActive.into());
        }

        let previous = self.mode.swap(mode);
        info!("Mode changed from {} to {}", previous, mode);
        Ok(())
    }

    /// Send one complete user text turn.
    ///
    /// Only lifecycle and input errors are returned. A send that fails or
    /// times out inside the bridge is logged and counted as dropped.
    pub fn send_text(&self, text: &str) -> Result<(), Error> {
        let (bridge, counters) = self.active_bridge()?;
        if text.is_empty() {
            return Err(StateError::EmptyText.into());
        }

        info!("Sending text: {}", text);
        match bridge.send(Outbound::Text(text.to_string())) {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                counters.bridge_timeouts.inc();
                warn!("Dropped text after bridge timeout: {}", e);
            }
            Err(e) => {
                counters.send_failures.inc();
                warn!("Error sending text: {}", e);
            }
        }
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state.get().observed(),
            mode: self.mode.get(),
        }
    }

    /// Pipeline counters for the current session, or the last one
    pub fn stats(&self) -> Option<SessionStats> {
        self.lock_stats().as_ref().map(|counters| counters.snapshot())
    }

    fn active_bridge(&self) -> Result<(BridgeHandle, Arc<PipelineCounters>), Error> {
        let lifecycle = self.lock_lifecycle();
        if self.state.get() != SessionState::Active {
            return Err(StateError::NotActive.into());
        }
        lifecycle
            .session
            .as_ref()
            .map(|session| (session.bridge(), session.counters()))
            .ok_or_else(|| StateError::NotActive.into())
    }

    fn ensure_bridge(&self, lifecycle: &mut Lifecycle) -> Result<BridgeHandle, Error> {
        if let Some(bridge) = &lifecycle.bridge {
            if bridge.is_running() {
                return Ok(bridge.handle());
            }
            warn!("Dispatch bridge exited, starting a new one");
        }

        let bridge = DispatchBridge::spawn(Arc::clone(&self.adapter), self.config.bridge.clone())?;
        let handle = bridge.handle();
        lifecycle.bridge = Some(bridge);
        Ok(handle)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, Option<Arc<PipelineCounters>>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = lifecycle.session.take() {
            info!("Controller dropped with session {} running, stopping it", session.id());
            let bridge = session.bridge();
            session.shutdown(self.config.join_timeout);
            bridge.request_close();
        }
    }
}
