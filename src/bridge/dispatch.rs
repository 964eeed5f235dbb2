use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::connection::{ConnectionAdapter, ConnectionHandle, InboundEvent, Outbound};
use crate::error::{ConnectionError, Error, TimeoutError};

/// Timing for the dispatch bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long a submitter waits for any operation (default 10s)
    pub call_timeout: Duration,
    /// Upper bound on opening the remote connection
    pub connect_timeout: Duration,
    /// How long `spawn` waits for the bridge thread to come up
    pub ready_timeout: Duration,
    /// How long one drain collects inbound events before returning
    pub drain_window: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_millis(500),
            drain_window: Duration::from_millis(50),
        }
    }
}

enum Operation {
    Connect,
    Send(Outbound),
    Drain,
    Close,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Send(_) => "send",
            Operation::Drain => "drain",
            Operation::Close => "close",
        }
    }
}

enum Completion {
    Done,
    Events(Vec<InboundEvent>),
}

type Reply = Result<Completion, Error>;

struct Request {
    op: Operation,
    reply: SyncSender<Reply>,
}

/// Owns the bridge thread.
///
/// The thread runs until every [`BridgeHandle`] (including the one held
/// here) has been dropped, then closes any connection it still holds.
pub struct DispatchBridge {
    handle: BridgeHandle,
    thread: JoinHandle<()>,
}

impl DispatchBridge {
    /// Spawn the bridge thread and wait briefly for it to come up.
    pub fn spawn(adapter: Arc<dyn ConnectionAdapter>, config: BridgeConfig) -> Result<Self, Error> {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = sync_channel(1);
        let connected = Arc::new(AtomicBool::new(false));

        let worker = BridgeLoop {
            adapter,
            connection: None,
            connected: Arc::clone(&connected),
            config: config.clone(),
        };

        let thread = std::thread::Builder::new()
            .name("dispatch-bridge".to_string())
            .spawn(move || worker.run(inbox, ready_tx))
            .map_err(|source| Error::Spawn {
                name: "dispatch-bridge",
                source,
            })?;

        match ready_rx.recv_timeout(config.ready_timeout) {
            Ok(()) => debug!("Dispatch bridge ready"),
            Err(RecvTimeoutError::Timeout) => warn!(
                "Dispatch bridge not ready after {:?}, requests will queue",
                config.ready_timeout
            ),
            Err(RecvTimeoutError::Disconnected) => return Err(ConnectionError::BridgeClosed.into()),
        }

        Ok(Self {
            handle: BridgeHandle {
                requests,
                connected,
                call_timeout: config.call_timeout,
                connect_timeout: config.connect_timeout,
            },
            thread,
        })
    }

    /// A cloneable submission handle
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Whether the bridge thread is still alive
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Submits operations to the bridge from any thread.
///
/// Every call blocks the calling thread until the bridge answers or the
/// call deadline passes. A timed-out call is not cancelled inside the bridge
/// until the bridge's own deadline for it expires.
#[derive(Clone)]
pub struct BridgeHandle {
    requests: mpsc::UnboundedSender<Request>,
    connected: Arc<AtomicBool>,
    call_timeout: Duration,
    connect_timeout: Duration,
}

impl BridgeHandle {
    /// Open the remote connection, replacing any connection already open.
    pub fn connect(&self) -> Result<(), Error> {
        self.submit(Operation::Connect, self.connect_timeout.max(self.call_timeout))
            .map(|_| ())
    }

    pub fn send(&self, payload: Outbound) -> Result<(), Error> {
        self.submit(Operation::Send(payload), self.call_timeout).map(|_| ())
    }

    /// Collect the inbound events available within one drain window.
    pub fn drain(&self) -> Result<Vec<InboundEvent>, Error> {
        match self.submit(Operation::Drain, self.call_timeout)? {
            Completion::Events(events) => Ok(events),
            Completion::Done => Ok(Vec::new()),
        }
    }

    /// Close the connection. A no-op when nothing is open.
    pub fn close(&self) -> Result<(), Error> {
        self.submit(Operation::Close, self.call_timeout).map(|_| ())
    }

    /// Queue a close without waiting for it to run
    pub fn request_close(&self) {
        let (reply, _) = sync_channel(1);
        if self
            .requests
            .send(Request {
                op: Operation::Close,
                reply,
            })
            .is_err()
        {
            debug!("Dispatch bridge already gone, nothing to close");
        }
    }

    /// Whether the bridge currently holds an open connection
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn submit(&self, op: Operation, wait: Duration) -> Result<Completion, Error> {
        let name = op.name();
        let (reply, response) = sync_channel(1);

        self.requests
            .send(Request { op, reply })
            .map_err(|_| ConnectionError::BridgeClosed)?;

        match response.recv_timeout(wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TimeoutError { op: name, after: wait }.into()),
            Err(RecvTimeoutError::Disconnected) => Err(ConnectionError::BridgeClosed.into()),
        }
    }
}

struct BridgeLoop {
    adapter: Arc<dyn ConnectionAdapter>,
    connection: Option<Box<dyn ConnectionHandle>>,
    connected: Arc<AtomicBool>,
    config: BridgeConfig,
}

impl BridgeLoop {
    fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Request>, ready: SyncSender<()>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to build dispatch bridge runtime: {}", e);
                return;
            }
        };

        runtime.block_on(async move {
            info!("Dispatch bridge started ({})", self.adapter.name());
            let _ = ready.send(());

            while let Some(request) = inbox.recv().await {
                let op = request.op.name();
                let deadline = match request.op {
                    Operation::Connect => self.config.connect_timeout.max(self.config.call_timeout),
                    _ => self.config.call_timeout,
                };

                let result = match tokio::time::timeout(deadline, self.execute(request.op)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Bridge abandoned {} after {:?}", op, deadline);
                        Err(TimeoutError { op, after: deadline }.into())
                    }
                };

                self.connected.store(self.connection.is_some(), Ordering::SeqCst);

                if request.reply.send(result).is_err() {
                    debug!("{} completed after its submitter stopped waiting", op);
                }
            }

            if let Some(mut connection) = self.connection.take() {
                if let Err(e) = connection.close().await {
                    warn!("Failed to close connection on bridge shutdown: {}", e);
                }
            }
            self.connected.store(false, Ordering::SeqCst);
            info!("Dispatch bridge stopped");
        });
    }

    async fn execute(&mut self, op: Operation) -> Reply {
        match op {
            Operation::Connect => {
                if let Some(mut existing) = self.connection.take() {
                    warn!("Replacing open connection {}", existing.session_id());
                    if let Err(e) = existing.close().await {
                        warn!("Failed to close replaced connection: {}", e);
                    }
                }

                let timeout = self.config.connect_timeout;
                let connection = match tokio::time::timeout(timeout, self.adapter.connect()).await {
                    Ok(result) => result?,
                    Err(_) => return Err(ConnectionError::ConnectTimedOut(timeout).into()),
                };

                info!(
                    "Connected to {} (remote session {})",
                    self.adapter.name(),
                    connection.session_id()
                );
                self.connection = Some(connection);
                Ok(Completion::Done)
            }

            Operation::Send(payload) => {
                let connection = self.connection.as_mut().ok_or(ConnectionError::NotConnected)?;
                connection.send(payload).await?;
                Ok(Completion::Done)
            }

            Operation::Drain => self.drain().await.map(Completion::Events),

            Operation::Close => {
                if let Some(mut connection) = self.connection.take() {
                    connection.close().await?;
                    info!("Connection {} closed", connection.session_id());
                }
                Ok(Completion::Done)
            }
        }
    }

    async fn drain(&mut self) -> Result<Vec<InboundEvent>, Error> {
        let connection = self.connection.as_mut().ok_or(ConnectionError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + self.config.drain_window;
        let mut events = Vec::new();
        let mut ended = false;

        loop {
            match tokio::time::timeout_at(deadline, connection.next_event()).await {
                // Window closed with nothing further pending
                Err(_) => break,
                Ok(Some(Ok(event))) => {
                    let turn_complete = event.turn_complete;
                    events.push(event);
                    if turn_complete {
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    if events.is_empty() {
                        return Err(e.into());
                    }
                    warn!("Receive failed after {} events: {}", events.len(), e);
                    break;
                }
                Ok(None) => {
                    ended = true;
                    break;
                }
            }
        }

        if ended {
            warn!("Inbound stream ended, dropping connection");
            if let Some(mut connection) = self.connection.take() {
                if let Err(e) = connection.close().await {
                    debug!("Close after end of stream failed: {}", e);
                }
            }
            if events.is_empty() {
                return Err(ConnectionError::StreamClosed.into());
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Adapter whose connections sleep `send_delay` on every send
    struct SlowAdapter {
        send_delay: Duration,
        connects: AtomicUsize,
        sent: Arc<Mutex<Vec<&'static str>>>,
        inbound: Arc<Mutex<Vec<InboundEvent>>>,
        fail_connect: bool,
        fail_close: bool,
    }

    impl SlowAdapter {
        fn new(send_delay: Duration) -> Self {
            Self {
                send_delay,
                connects: AtomicUsize::new(0),
                sent: Arc::new(Mutex::new(Vec::new())),
                inbound: Arc::new(Mutex::new(Vec::new())),
                fail_connect: false,
                fail_close: false,
            }
        }
    }

    struct SlowConnection {
        send_delay: Duration,
        fail_close: bool,
        sent: Arc<Mutex<Vec<&'static str>>>,
        inbound: Arc<Mutex<Vec<InboundEvent>>>,
    }

    #[async_trait::async_trait]
    impl ConnectionAdapter for SlowAdapter {
        async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(ConnectionError::ConnectFailed("refused".into()));
            }
            Ok(Box::new(SlowConnection {
                send_delay: self.send_delay,
                fail_close: self.fail_close,
                sent: Arc::clone(&self.sent),
                inbound: Arc::clone(&self.inbound),
            }))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[async_trait::async_trait]
    impl ConnectionHandle for SlowConnection {
        fn session_id(&self) -> &str {
            "slow-1"
        }

        async fn send(&mut self, payload: Outbound) -> Result<(), ConnectionError> {
            if let Outbound::Text(text) = &payload {
                if text == "slow" {
                    tokio::time::sleep(self.send_delay).await;
                }
            }
            self.sent.lock().unwrap().push(payload.kind());
            Ok(())
        }

        async fn next_event(&mut self) -> Option<Result<InboundEvent, ConnectionError>> {
            let next = {
                let mut inbound = self.inbound.lock().unwrap();
                if inbound.is_empty() {
                    None
                } else {
                    Some(inbound.remove(0))
                }
            };
            match next {
                Some(event) => Some(Ok(event)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), ConnectionError> {
            if self.fail_close {
                return Err(ConnectionError::SendFailed("socket already gone".into()));
            }
            Ok(())
        }
    }

    fn config(call_timeout: Duration) -> BridgeConfig {
        BridgeConfig {
            call_timeout,
            connect_timeout: call_timeout,
            ready_timeout: Duration::from_secs(1),
            drain_window: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_connect_then_send() {
        let adapter = Arc::new(SlowAdapter::new(Duration::ZERO));
        let bridge = DispatchBridge::spawn(adapter.clone(), config(Duration::from_secs(1))).unwrap();
        let handle = bridge.handle();

        assert!(!handle.is_connected());
        handle.connect().unwrap();
        assert!(handle.is_connected());
        assert!(bridge.is_running());

        handle.send(Outbound::Text("hello".into())).unwrap();
        assert_eq!(*adapter.sent.lock().unwrap(), vec!["text"]);

        handle.close().unwrap();
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_send_without_connection_fails() {
        let adapter = Arc::new(SlowAdapter::new(Duration::ZERO));
        let bridge = DispatchBridge::spawn(adapter, config(Duration::from_secs(1))).unwrap();

        let err = bridge.handle().send(Outbound::Text("hi".into())).unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::NotConnected)));
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        let mut adapter = SlowAdapter::new(Duration::ZERO);
        adapter.fail_connect = true;
        let bridge = DispatchBridge::spawn(Arc::new(adapter), config(Duration::from_secs(1))).unwrap();

        let err = bridge.handle().connect().unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::ConnectFailed(_))));
        assert!(!bridge.handle().is_connected());
    }

    #[test]
    fn test_timed_out_call_does_not_block_later_calls() {
        let adapter = Arc::new(SlowAdapter::new(Duration::from_secs(5)));
        let bridge = DispatchBridge::spawn(adapter.clone(), config(Duration::from_millis(100))).unwrap();
        let handle = bridge.handle();
        handle.connect().unwrap();

        let started = Instant::now();
        let err = handle.send(Outbound::Text("slow".into())).unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err}");
        assert!(started.elapsed() < Duration::from_secs(2));

        // The bridge abandoned the slow send and keeps serving
        handle.send(Outbound::Text("fast".into())).unwrap();
        assert_eq!(*adapter.sent.lock().unwrap(), vec!["text"]);
        assert!(handle.is_connected());
    }

    #[test]
    fn test_drain_stops_at_turn_complete() {
        let adapter = Arc::new(SlowAdapter::new(Duration::ZERO));
        adapter.inbound.lock().unwrap().extend([
            InboundEvent::audio(vec![1, 2]),
            InboundEvent::text("hi"),
            InboundEvent::turn_complete(),
            InboundEvent::audio(vec![3, 4]),
        ]);
        let bridge = DispatchBridge::spawn(adapter.clone(), config(Duration::from_secs(1))).unwrap();
        let handle = bridge.handle();
        handle.connect().unwrap();

        let first = handle.drain().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].audio.as_deref(), Some(&[1u8, 2][..]));
        assert_eq!(first[1].text.as_deref(), Some("hi"));
        assert!(first[2].turn_complete);

        let second = handle.drain().unwrap();
        assert_eq!(second, vec![InboundEvent::audio(vec![3, 4])]);

        // Nothing pending: the window closes with no events
        assert!(handle.drain().unwrap().is_empty());
    }

    #[test]
    fn test_operations_run_in_submission_order() {
        let adapter = Arc::new(SlowAdapter::new(Duration::ZERO));
        let bridge = DispatchBridge::spawn(adapter.clone(), config(Duration::from_secs(1))).unwrap();
        let handle = bridge.handle();
        handle.connect().unwrap();

        handle.send(Outbound::Text("a".into())).unwrap();
        handle
            .send(Outbound::Audio(crate::devices::AudioChunk::new(vec![0; 4])))
            .unwrap();
        handle
            .send(Outbound::Frame(crate::devices::Frame::jpeg(vec![0xFF])))
            .unwrap();

        assert_eq!(*adapter.sent.lock().unwrap(), vec!["text", "audio", "frame"]);
        assert_eq!(adapter.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_close_does_not_block_reconnect() {
        let mut adapter = SlowAdapter::new(Duration::ZERO);
        adapter.fail_close = true;
        let adapter = Arc::new(adapter);
        let bridge = DispatchBridge::spawn(adapter.clone(), config(Duration::from_secs(1))).unwrap();
        let handle = bridge.handle();

        handle.connect().unwrap();
        // Replacing a connection whose close fails still succeeds
        handle.connect().unwrap();
        assert!(handle.is_connected());
        assert_eq!(adapter.connects.load(Ordering::SeqCst), 2);

        handle.send(Outbound::Text("after".into())).unwrap();
        assert_eq!(*adapter.sent.lock().unwrap(), vec!["text"]);
    }
}
