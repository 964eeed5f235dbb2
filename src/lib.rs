pub mod bridge;
pub mod config;
pub mod devices;
pub mod error;
pub mod http;
pub mod queue;
pub mod remote;
pub mod session;

pub use bridge::{
    BridgeConfig, BridgeHandle, ConnectionAdapter, ConnectionHandle, DispatchBridge, InboundEvent,
    Outbound,
};
pub use config::Config;
pub use devices::{
    AudioChunk, AudioFormat, CaptureKind, CaptureSource, DefaultDevices, DeviceProvider, Frame,
    MicDevice, SpeakerDevice,
};
pub use error::{ConnectionError, DeviceError, Error, StateError, TimeoutError};
pub use http::{create_router, AppState};
pub use queue::BoundedQueue;
pub use remote::{LiveAdapter, LiveConfig};
pub use session::{
    SessionConfig, SessionController, SessionState, SessionStats, SessionStatus, VideoMode,
};
