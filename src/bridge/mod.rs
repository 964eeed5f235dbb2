//! Single-access bridge to the remote connection
//!
//! The remote connection tolerates one caller at a time. [`DispatchBridge`]
//! owns it on a dedicated thread; every other thread talks to it through a
//! cloneable [`BridgeHandle`] and blocks until the result arrives or the
//! call deadline passes.

mod connection;
mod dispatch;

pub use connection::{ConnectionAdapter, ConnectionHandle, InboundEvent, Outbound};
pub use dispatch::{BridgeConfig, BridgeHandle, DispatchBridge};
