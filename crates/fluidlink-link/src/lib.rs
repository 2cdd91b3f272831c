//! # FluidLink Link
//!
//! Machine-link protocol engine for FluidNC controllers over WebSocket.
//! Classifies and parses the controller's asynchronous report protocol,
//! maintains the machine-state snapshot, and degrades gracefully from
//! push auto-reporting to fallback polling when the controller ignores
//! the reporting-interval command.

pub mod commands;
pub mod engine;
pub mod health;
pub mod report;
pub mod transport;
pub mod websocket;

pub use commands::{FeedOverride, RapidOverride, SpindleOverride};
pub use engine::{EngineConfig, ProtocolEngine};
pub use health::{ConnectionHealth, HealthConfig};
pub use report::{apply_line, LineClass, AUTO_REPORT_ACK};
pub use transport::{LinkDescriptor, NoOpTransport, TransportEvent, WireTransport};
pub use websocket::WebSocketTransport;
