//! trk-consumers
//!
//! The consumer SPI and the fan-out dispatcher, plus the built-in sinks:
//! - [`trace_log`]: append-only JSON Lines log with an optional hash chain
//! - [`broadcast`]: in-process publish/subscribe (backs the SSE stream)
//! - [`forward`]: HTTP forwarding of raw statements to a remote record store

pub mod broadcast;
pub mod consumer;
pub mod dispatcher;
pub mod forward;
pub mod trace_log;

pub use broadcast::{BroadcastConsumer, StreamedTrace};
pub use consumer::{Consumer, ConsumerRejection, Delivery};
pub use dispatcher::{DispatchError, Dispatcher};
pub use forward::ForwardConsumer;
pub use trace_log::{verify_hash_chain, verify_hash_chain_str, TraceLogConsumer, VerifyResult};
