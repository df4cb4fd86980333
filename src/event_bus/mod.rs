//! Event fan-out for live run observability.
//!
//! Producers (the engine, node handlers) push [`Event`]s into an [`EventBus`];
//! a background listener broadcasts each one to every attached sink. Sinks
//! cover stdout rendering, in-memory capture for tests, and channel forwarding
//! for async consumers via [`EventBus::subscribe`].

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::{EventBus, EventStream};
pub use event::{DiagnosticEvent, Event, ExecutionEvent, NodeEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
