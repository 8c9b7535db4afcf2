//! Run event emission.
//!
//! An [`EventEmitter`] stamps each pending event and delivers it to its
//! listeners in subscription order. Listener failures never stop delivery;
//! they are reported together once every listener has been attempted.

mod emitter;
mod listeners;

pub use emitter::{EmitError, EventEmitter, ListenerFailure};
pub use listeners::{EventCollector, EventListener, FnListener, StoreEventListener};
