//! Reactive primitives: change events and the emitter that fans them out.
//!
//! # Modules
//!
//! - [`event`]: [`ChangeEvent`], the "something changed in table X" signal.
//! - [`event_emitter`]: Generic typed pub/sub ([`EventEmitter<T>`]).

pub mod event;
pub mod event_emitter;

pub use event::{ChangeEvent, ChangeKind};
pub use event_emitter::{EventEmitter, ListenerId};
