//! Per-stream state machine
//!
//! Pure transitions in the Elm Architecture style: a transition maps the
//! current state and one input to a new state plus the effects the
//! controller must apply to the conversation.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::StreamEvent;
pub use state::{CancelReason, StreamId, StreamState, StreamStatus};
pub use transition::{transition, TransitionError, TransitionResult};
