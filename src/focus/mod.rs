//! The focus session flow: state, transition rules, tick driver and the
//! actor that ties them to detection, storage and audio.

pub mod accumulator;
pub mod controller;
pub mod machine;
pub mod state;
mod ticker;

pub use accumulator::DistractionAccumulator;
pub use controller::{FocusController, FocusServices, FocusSnapshot, StateChange};
pub use machine::{Effect, FocusEvent, FocusMachine, TimerConfig, Transition};
pub use state::{AppState, FocusContext, WarningType};
