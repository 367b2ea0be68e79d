//! Capture-session orchestration.
//!
//! [`SessionOrchestrator`] runs the initialization pipeline against a
//! connected camera, owns the settings cache once the session is ready and
//! serializes every later command on the device's single channel.

mod orchestrator;
mod preview;
mod types;

pub use orchestrator::SessionOrchestrator;
pub use types::{
    CaptureAction, InitStep, PipelineEvent, PipelineEvents, PipelineState, SessionSignal, SwitchEvent,
    SwitchEvents,
};
