//! CrabCapture: capture-session control for networked 360° cameras
//!
//! This crate drives a connected camera from "link established" to
//! "preview running, settings mirrored locally" and then serves setting reads
//! and writes against an offline cache that tracks the device's own
//! dependency reports.
//!
//! # Features
//! - Ordered initialization pipeline with per-step progress events
//! - Offline settings cache with dependency-aware refresh
//! - Scoped process network binding for the camera's web service
//! - Legacy-firmware reassertion of cached settings
//!
//! # Usage
//! ```rust,ignore
//! use crabcapture::{CrabCaptureConfig, PipelineEvent, SessionOrchestrator};
//!
//! let session = SessionOrchestrator::new(device, network, CrabCaptureConfig::load_or_default());
//! let mut events = session.initialize()?;
//! while let Some(event) = events.recv().await {
//!     if let PipelineEvent::Succeeded { current_mode, .. } = event {
//!         println!("ready in {}", current_mode);
//!     }
//! }
//! ```
pub mod cache;
pub mod callback;
pub mod config;
pub mod device;
pub mod errors;
pub mod invariants;
pub mod network;
pub mod session;
pub mod settings;
pub mod types;

// Scripted device and network doubles for offline testing
pub mod testing;

// Re-exports for convenience
pub use cache::{CheckedCallback, SettingsCache, WriteReport};
pub use config::CrabCaptureConfig;
pub use device::DeviceFacade;
pub use errors::{DependencyRefreshFailure, DeviceError, NetworkError, SessionError};
pub use network::{NetworkBinder, NetworkBinding};
pub use session::{
    CaptureAction, InitStep, PipelineEvent, PipelineState, SessionOrchestrator, SessionSignal, SwitchEvent,
};
pub use settings::{SettingKind, SettingValue};
pub use types::{CaptureMode, NetworkHandle, PreviewStatus, PreviewType, SensorMode};

/// Initialize logging for the capture session
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcapture=info");
    }
    let _ = env_logger::try_init();
}

/// Crate version, reported by `crabcapture-sim --version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
