//! Testing utilities for CrabCapture
//!
//! Scripted stand-ins for the vendor SDK and the platform network binder,
//! enabling offline testing of the full session without a camera.

pub mod mock_device;
pub mod mock_network;

pub use mock_device::{native, Command, DeviceCall, MockDevice, PreviewScript};
pub use mock_network::MockNetwork;
