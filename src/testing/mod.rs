//! Testing utilities
//!
//! Simulated platform collaborators and synthetic image data for running the
//! session controller and view-models without camera hardware.

pub mod simulated;
pub mod synthetic_data;

pub use simulated::{InMemoryMediaIndex, ServiceCall, SimulatedCameraService, SimulatedRecorder};
pub use synthetic_data::{synthetic_frame, synthetic_jpeg};
