//! # voice-recorder-windows
//!
//! Windows WASAPI backend for voice-recorder-core.
//!
//! Provides:
//! - `WasapiDeviceRegistry`: capture endpoint enumeration via the MMDevice API
//! - `WasapiCaptureProvider`: shared-mode microphone capture on a dedicated thread
//! - `WasapiOutputProvider`: shared-mode playback on the default render endpoint
//! - `permissions`: Windows microphone privacy check
//!
//! ## Platform Requirements
//! - Windows 10 1803+
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use voice_recorder_core::{codec_for, SessionConfiguration, SessionFacade};
//! use voice_recorder_windows::{WasapiCaptureProvider, WasapiDeviceRegistry, WasapiOutputProvider};
//!
//! let config = SessionConfiguration::default();
//! let session = SessionFacade::new(
//!     &config,
//!     &WasapiDeviceRegistry::new(),
//!     Arc::new(WasapiCaptureProvider::new()),
//!     Arc::new(WasapiOutputProvider::new()),
//!     codec_for(&config),
//! )?;
//! session.start_recording()?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod error;
#[cfg(target_os = "windows")]
mod format;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_capture;
#[cfg(target_os = "windows")]
pub mod wasapi_render;
#[cfg(target_os = "windows")]
mod worker;

#[cfg(target_os = "windows")]
pub use device_enumerator::WasapiDeviceRegistry;
#[cfg(target_os = "windows")]
pub use error::WasapiError;
#[cfg(target_os = "windows")]
pub use wasapi_capture::{WasapiCaptureProvider, WasapiCaptureStream};
#[cfg(target_os = "windows")]
pub use wasapi_render::{WasapiOutputProvider, WasapiOutputStream};
