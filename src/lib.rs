//! Owned, checked access to an opened HID device
//!
//! This crate wraps a native HID library handle in a move-only
//! [`DeviceHandle`] that:
//!
//! - checks the handle is still open before every native call
//! - maps the native return conventions (`-1`, nonzero) to [`HandleError`]
//! - converts wide descriptor strings to UTF-8
//! - releases the native handle on close or drop
//!
//! The native library itself is abstracted by the [`NativeDevice`] trait.
//! [`HidApiDevice`] implements it on top of `hidapi`, and [`mock::MockDevice`]
//! provides a simulated device for tests.

pub mod config;
pub mod error;
pub mod mock;
pub mod native;
pub mod wide;

mod handle;

#[cfg(feature = "hidapi")]
mod hid;

pub use config::{
    ConfigError, FeatureReportMode, HandleConfig, StringErrorPolicy, DEFAULT_MAX_STRING_LEN,
    MAX_STRING_LEN_LIMIT,
};
pub use error::{HandleError, Operation};
pub use handle::DeviceHandle;
pub use native::{NativeDevice, StringDescriptor, WideChar, NATIVE_FAILURE};

#[cfg(feature = "hidapi")]
pub use hid::{DeviceSummary, HidApiDevice, HidManager};

/// Result alias for handle operations
pub type Result<T> = std::result::Result<T, HandleError>;
