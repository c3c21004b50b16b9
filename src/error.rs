//! Handle error types

use std::fmt;

use thiserror::Error;

/// Message used when the native layer has nothing to say about a failure
pub const NO_ERROR_DETAIL: &str = "no error detail available";

/// Native operation that failed, used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Write,
    Read,
    SetBlocking,
    SetNonBlocking,
    SendFeatureReport,
    GetFeatureReport,
    ManufacturerString,
    ProductString,
    SerialNumberString,
    IndexedString,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::SetBlocking => "enable blocking",
            Operation::SetNonBlocking => "disable blocking",
            Operation::SendFeatureReport => "send feature report",
            Operation::GetFeatureReport => "get feature report",
            Operation::ManufacturerString => "get manufacturer string",
            Operation::ProductString => "get product string",
            Operation::SerialNumberString => "get serial number string",
            Operation::IndexedString => "get indexed string",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`DeviceHandle`](crate::DeviceHandle) operations
#[derive(Error, Debug)]
pub enum HandleError {
    /// The handle was closed (or never opened); no native call was made
    #[error("Device closed")]
    DeviceClosed,

    /// The native call reported failure
    #[error("HID I/O error during {op}: {detail}")]
    Io { op: Operation, detail: String },

    /// The native library could not be initialised or a device could not be opened
    #[error("Failed to open device: {0}")]
    Open(String),
}

impl HandleError {
    /// Build an I/O error from the native layer's last error, if it has one
    pub(crate) fn io(op: Operation, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_ERROR_DETAIL.to_string());
        HandleError::Io { op, detail }
    }

    /// True for [`HandleError::DeviceClosed`]
    pub fn is_closed(&self) -> bool {
        matches!(self, HandleError::DeviceClosed)
    }
}
