//! Contract of the native HID library
//!
//! Each method maps to one primitive of the C hidapi interface and keeps its
//! return convention, so backends stay thin and [`DeviceHandle`] owns all the
//! checking.
//!
//! [`DeviceHandle`]: crate::DeviceHandle

/// Wide character code unit used for descriptor strings (`wchar_t` on Unix)
pub type WideChar = u32;

/// Return value the native library uses to signal failure
pub const NATIVE_FAILURE: i32 = -1;

/// Which descriptor string to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringDescriptor {
    Manufacturer,
    Product,
    SerialNumber,
    /// Arbitrary string descriptor by USB string index
    Indexed(i32),
}

/// One open native device connection
///
/// Implementations are used by exactly one [`DeviceHandle`](crate::DeviceHandle),
/// which never calls them after [`close`](NativeDevice::close).
pub trait NativeDevice {
    /// Send an output report. Returns bytes written, or `-1`.
    fn write(&mut self, data: &[u8]) -> i32;

    /// Read the next input report into `buf`. Returns bytes read, or `-1`.
    ///
    /// In non-blocking mode returns `0` when no report is pending.
    fn read(&mut self, buf: &mut [u8]) -> i32;

    /// Switch non-blocking reads on or off. Returns `0` on success.
    fn set_nonblocking(&mut self, nonblocking: bool) -> i32;

    /// Send a feature report. Returns `0` on success.
    fn send_feature_report(&mut self, data: &[u8]) -> i32;

    /// Read a feature report (report ID in `buf[0]`). Returns bytes read, or `-1`.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> i32;

    /// Fill `buf` with a NUL-terminated descriptor string.
    /// Returns a negative value on failure.
    fn get_string(&mut self, which: StringDescriptor, buf: &mut [WideChar]) -> i32;

    /// Text of the last error recorded for this device
    fn last_error(&self) -> Option<String>;

    /// Release the native connection
    fn close(self)
    where
        Self: Sized,
    {
    }
}
