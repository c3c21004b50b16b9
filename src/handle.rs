//! Owned handle to one open HID device

use std::fmt;

use tracing::{debug, trace};

use crate::config::{FeatureReportMode, HandleConfig, StringErrorPolicy};
use crate::error::{HandleError, Operation};
use crate::native::{NativeDevice, StringDescriptor, WideChar};
use crate::wide;
use crate::Result;

/// Exclusive owner of one native device connection
///
/// Every operation first checks that the handle is still open and returns
/// [`HandleError::DeviceClosed`] without touching the native layer when it
/// is not. Operations take `&mut self`, so a handle is used by one owner at
/// a time; it can be moved to another thread when `D: Send`.
///
/// The native connection is released by [`close`](Self::close) or, failing
/// that, when the handle is dropped.
pub struct DeviceHandle<D: NativeDevice> {
    device: Option<D>,
    config: HandleConfig,
}

impl<D: NativeDevice> DeviceHandle<D> {
    /// Take ownership of an open native device with the default policy
    pub fn new(device: D) -> Self {
        Self::with_config(device, HandleConfig::default())
    }

    pub fn with_config(device: D, config: HandleConfig) -> Self {
        Self {
            device: Some(device),
            config,
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    fn device(&mut self) -> Result<&mut D> {
        self.device.as_mut().ok_or(HandleError::DeviceClosed)
    }

    /// Release the native connection
    ///
    /// A second call fails with [`HandleError::DeviceClosed`] like any other
    /// operation on a closed handle.
    pub fn close(&mut self) -> Result<()> {
        let device = self.device.take().ok_or(HandleError::DeviceClosed)?;
        device.close();
        debug!("HID device closed");
        Ok(())
    }

    /// Send an output report, returning the number of bytes the native layer accepted
    ///
    /// The first byte is the report ID (0 for devices without numbered reports).
    /// Short writes are returned as-is, not retried.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let device = self.device()?;
        let res = device.write(data);
        let written = byte_count(device, Operation::Write, res)?;
        trace!("Wrote {}/{} bytes: {:02X?}", written, data.len(), data);
        Ok(written)
    }

    /// Read the next input report into `buf`
    ///
    /// Blocks or not according to the mode set by
    /// [`enable_blocking`](Self::enable_blocking) /
    /// [`disable_blocking`](Self::disable_blocking). In non-blocking mode
    /// `Ok(0)` means no report was pending.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let device = self.device()?;
        let res = device.read(buf);
        let read = byte_count(device, Operation::Read, res)?;
        trace!("Read {} bytes", read);
        Ok(read)
    }

    /// Make subsequent reads wait for a report
    pub fn enable_blocking(&mut self) -> Result<()> {
        self.set_nonblocking(false, Operation::SetBlocking)
    }

    /// Make subsequent reads return immediately when no report is pending
    pub fn disable_blocking(&mut self) -> Result<()> {
        self.set_nonblocking(true, Operation::SetNonBlocking)
    }

    fn set_nonblocking(&mut self, nonblocking: bool, op: Operation) -> Result<()> {
        let device = self.device()?;
        if device.set_nonblocking(nonblocking) != 0 {
            return Err(HandleError::io(op, device.last_error()));
        }
        debug!("HID device non-blocking = {}", nonblocking);
        Ok(())
    }

    /// Send a feature report (report ID in `data[0]`)
    ///
    /// Returns the native status, which is always 0 on success.
    pub fn send_feature_report(&mut self, data: &[u8]) -> Result<usize> {
        let device = self.device()?;
        let res = device.send_feature_report(data);
        if res != 0 {
            return Err(HandleError::io(
                Operation::SendFeatureReport,
                device.last_error(),
            ));
        }
        trace!("Sent feature report: {:02X?}", data);
        Ok(0)
    }

    /// Fetch a feature report into `buf` (report ID in `buf[0]`)
    ///
    /// With [`FeatureReportMode::Dedicated`] this returns the number of bytes
    /// read. [`FeatureReportMode::LegacyRead`] reads an input report instead
    /// and fails on any nonzero result, so it only ever returns `Ok(0)`.
    pub fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mode = self.config.feature_report;
        let device = self.device()?;
        match mode {
            FeatureReportMode::Dedicated => {
                let res = device.get_feature_report(buf);
                byte_count(device, Operation::GetFeatureReport, res)
            }
            FeatureReportMode::LegacyRead => {
                let res = device.read(buf);
                if res != 0 {
                    return Err(HandleError::io(
                        Operation::GetFeatureReport,
                        device.last_error(),
                    ));
                }
                Ok(0)
            }
        }
    }

    pub fn manufacturer_string(&mut self) -> Result<String> {
        self.descriptor_string(StringDescriptor::Manufacturer)
    }

    pub fn product_string(&mut self) -> Result<String> {
        self.descriptor_string(StringDescriptor::Product)
    }

    pub fn serial_number_string(&mut self) -> Result<String> {
        self.descriptor_string(StringDescriptor::SerialNumber)
    }

    /// Fetch a string descriptor by USB string index
    pub fn indexed_string(&mut self, index: i32) -> Result<String> {
        self.descriptor_string(StringDescriptor::Indexed(index))
    }

    /// Fetch a descriptor string, applying [`StringErrorPolicy`] to native failures
    ///
    /// Text longer than `max_string_len` code units (capped at
    /// [`MAX_STRING_LEN_LIMIT`](crate::config::MAX_STRING_LEN_LIMIT)) is
    /// truncated by the native layer.
    pub fn descriptor_string(&mut self, which: StringDescriptor) -> Result<String> {
        let policy = self.config.string_errors;
        let capacity = self.config.string_len().saturating_add(1);
        let mut buf: Vec<WideChar> = vec![0; capacity];
        let device = self.device()?;

        if device.get_string(which, &mut buf) < 0 {
            return match policy {
                StringErrorPolicy::Empty => {
                    debug!("{:?} string unavailable, returning empty string", which);
                    Ok(String::new())
                }
                StringErrorPolicy::Raise => Err(HandleError::io(
                    string_operation(which),
                    device.last_error(),
                )),
            };
        }

        Ok(wide::decode(&buf))
    }
}

/// Convert a native byte count, where any negative value is a failure
fn byte_count<D: NativeDevice>(device: &D, op: Operation, res: i32) -> Result<usize> {
    usize::try_from(res).map_err(|_| HandleError::io(op, device.last_error()))
}

fn string_operation(which: StringDescriptor) -> Operation {
    match which {
        StringDescriptor::Manufacturer => Operation::ManufacturerString,
        StringDescriptor::Product => Operation::ProductString,
        StringDescriptor::SerialNumber => Operation::SerialNumberString,
        StringDescriptor::Indexed(_) => Operation::IndexedString,
    }
}

impl<D: NativeDevice> Drop for DeviceHandle<D> {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            device.close();
            debug!("DeviceHandle dropped, native device released");
        }
    }
}

impl<D: NativeDevice> fmt::Debug for DeviceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("open", &self.is_open())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockOp};

    #[test]
    fn test_read_copies_pending_report() {
        let (device, ctl) = MockDevice::new();
        ctl.push_input_report(&[0x01, 0xAA, 0xBB]);
        let mut handle = DeviceHandle::new(device);

        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[0x01, 0xAA, 0xBB]);
    }

    #[test]
    fn test_read_failure_carries_native_detail() {
        let (device, ctl) = MockDevice::new();
        ctl.fail(MockOp::Read, "device disconnected");
        let mut handle = DeviceHandle::new(device);

        let err = handle.read(&mut [0u8; 8]).unwrap_err();
        match err {
            HandleError::Io { op, detail } => {
                assert_eq!(op, Operation::Read);
                assert_eq!(detail, "device disconnected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_write_is_not_an_error() {
        let (device, ctl) = MockDevice::new();
        ctl.set_write_limit(Some(2));
        let mut handle = DeviceHandle::new(device);

        assert_eq!(handle.write(&[0x00, 0x01, 0x02, 0x03]).unwrap(), 2);
    }

    #[test]
    fn test_blocking_mode_failure() {
        let (device, ctl) = MockDevice::new();
        ctl.fail(MockOp::SetNonBlocking, "ioctl failed");
        let mut handle = DeviceHandle::new(device);

        let err = handle.enable_blocking().unwrap_err();
        assert!(matches!(
            err,
            HandleError::Io {
                op: Operation::SetBlocking,
                ..
            }
        ));
        let err = handle.disable_blocking().unwrap_err();
        assert!(matches!(
            err,
            HandleError::Io {
                op: Operation::SetNonBlocking,
                ..
            }
        ));
    }

    #[test]
    fn test_send_feature_report() {
        let (device, ctl) = MockDevice::new();
        let mut handle = DeviceHandle::new(device);

        assert_eq!(handle.send_feature_report(&[0x05, 0x10]).unwrap(), 0);
        assert_eq!(ctl.sent_feature_reports(), vec![vec![0x05, 0x10]]);

        ctl.fail(MockOp::SendFeatureReport, "stall");
        assert!(handle.send_feature_report(&[0x05]).is_err());
    }

    #[test]
    fn test_get_feature_report_dedicated() {
        let (device, ctl) = MockDevice::new();
        ctl.push_feature_report(&[0x05, 0x64, 0x01]);
        ctl.push_input_report(&[0x01, 0x02]);
        let mut handle = DeviceHandle::new(device);

        let mut buf = [0u8; 16];
        buf[0] = 0x05;
        assert_eq!(handle.get_feature_report(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[0x05, 0x64, 0x01]);
        // Input queue untouched
        assert_eq!(ctl.pending_input_reports(), 1);
    }

    #[test]
    fn test_get_feature_report_dedicated_failure() {
        let (device, ctl) = MockDevice::new();
        ctl.fail(MockOp::GetFeatureReport, "bad report id");
        let mut handle = DeviceHandle::new(device);

        let err = handle.get_feature_report(&mut [0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            HandleError::Io {
                op: Operation::GetFeatureReport,
                ..
            }
        ));
    }

    #[test]
    fn test_get_feature_report_legacy_read() {
        let (device, ctl) = MockDevice::new();
        ctl.push_feature_report(&[0x05, 0x64]);
        let config = HandleConfig::default().with_feature_report(FeatureReportMode::LegacyRead);
        let mut handle = DeviceHandle::with_config(device, config);
        handle.disable_blocking().unwrap();

        // Nothing pending: read returns 0, which the legacy check accepts
        let mut buf = [0u8; 16];
        assert_eq!(handle.get_feature_report(&mut buf).unwrap(), 0);

        // Any bytes read count as failure under the legacy check
        ctl.push_input_report(&[0x01, 0x02]);
        assert!(handle.get_feature_report(&mut buf).is_err());

        // The feature queue was never consulted
        assert_eq!(ctl.pending_feature_reports(), 1);
    }

    #[test]
    fn test_string_failure_raise_policy() {
        let (device, ctl) = MockDevice::new();
        ctl.fail(MockOp::GetString, "string descriptor stalled");
        let config = HandleConfig::default().with_string_errors(StringErrorPolicy::Raise);
        let mut handle = DeviceHandle::with_config(device, config);

        let err = handle.serial_number_string().unwrap_err();
        assert!(matches!(
            err,
            HandleError::Io {
                op: Operation::SerialNumberString,
                ..
            }
        ));
        let err = handle.indexed_string(4).unwrap_err();
        assert!(matches!(
            err,
            HandleError::Io {
                op: Operation::IndexedString,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_max_string_len() {
        let (device, ctl) = MockDevice::new();
        ctl.set_string(StringDescriptor::Product, "M1 V5 HE Keyboard");
        let config = HandleConfig::default().with_max_string_len(5);
        let mut handle = DeviceHandle::with_config(device, config);

        assert_eq!(handle.product_string().unwrap(), "M1 V5");
    }

    #[test]
    fn test_oversized_max_string_len_is_capped() {
        let (device, ctl) = MockDevice::new();
        ctl.set_string(StringDescriptor::Product, "M1 V5 HE");
        let config = HandleConfig::default().with_max_string_len(usize::MAX);
        let mut handle = DeviceHandle::with_config(device, config);

        assert_eq!(handle.product_string().unwrap(), "M1 V5 HE");

        let long = "k".repeat(crate::config::MAX_STRING_LEN_LIMIT + 10);
        ctl.set_string(StringDescriptor::Product, &long);
        assert_eq!(
            handle.product_string().unwrap().len(),
            crate::config::MAX_STRING_LEN_LIMIT
        );
    }

    #[test]
    fn test_drop_releases_device() {
        let (device, ctl) = MockDevice::new();
        {
            let _handle = DeviceHandle::new(device);
            assert!(!ctl.is_closed());
        }
        assert!(ctl.is_closed());
    }

    #[test]
    fn test_debug_shows_state() {
        let (device, _ctl) = MockDevice::new();
        let mut handle = DeviceHandle::new(device);
        assert!(format!("{handle:?}").contains("open: true"));
        handle.close().unwrap();
        assert!(format!("{handle:?}").contains("open: false"));
    }
}
