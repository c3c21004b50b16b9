//! hidapi backend and device opening

use std::ffi::CString;

use hidapi::{HidApi, HidDevice, HidResult};
use tracing::{debug, info};

use crate::config::HandleConfig;
use crate::error::HandleError;
use crate::handle::DeviceHandle;
use crate::native::{NativeDevice, StringDescriptor, WideChar, NATIVE_FAILURE};
use crate::wide;
use crate::Result;

/// [`NativeDevice`] over a `hidapi::HidDevice`
///
/// hidapi already returns `Result`s; this adapter folds them back into the
/// native return codes and keeps the error text for `last_error()`.
pub struct HidApiDevice {
    device: HidDevice,
    last_error: Option<String>,
}

impl HidApiDevice {
    pub fn new(device: HidDevice) -> Self {
        Self {
            device,
            last_error: None,
        }
    }
}

/// Unwrap a hidapi result, keeping the error text on failure
fn record<T>(res: HidResult<T>, last_error: &mut Option<String>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("hidapi call failed: {}", e);
            *last_error = Some(e.to_string());
            None
        }
    }
}

fn to_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Fold a hidapi byte count into the native convention
fn count_code(res: HidResult<usize>, last_error: &mut Option<String>) -> i32 {
    record(res, last_error).map_or(NATIVE_FAILURE, to_count)
}

/// Fold a hidapi status into the native convention (`0` on success)
fn status_code(res: HidResult<()>, last_error: &mut Option<String>) -> i32 {
    record(res, last_error).map_or(NATIVE_FAILURE, |_| 0)
}

/// Fold a hidapi string into `buf`; a missing string is written as empty
fn string_code(
    res: HidResult<Option<String>>,
    buf: &mut [WideChar],
    last_error: &mut Option<String>,
) -> i32 {
    match record(res, last_error) {
        Some(s) => wide::encode_into(s.as_deref().unwrap_or(""), buf),
        None => NATIVE_FAILURE,
    }
}

fn device_path(path: &str) -> Result<CString> {
    CString::new(path).map_err(|_| HandleError::Open(format!("path contains NUL: {:?}", path)))
}

impl NativeDevice for HidApiDevice {
    fn write(&mut self, data: &[u8]) -> i32 {
        count_code(self.device.write(data), &mut self.last_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> i32 {
        count_code(self.device.read(buf), &mut self.last_error)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> i32 {
        status_code(
            self.device.set_blocking_mode(!nonblocking),
            &mut self.last_error,
        )
    }

    fn send_feature_report(&mut self, data: &[u8]) -> i32 {
        status_code(self.device.send_feature_report(data), &mut self.last_error)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> i32 {
        count_code(self.device.get_feature_report(buf), &mut self.last_error)
    }

    fn get_string(&mut self, which: StringDescriptor, buf: &mut [WideChar]) -> i32 {
        let res = match which {
            StringDescriptor::Manufacturer => self.device.get_manufacturer_string(),
            StringDescriptor::Product => self.device.get_product_string(),
            StringDescriptor::SerialNumber => self.device.get_serial_number_string(),
            StringDescriptor::Indexed(index) => self.device.get_indexed_string(index),
        };
        string_code(res, buf, &mut self.last_error)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

/// Enumerated HID interface, as reported by the platform backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
}

impl From<&hidapi::DeviceInfo> for DeviceSummary {
    fn from(info: &hidapi::DeviceInfo) -> Self {
        Self {
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().to_string(),
            serial: info.serial_number().map(|s| s.to_string()),
            manufacturer: info.manufacturer_string().map(|s| s.to_string()),
            product: info.product_string().map(|s| s.to_string()),
            interface_number: info.interface_number(),
            usage_page: info.usage_page(),
            usage: info.usage(),
        }
    }
}

/// Enumerates HID devices and opens them as [`DeviceHandle`]s
pub struct HidManager {
    api: HidApi,
    config: HandleConfig,
}

impl HidManager {
    pub fn new() -> Result<Self> {
        Self::with_config(HandleConfig::default())
    }

    /// Handles opened by this manager use `config`
    pub fn with_config(config: HandleConfig) -> Result<Self> {
        let api = HidApi::new().map_err(|e| HandleError::Open(e.to_string()))?;
        Ok(Self { api, config })
    }

    pub fn list_devices(&self) -> Vec<DeviceSummary> {
        self.api.device_list().map(DeviceSummary::from).collect()
    }

    /// Open the first device matching `vid`/`pid`
    pub fn open(&self, vid: u16, pid: u16) -> Result<DeviceHandle<HidApiDevice>> {
        let device = self
            .api
            .open(vid, pid)
            .map_err(|e| HandleError::Open(format!("{:04X}:{:04X}: {}", vid, pid, e)))?;
        info!("Opened HID device {:04X}:{:04X}", vid, pid);
        Ok(self.wrap(device))
    }

    /// Open the device matching `vid`/`pid` with the given serial number
    pub fn open_serial(
        &self,
        vid: u16,
        pid: u16,
        serial: &str,
    ) -> Result<DeviceHandle<HidApiDevice>> {
        let device = self.api.open_serial(vid, pid, serial).map_err(|e| {
            HandleError::Open(format!("{:04X}:{:04X} serial {}: {}", vid, pid, serial, e))
        })?;
        info!("Opened HID device {:04X}:{:04X} serial {}", vid, pid, serial);
        Ok(self.wrap(device))
    }

    /// Open a device by its platform path
    pub fn open_path(&self, path: &str) -> Result<DeviceHandle<HidApiDevice>> {
        let c_path = device_path(path)?;
        let device = self
            .api
            .open_path(&c_path)
            .map_err(|e| HandleError::Open(format!("{}: {}", path, e)))?;
        info!("Opened HID device at {}", path);
        Ok(self.wrap(device))
    }

    fn wrap(&self, device: HidDevice) -> DeviceHandle<HidApiDevice> {
        DeviceHandle::with_config(HidApiDevice::new(device), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_count_saturates() {
        assert_eq!(to_count(64), 64);
        assert_eq!(to_count(usize::MAX), i32::MAX);
    }

    #[test]
    #[ignore] // requires a HID backend on the host
    fn test_list_devices() {
        let manager = HidManager::new().unwrap();
        for device in manager.list_devices() {
            assert!(!device.path.is_empty());
        }
    }

    fn hid_err(message: &str) -> HidResult<()> {
        Err(hidapi::HidError::HidApiError {
            message: message.to_string(),
        })
    }

    #[test]
    fn test_device_path_rejects_nul() {
        let err = device_path("/dev/hid\0raw0").unwrap_err();
        assert!(matches!(err, HandleError::Open(_)));
        assert_eq!(device_path("/dev/hidraw0").unwrap().as_bytes(), b"/dev/hidraw0");
    }

    #[test]
    fn test_count_code() {
        let mut last_error = None;
        assert_eq!(count_code(Ok(8), &mut last_error), 8);
        assert_eq!(count_code(Ok(usize::MAX), &mut last_error), i32::MAX);
        assert!(last_error.is_none());

        let res = hid_err("hidraw read failed").map(|_| 0usize);
        assert_eq!(count_code(res, &mut last_error), NATIVE_FAILURE);
        assert!(last_error.unwrap().contains("hidraw read failed"));
    }

    #[test]
    fn test_status_code() {
        let mut last_error = None;
        assert_eq!(status_code(Ok(()), &mut last_error), 0);
        assert_eq!(status_code(hid_err("ioctl failed"), &mut last_error), NATIVE_FAILURE);
        assert!(last_error.unwrap().contains("ioctl failed"));
    }

    #[test]
    fn test_string_code() {
        let mut last_error = None;
        let mut buf = [0xFFFF_u32; 8];

        assert_eq!(string_code(Ok(Some("Akko".into())), &mut buf, &mut last_error), 4);
        assert_eq!(wide::decode(&buf), "Akko");

        assert_eq!(string_code(Ok(None), &mut buf, &mut last_error), 0);
        assert_eq!(wide::decode(&buf), "");
        assert!(last_error.is_none());

        let res = hid_err("string stalled").map(|_| None);
        assert_eq!(string_code(res, &mut buf, &mut last_error), NATIVE_FAILURE);
        assert!(last_error.unwrap().contains("string stalled"));
    }
}
