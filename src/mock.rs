//! Simulated native device for tests and examples
//!
//! [`MockDevice`] is handed to a [`DeviceHandle`](crate::DeviceHandle) while the
//! paired [`MockController`] stays with the test to queue reports, inject
//! failures and inspect what the handle sent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::native::{NativeDevice, StringDescriptor, WideChar, NATIVE_FAILURE};
use crate::wide;

/// Native primitive that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Write,
    Read,
    SetNonBlocking,
    SendFeatureReport,
    GetFeatureReport,
    GetString,
}

#[derive(Default)]
struct MockState {
    nonblocking: bool,
    input_reports: VecDeque<Vec<u8>>,
    feature_reports: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    sent_features: Vec<Vec<u8>>,
    strings: HashMap<StringDescriptor, String>,
    failures: HashMap<MockOp, String>,
    last_error: Option<String>,
    write_limit: Option<usize>,
    native_calls: usize,
    closed: bool,
}

impl MockState {
    /// Count the call and report whether `op` is set to fail
    fn enter(&mut self, op: Option<MockOp>) -> bool {
        self.native_calls += 1;
        match op.and_then(|op| self.failures.get(&op).cloned()) {
            Some(msg) => {
                self.last_error = Some(msg);
                true
            }
            None => false,
        }
    }
}

struct Shared {
    state: Mutex<MockState>,
    report_ready: Condvar,
}

/// Simulated native device connection
pub struct MockDevice {
    shared: Arc<Shared>,
}

/// Test-side view of a [`MockDevice`]
#[derive(Clone)]
pub struct MockController {
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Create a device in blocking mode with no pending reports
    pub fn new() -> (MockDevice, MockController) {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            report_ready: Condvar::new(),
        });
        (
            MockDevice {
                shared: Arc::clone(&shared),
            },
            MockController { shared },
        )
    }
}

fn copy_report(report: &[u8], buf: &mut [u8]) -> i32 {
    let n = report.len().min(buf.len());
    buf[..n].copy_from_slice(&report[..n]);
    n as i32
}

impl NativeDevice for MockDevice {
    fn write(&mut self, data: &[u8]) -> i32 {
        let mut state = self.shared.state.lock();
        if state.enter(Some(MockOp::Write)) {
            return NATIVE_FAILURE;
        }
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.written.push(data[..n].to_vec());
        n as i32
    }

    fn read(&mut self, buf: &mut [u8]) -> i32 {
        let mut state = self.shared.state.lock();
        state.native_calls += 1;
        loop {
            if let Some(msg) = state.failures.get(&MockOp::Read).cloned() {
                state.last_error = Some(msg);
                return NATIVE_FAILURE;
            }
            if let Some(report) = state.input_reports.pop_front() {
                return copy_report(&report, buf);
            }
            if state.nonblocking {
                return 0;
            }
            trace!("Mock read blocking until a report arrives");
            self.shared.report_ready.wait(&mut state);
        }
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> i32 {
        let mut state = self.shared.state.lock();
        if state.enter(Some(MockOp::SetNonBlocking)) {
            return NATIVE_FAILURE;
        }
        state.nonblocking = nonblocking;
        0
    }

    fn send_feature_report(&mut self, data: &[u8]) -> i32 {
        let mut state = self.shared.state.lock();
        if state.enter(Some(MockOp::SendFeatureReport)) {
            return NATIVE_FAILURE;
        }
        state.sent_features.push(data.to_vec());
        0
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> i32 {
        let mut state = self.shared.state.lock();
        if state.enter(Some(MockOp::GetFeatureReport)) {
            return NATIVE_FAILURE;
        }
        match state.feature_reports.pop_front() {
            Some(report) => copy_report(&report, buf),
            None => {
                state.last_error = Some("no feature report available".into());
                NATIVE_FAILURE
            }
        }
    }

    fn get_string(&mut self, which: StringDescriptor, buf: &mut [WideChar]) -> i32 {
        let mut state = self.shared.state.lock();
        if state.enter(Some(MockOp::GetString)) {
            return NATIVE_FAILURE;
        }
        let s = state.strings.get(&which).map(String::as_str).unwrap_or("");
        wide::encode_into(s, buf)
    }

    fn last_error(&self) -> Option<String> {
        self.shared.state.lock().last_error.clone()
    }

    fn close(self) {
        let mut state = self.shared.state.lock();
        state.enter(None);
        state.closed = true;
        self.shared.report_ready.notify_all();
    }
}

impl MockController {
    /// Queue an input report and wake a blocked reader
    pub fn push_input_report(&self, report: &[u8]) {
        self.shared.state.lock().input_reports.push_back(report.to_vec());
        self.shared.report_ready.notify_all();
    }

    /// Queue a report for the next `get_feature_report`
    pub fn push_feature_report(&self, report: &[u8]) {
        self.shared
            .state
            .lock()
            .feature_reports
            .push_back(report.to_vec());
    }

    pub fn set_string(&self, which: StringDescriptor, value: &str) {
        self.shared.state.lock().strings.insert(which, value.to_string());
    }

    /// Make `op` fail with `message` as the native last error
    pub fn fail(&self, op: MockOp, message: &str) {
        self.shared
            .state
            .lock()
            .failures
            .insert(op, message.to_string());
        self.shared.report_ready.notify_all();
    }

    /// Stop injecting failures for `op`
    pub fn recover(&self, op: MockOp) {
        self.shared.state.lock().failures.remove(&op);
    }

    /// Cap how many bytes each write accepts
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.shared.state.lock().write_limit = limit;
    }

    /// Output reports accepted so far (truncated to what was accepted)
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().written.clone()
    }

    pub fn sent_feature_reports(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().sent_features.clone()
    }

    pub fn pending_input_reports(&self) -> usize {
        self.shared.state.lock().input_reports.len()
    }

    pub fn pending_feature_reports(&self) -> usize {
        self.shared.state.lock().feature_reports.len()
    }

    pub fn is_nonblocking(&self) -> bool {
        self.shared.state.lock().nonblocking
    }

    /// Number of native primitives invoked, `close` included
    pub fn native_calls(&self) -> usize {
        self.shared.state.lock().native_calls
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Operations that currently fail
    pub fn failing_ops(&self) -> HashSet<MockOp> {
        self.shared.state.lock().failures.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonblocking_read_empty() {
        let (mut device, ctl) = MockDevice::new();
        assert_eq!(device.set_nonblocking(true), 0);
        assert!(ctl.is_nonblocking());
        assert_eq!(device.read(&mut [0u8; 4]), 0);
    }

    #[test]
    fn test_read_truncates_to_buffer() {
        let (mut device, ctl) = MockDevice::new();
        ctl.push_input_report(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(device.read(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_failure_and_recovery() {
        let (mut device, ctl) = MockDevice::new();
        ctl.fail(MockOp::Write, "broken pipe");
        assert_eq!(device.write(&[0, 1]), NATIVE_FAILURE);
        assert_eq!(device.last_error().as_deref(), Some("broken pipe"));
        assert!(ctl.failing_ops().contains(&MockOp::Write));

        ctl.recover(MockOp::Write);
        assert_eq!(device.write(&[0, 1]), 2);
        assert_eq!(ctl.written(), vec![vec![0, 1]]);
    }

    #[test]
    fn test_missing_string_is_empty() {
        let (mut device, _ctl) = MockDevice::new();
        let mut buf = [0xFFu32; 4];
        assert_eq!(device.get_string(StringDescriptor::Indexed(3), &mut buf), 0);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_counts_calls() {
        let (mut device, ctl) = MockDevice::new();
        device.set_nonblocking(true);
        device.read(&mut [0u8; 1]);
        device.last_error();
        assert_eq!(ctl.native_calls(), 2);
        device.close();
        assert_eq!(ctl.native_calls(), 3);
        assert!(ctl.is_closed());
    }
}
