//! Wide-string marshalling between native buffers and UTF-8

use crate::native::{WideChar, NATIVE_FAILURE};

/// Decode a NUL-terminated wide buffer into UTF-8
///
/// Stops at the first NUL, or at the end of the slice when there is none.
/// Code units that are not Unicode scalar values become U+FFFD.
pub fn decode(buf: &[WideChar]) -> String {
    buf.iter()
        .take_while(|&&c| c != 0)
        .map(|&c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Copy `s` into `buf` as a NUL-terminated wide string
///
/// Writes at most `buf.len() - 1` characters, truncating the rest.
/// Returns the number of characters written, or `-1` for an empty buffer.
pub fn encode_into(s: &str, buf: &mut [WideChar]) -> i32 {
    let Some(capacity) = buf.len().checked_sub(1) else {
        return NATIVE_FAILURE;
    };

    let mut written = 0;
    for (slot, c) in buf.iter_mut().zip(s.chars().take(capacity)) {
        *slot = c as WideChar;
        written += 1;
    }
    buf[written] = 0;
    written as i32
}
