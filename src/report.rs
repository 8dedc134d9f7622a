//! `$HUNU` result report encoding.
//!
//! ```text
//! $HUNU,<t0_ms>,<flags:2X>-<cache:2X>,<elapsed_ms>,<status:8X>,<seed:4X>,<table:2X>,<enc:4X>,<dec:4X>*<cs:2X>
//! ```
//!
//! The checksum is the XOR of every byte from `$` through `*`. It is folded while the
//! line is written, so it always covers the full line even when the stored copy is cut
//! short by a small buffer.

use crate::error::AppError;
use arrayvec::ArrayString;
use core::fmt::{self, Write};

pub const REPORT_TAG: &str = "$HUNU";
pub const REPORT_MAX_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFields {
    pub t0_ms: u32,
    pub build_flags: u8,
    pub cache_settings: u8,
    pub elapsed_ms: u32,
    pub status: u32,
    pub seed: u16,
    pub table: u8,
    pub encode_check: u16,
    pub decode_check: u16,
}

/// Fold used for the report trailer.
pub fn line_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Check the `*XX` trailer of a complete report line.
pub fn verify_line(line: &str) -> bool {
    let Some(star) = line.rfind('*') else {
        return false;
    };
    let (body, trailer) = line.split_at(star + 1);
    if trailer.len() != 2 {
        return false;
    }
    u8::from_str_radix(trailer, 16).map_or(false, |provided| provided == line_checksum(body.as_bytes()))
}

/// Largest prefix length of `s` that fits in `max` bytes without splitting a char.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// `fmt::Write` sink over a fixed buffer. Keeps at most `N - 1` bytes (the last slot
/// is the terminator's), never fails, and folds the checksum over everything written
/// until [`ReportWriter::seal`].
#[derive(Debug)]
pub struct ReportWriter<const N: usize> {
    buf: ArrayString<N>,
    written: usize,
    checksum: u8,
    summing: bool,
}

impl<const N: usize> ReportWriter<N> {
    pub fn new() -> Self {
        Self {
            buf: ArrayString::new(),
            written: 0,
            checksum: 0,
            summing: true,
        }
    }

    /// Stop folding and return the checksum of everything written so far.
    pub fn seal(&mut self) -> u8 {
        self.summing = false;
        self.checksum
    }

    pub fn finish(self) -> EncodedReport<N> {
        EncodedReport {
            line: self.buf,
            full_len: self.written,
            checksum: self.checksum,
        }
    }
}

impl<const N: usize> Default for ReportWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Write for ReportWriter<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.summing {
            self.checksum ^= line_checksum(s.as_bytes());
        }
        self.written += s.len();

        let room = N.saturating_sub(1).saturating_sub(self.buf.len());
        let take = floor_char_boundary(s, room);
        self.buf.push_str(&s[..take]);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedReport<const N: usize> {
    line: ArrayString<N>,
    full_len: usize,
    checksum: u8,
}

impl<const N: usize> EncodedReport<N> {
    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Length of the line before any truncation.
    pub fn full_len(&self) -> usize {
        self.full_len
    }

    pub fn is_truncated(&self) -> bool {
        self.full_len > self.line.len()
    }

    pub fn check_truncation(&self) -> Result<(), AppError> {
        if self.is_truncated() {
            Err(AppError::ReportTruncated {
                len: self.full_len,
                capacity: N,
            })
        } else {
            Ok(())
        }
    }
}

pub fn encode_report(fields: &ReportFields) -> EncodedReport<REPORT_MAX_LENGTH> {
    encode_report_into::<REPORT_MAX_LENGTH>(fields)
}

/// Encode into an `N`-byte assembly buffer.
pub fn encode_report_into<const N: usize>(fields: &ReportFields) -> EncodedReport<N> {
    let mut writer = ReportWriter::<N>::new();
    // ReportWriter::write_str never fails.
    let _ = write!(
        writer,
        "{REPORT_TAG},{},{:02X}-{:02X},{},{:08X},{:04X},{:02X},{:04X},{:04X}*",
        fields.t0_ms,
        fields.build_flags,
        fields.cache_settings,
        fields.elapsed_ms,
        fields.status,
        fields.seed,
        fields.table,
        fields.encode_check,
        fields.decode_check,
    );
    let checksum = writer.seal();
    let _ = write!(writer, "{checksum:02X}");
    writer.finish()
}

/// Fixed-width, NUL-terminated text field as carried in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultText<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> ResultText<N> {
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    /// Replace the whole field with `text`. Keeps at most `N - 1` bytes followed by
    /// NUL padding; reports a truncation when `text` did not fit.
    pub fn set(&mut self, text: &str) -> Result<(), AppError> {
        self.bytes = [0; N];
        let keep = floor_char_boundary(text, N.saturating_sub(1));
        self.bytes[..keep].copy_from_slice(&text.as_bytes()[..keep]);

        if keep < text.len() {
            Err(AppError::ReportTruncated {
                len: text.len(),
                capacity: N,
            })
        } else {
            Ok(())
        }
    }

    pub fn as_str(&self) -> &str {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        core::str::from_utf8(&self.bytes[..end]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for ResultText<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_keeps_room_for_terminator() {
        let mut writer = ReportWriter::<8>::new();
        write!(writer, "0123456789").unwrap();
        let report = writer.finish();

        assert_eq!(report.as_str(), "0123456");
        assert_eq!(report.full_len(), 10);
        assert!(report.is_truncated());
    }

    #[test]
    fn test_writer_checksum_stops_at_seal() {
        let mut writer = ReportWriter::<32>::new();
        write!(writer, "$A*").unwrap();
        let sealed = writer.seal();
        write!(writer, "ZZ").unwrap();

        assert_eq!(sealed, b'$' ^ b'A' ^ b'*');
        assert_eq!(writer.finish().checksum(), sealed);
    }

    #[test]
    fn test_floor_char_boundary_never_splits() {
        assert_eq!(floor_char_boundary("héllo", 2), 1);
        assert_eq!(floor_char_boundary("héllo", 3), 3);
        assert_eq!(floor_char_boundary("abc", 10), 3);
    }

    #[test]
    fn test_verify_line_rejects_malformed_trailers() {
        assert!(!verify_line("no trailer"));
        assert!(!verify_line("$X*1"));
        assert!(!verify_line("$X*GG"));
        let body = "$X*";
        let good = format!("{body}{:02X}", line_checksum(body.as_bytes()));
        assert!(verify_line(&good));
    }
}
