// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform I/O Seam
//!
//! Positional reads/writes and page-cache eviction hints, cfg-gated per
//! platform. Positional I/O matters here: file writers share one
//! descriptor, and `write_all_at` has no seek cursor to race on, so
//! concurrent writes to disjoint offsets stay independent without a lock.

use std::fs::File;
use std::io;

/// Reads exactly `buf.len()` bytes at `offset`.
///
/// An EOF before the buffer is full surfaces as
/// [`io::ErrorKind::UnexpectedEof`]; callers treat that as a fatal short
/// read, not a partial result.
#[cfg(unix)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

/// Reads exactly `buf.len()` bytes at `offset`.
#[cfg(windows)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut filled = 0usize;
    while filled < buf.len() {
        let read = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            ));
        }
        filled += read;
    }
    Ok(())
}

/// Writes all of `buf` at `offset`.
///
/// A device that accepts zero bytes surfaces as
/// [`io::ErrorKind::WriteZero`]; callers treat that as a fatal short write.
#[cfg(unix)]
pub fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Writes all of `buf` at `offset`.
#[cfg(windows)]
pub fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0usize;
    while written < buf.len() {
        let wrote = file.seek_write(&buf[written..], offset + written as u64)?;
        if wrote == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "failed to write whole buffer",
            ));
        }
        written += wrote;
    }
    Ok(())
}

/// Hints the kernel to drop `[offset, offset + len)` from the page cache.
///
/// Best effort: backup transfers stream each block exactly once, and
/// letting them churn the page cache evicts data other workloads care
/// about. Errors are ignored - the hint is advisory.
#[cfg(target_os = "linux")]
pub fn drop_page_cache(file: &File, offset: u64, len: usize) {
    use std::os::unix::io::AsRawFd;
    unsafe {
        let _ = libc::posix_fadvise(
            file.as_raw_fd(),
            offset as libc::off_t,
            len as libc::off_t,
            libc::POSIX_FADV_DONTNEED,
        );
    }
}

/// No-op on platforms without `posix_fadvise`.
#[cfg(not(target_os = "linux"))]
pub fn drop_page_cache(_file: &File, _offset: u64, _len: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_positional_round_trip() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(&[0u8; 64]).unwrap();

        write_all_at(&tmp, b"abcd", 16).unwrap();
        let mut buf = [0u8; 4];
        read_exact_at(&tmp, &mut buf, 16).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_read_past_eof_is_unexpected_eof() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(&[1u8; 10]).unwrap();

        let mut buf = [0u8; 8];
        let err = read_exact_at(&tmp, &mut buf, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_drop_page_cache_does_not_panic() {
        let tmp = tempfile::tempfile().unwrap();
        drop_page_cache(&tmp, 0, 4096);
    }
}
