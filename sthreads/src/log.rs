//! Runtime logging.
//!
//! The scheduler logs from inside the preemption signal handler, so nothing
//! here may allocate, lock or go through `core::fmt`. Each record is
//! assembled in a fixed stack buffer and handed to stderr with a single
//! `write(2)`, which is async-signal-safe.
//!
//! Levels are chosen at compile time through Cargo features:
//!
//! - `log_error`: `sterror!` and `stwarn!`
//! - `log_info`: adds `stinfo!` (default)
//! - `log_trace`: adds `sttrace!`, one line per scheduling decision
//! - `no_logs`, or no level feature at all: silent
//!
//! Disabled levels are constant-false branches and compile away.
//!
//! Usage:
//!
//! ```text
//! stinfo!("runtime initialized");
//! sttrace!("switching to thread ", id);
//! ```

use libc::{STDERR_FILENO, c_void, write};

pub(crate) const P_ERROR: &str = "\x1b[1;31m[sthreads ERROR]\x1b[0m ";
pub(crate) const P_WARN: &str = "\x1b[1;33m[sthreads WARN ]\x1b[0m ";
pub(crate) const P_INFO: &str = "\x1b[32m[sthreads INFO ]\x1b[0m ";
pub(crate) const P_TRACE: &str = "\x1b[35m[sthreads TRACE]\x1b[0m ";

/// Longest record emitted; longer messages are truncated.
const RECORD_CAPACITY: usize = 256;

/// Fixed-capacity byte buffer for one log record.
struct Record {
    buf: [u8; RECORD_CAPACITY],
    len: usize,
}

impl Record {
    const fn new() -> Self {
        Self {
            buf: [0; RECORD_CAPACITY],
            len: 0,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        // Keep one byte for the trailing newline.
        let room = RECORD_CAPACITY - 1 - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }

    fn push_decimal(&mut self, mut value: u64) {
        let mut digits = [0u8; 20];
        let mut i = digits.len();

        loop {
            i -= 1;
            digits[i] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }

        self.push_bytes(&digits[i..]);
    }

    fn finish(&mut self) -> &[u8] {
        self.buf[self.len] = b'\n';
        &self.buf[..=self.len]
    }
}

/// Writes one record to stderr.
///
/// Errors from `write(2)` are ignored: there is nowhere left to report them.
pub(crate) fn emit(prefix: &str, msg: &str, value: Option<u64>) {
    let mut record = Record::new();
    record.push_bytes(prefix.as_bytes());
    record.push_bytes(msg.as_bytes());
    if let Some(v) = value {
        record.push_decimal(v);
    }

    let bytes = record.finish();
    unsafe {
        write(STDERR_FILENO, bytes.as_ptr() as *const c_void, bytes.len());
    }
}

/// `sterror!` and `stwarn!` are live.
pub(crate) const ERROR_ENABLED: bool = cfg!(all(
    not(feature = "no_logs"),
    any(feature = "log_error", feature = "log_info", feature = "log_trace")
));

/// `stinfo!` is live.
pub(crate) const INFO_ENABLED: bool = cfg!(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_trace")
));

/// `sttrace!` is live.
pub(crate) const TRACE_ENABLED: bool = cfg!(all(not(feature = "no_logs"), feature = "log_trace"));

macro_rules! sterror {
    ($msg:expr) => {{
        if $crate::log::ERROR_ENABLED {
            $crate::log::emit($crate::log::P_ERROR, $msg, None);
        }
    }};
    ($msg:expr, $val:expr) => {{
        if $crate::log::ERROR_ENABLED {
            $crate::log::emit($crate::log::P_ERROR, $msg, Some($val as u64));
        }
    }};
}

macro_rules! stwarn {
    ($msg:expr) => {{
        if $crate::log::ERROR_ENABLED {
            $crate::log::emit($crate::log::P_WARN, $msg, None);
        }
    }};
    ($msg:expr, $val:expr) => {{
        if $crate::log::ERROR_ENABLED {
            $crate::log::emit($crate::log::P_WARN, $msg, Some($val as u64));
        }
    }};
}

macro_rules! stinfo {
    ($msg:expr) => {{
        if $crate::log::INFO_ENABLED {
            $crate::log::emit($crate::log::P_INFO, $msg, None);
        }
    }};
    ($msg:expr, $val:expr) => {{
        if $crate::log::INFO_ENABLED {
            $crate::log::emit($crate::log::P_INFO, $msg, Some($val as u64));
        }
    }};
}

macro_rules! sttrace {
    ($msg:expr) => {{
        if $crate::log::TRACE_ENABLED {
            $crate::log::emit($crate::log::P_TRACE, $msg, None);
        }
    }};
    ($msg:expr, $val:expr) => {{
        if $crate::log::TRACE_ENABLED {
            $crate::log::emit($crate::log::P_TRACE, $msg, Some($val as u64));
        }
    }};
}

pub(crate) use {sterror, stinfo, sttrace, stwarn};
