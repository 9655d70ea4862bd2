//! Byte-range line reader.
//!
//! Yields the integers found on the lines of a byte range `[start, end)` of a
//! line-oriented text file. Designed so that a contiguous partition of
//! `[0, file_size)` reproduces a whole-file read exactly, no matter where the
//! cut points land.
//!
//! # Ownership Rule
//!
//! A range owns every line that **starts** inside `[start, end)`:
//!
//! - `start == 0`: the first line starts at byte 0 and is owned.
//! - `start > 0`: reading begins at `start - 1` and everything through the
//!   first `\n` is discarded. When byte `start - 1` is itself a `\n`, the
//!   discard consumes only that byte and the line starting at `start` is kept
//!   whole; otherwise the discarded bytes are the tail of a line owned by the
//!   preceding range, which reads past its own `end` to finish it.
//! - The reader keeps yielding lines while the line's first byte is `< end`,
//!   running past `end` to complete the last owned line.
//! - A final line terminated by EOF instead of `\n` is still yielded.
//!
//! Both sides of every cut apply the same rule, so concatenating the yields of
//! `[0,k)` and `[k,file_size)` equals reading the file line by line, for any
//! `k`. The property test in `tests/property/line_boundaries.rs` checks this
//! over arbitrary partitions.
//!
//! # Lenient Parsing
//!
//! Lines are trimmed of ASCII whitespace (tolerating `\r\n` endings) and
//! parsed as decimal `u64`. Lines that do not parse, including blank lines
//! and values out of `u64` range, are skipped silently; only I/O errors
//! surface, as `Err` items that end the iteration.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use memchr::memchr;

/// Read buffer size. Sequential reads this size keep syscall overhead low
/// without holding more than one buffer per worker.
const READ_BUF_LEN: usize = 64 * 1024;

// ============================================================================
// posix_fadvise hint
// ============================================================================

/// Hint the kernel to use aggressive sequential readahead for the file.
#[cfg(target_os = "linux")]
fn fadvise_sequential(file: &File) {
    use std::os::unix::io::AsRawFd;
    unsafe {
        libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
    }
}

#[cfg(not(target_os = "linux"))]
fn fadvise_sequential(_file: &File) {}

// ============================================================================
// Reader
// ============================================================================

/// Iterator over the integers on lines owned by a byte range.
///
/// See the module docs for the exact boundary semantics. Items are
/// `io::Result<u64>`; the first `Err` ends the iteration (the caller treats
/// it as a task failure and the whole range is retried).
pub struct IntegerLines {
    file: File,
    /// Exclusive bound on owned line starts.
    end: u64,
    /// Absolute file offset of `buf[cursor]`.
    abs_next: u64,
    buf: Vec<u8>,
    filled: usize,
    cursor: usize,
    /// Accumulates a line that spans buffer refills.
    line: Vec<u8>,
    done: bool,
}

impl IntegerLines {
    /// Opens `path` and positions the reader on the first line owned by
    /// `[start, end)`.
    ///
    /// # Errors
    ///
    /// Any open/seek/read error. Errors after `open` returns are reported
    /// through the iterator.
    pub fn open(path: &Path, start: u64, end: u64) -> io::Result<Self> {
        debug_assert!(start <= end, "range start {} past end {}", start, end);

        let mut file = File::open(path)?;
        fadvise_sequential(&file);

        let reader = if start == 0 {
            Self::at(file, 0, end)
        } else {
            file.seek(SeekFrom::Start(start - 1))?;
            let mut r = Self::at(file, start - 1, end);
            r.discard_through_newline()?;
            r
        };

        // A discard that reached `end` or EOF leaves no owned line; the
        // line-start gate in `next()` reports the iterator empty.
        Ok(reader)
    }

    fn at(file: File, abs_next: u64, end: u64) -> Self {
        Self {
            file,
            end,
            abs_next,
            buf: vec![0u8; READ_BUF_LEN],
            filled: 0,
            cursor: 0,
            line: Vec::new(),
            done: false,
        }
    }

    /// Consume bytes up to and including the first `\n`, starting from the
    /// current position. Hitting EOF first means the range holds no owned
    /// line at all.
    fn discard_through_newline(&mut self) -> io::Result<()> {
        loop {
            if self.cursor == self.filled {
                if self.refill()? == 0 {
                    self.done = true;
                    return Ok(());
                }
            }
            let window = &self.buf[self.cursor..self.filled];
            match memchr(b'\n', window) {
                Some(i) => {
                    self.consume(i + 1);
                    return Ok(());
                }
                None => {
                    let len = window.len();
                    self.consume(len);
                }
            }
        }
    }

    /// Refill the buffer, EINTR-safe. Returns the byte count (0 at EOF).
    fn refill(&mut self) -> io::Result<usize> {
        debug_assert_eq!(self.cursor, self.filled, "refill with unconsumed bytes");
        let n = loop {
            match self.file.read(&mut self.buf) {
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.cursor = 0;
        self.filled = n;
        Ok(n)
    }

    #[inline]
    fn consume(&mut self, n: usize) {
        self.cursor += n;
        self.abs_next += n as u64;
    }
}

impl Iterator for IntegerLines {
    type Item = io::Result<u64>;

    fn next(&mut self) -> Option<io::Result<u64>> {
        if self.done {
            return None;
        }
        loop {
            // A line starting at or past `end` belongs to the next range.
            if self.line.is_empty() && self.abs_next >= self.end {
                self.done = true;
                return None;
            }

            if self.cursor == self.filled {
                match self.refill() {
                    Ok(0) => {
                        // EOF terminates the final line in place of `\n`.
                        self.done = true;
                        if self.line.is_empty() {
                            return None;
                        }
                        let line = std::mem::take(&mut self.line);
                        return parse_integer(&line).map(Ok);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            let window = &self.buf[self.cursor..self.filled];
            match memchr(b'\n', window) {
                Some(i) => {
                    self.line.extend_from_slice(&window[..i]);
                    self.consume(i + 1);
                    let line = std::mem::take(&mut self.line);
                    if let Some(n) = parse_integer(&line) {
                        return Some(Ok(n));
                    }
                    // Unparseable line: skip, keep going.
                }
                None => {
                    self.line.extend_from_slice(window);
                    let len = window.len();
                    self.consume(len);
                }
            }
        }
    }
}

/// Parse a line as a decimal `u64` after trimming ASCII whitespace.
///
/// Returns `None` for blank lines and anything that is not a plain decimal
/// integer in range; those lines count as non-prime by omission.
fn parse_integer(line: &[u8]) -> Option<u64> {
    let trimmed = trim_ascii(line);
    if trimmed.is_empty() {
        return None;
    }
    std::str::from_utf8(trimmed).ok()?.parse::<u64>().ok()
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}
