use std::io::{self, ErrorKind, Read};

use crate::prelude::*;

/// Number of bytes preceding a marker that are retained for inspection.
const PREAMBLE_KEEP: usize = 32;

/// Upper bound on the buffer reserved up front for a section; larger sections grow as
/// bytes actually arrive.
const MAX_PREALLOC: usize = 1 << 20;

/// Bytes provides the ability to read bytes from a reader and push them
/// back if they are not needed, i.e., Peek-and-push. The original order of
/// the bytes is preserved when pushing bytes back.
pub(crate) struct Bytes<R>
where
    R: Read,
{
    reader: R,
    num_read: usize,
    // pushed back bytes, stored in reverse order
    cache: Vec<u8>,
    buf: [u8; 1],
    preamble: Vec<u8>,
}

impl<R> Bytes<R>
where
    R: Read,
{
    pub fn new(reader: R) -> Self {
        Bytes {
            reader,
            num_read: 0,
            cache: Vec::new(),
            buf: [0u8; 1],
            preamble: Vec::new(),
        }
    }

    pub fn next(&mut self) -> io::Result<u8> {
        if let Some(b) = self.cache.pop() {
            Ok(b)
        } else {
            let n = self.reader.read(&mut self.buf)?;
            if n == 0 {
                return Err(io::Error::from(ErrorKind::UnexpectedEof));
            }
            self.num_read += 1;
            Ok(self.buf[0])
        }
    }

    pub fn push(&mut self, dat: &[u8]) {
        self.cache.extend(dat.iter().rev());
    }

    /// Offset of the next byte that will be produced.
    pub fn offset(&self) -> usize {
        self.num_read - self.cache.len()
    }

    /// Leading bytes skipped before the marker found by [Bytes::scan], truncated to
    /// the first `PREAMBLE_KEEP` bytes.
    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }

    /// Scan forward until `marker` is found. On success the marker bytes are consumed
    /// and the returned offset is where the marker started.
    ///
    /// # Errors
    /// [Error::MissingMarker] if the stream ends before the marker is seen, or any
    /// other IO error.
    pub fn scan(&mut self, marker: &[u8]) -> Result<usize> {
        let mut working: Vec<u8> = Vec::with_capacity(marker.len());

        'next_start: loop {
            let start = self.offset();
            for expected in marker {
                let b = match self.next() {
                    Ok(b) => b,
                    Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                        return Err(Error::MissingMarker);
                    }
                    Err(err) => return Err(Error::Io(err)),
                };
                working.push(b);

                if b != *expected {
                    // The first byte cannot start a marker; everything after it
                    // goes back to be checked again.
                    if self.preamble.len() < PREAMBLE_KEEP {
                        self.preamble.push(working[0]);
                    }
                    self.push(&working[1..]);
                    working.clear();
                    continue 'next_start;
                }
            }
            return Ok(start);
        }
    }
}

/// Reads drain pushed back bytes before touching the underlying reader.
impl<R> Read for Bytes<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.cache.is_empty() {
            let n = self.reader.read(buf)?;
            self.num_read += n;
            return Ok(n);
        }
        let n = buf.len().min(self.cache.len());
        for b in &mut buf[..n] {
            // n is bounded by cache length
            *b = self.cache.pop().unwrap_or_default();
        }
        Ok(n)
    }
}

/// Read exactly `len` bytes for `section`, reporting how many were available if the
/// input ends early.
pub(crate) fn read_section<R>(reader: &mut R, len: usize, section: &'static str) -> Result<Vec<u8>>
where
    R: Read,
{
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(Error::Truncated {
            section,
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}
