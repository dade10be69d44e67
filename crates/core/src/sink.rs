// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::fmt;

/// A destination that accepts one byte at a time, in order.
///
/// There is no failure path: the medium is assumed to always be ready.
/// Exclusive `&mut` access is what keeps writes from interleaving.
pub trait OutputSink {
    fn put_char(&mut self, c: u8);

    /// Writes `s` byte by byte, stopping at the first NUL or the end of the slice.
    /// Returns the number of bytes written.
    fn put_bytes(&mut self, s: &[u8]) -> usize {
        let mut written = 0;
        for &c in s.iter().take_while(|&&c| c != 0) {
            self.put_char(c);
            written += 1;
        }
        written
    }

    fn put_str(&mut self, s: &str) -> usize {
        self.put_bytes(s.as_bytes())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn put_char(&mut self, c: u8) {
        (**self).put_char(c)
    }
}

/// Memory-mapped transmit register: every byte is a single volatile store.
#[derive(Debug)]
pub struct Mmio {
    tx: *mut u8,
}

impl Mmio {
    /// # Safety
    ///
    /// `addr` must be a writable device register for the lifetime of the
    /// returned value, and nothing else may treat it as ordinary memory.
    pub const unsafe fn new(addr: usize) -> Self {
        Self { tx: addr as *mut u8 }
    }
}

impl OutputSink for Mmio {
    #[inline]
    fn put_char(&mut self, c: u8) {
        // SAFETY: guaranteed by the contract of `Mmio::new`.
        unsafe { core::ptr::write_volatile(self.tx, c) }
    }
}

/// Records output into a caller-supplied buffer.
///
/// Bytes past the end of the buffer are dropped and counted, never written.
#[derive(Debug)]
pub struct BufferSink<'a> {
    buf: &'a mut [u8],
    len: usize,
    dropped: usize,
}

impl<'a> BufferSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            dropped: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.dropped = 0;
    }
}

impl OutputSink for BufferSink<'_> {
    fn put_char(&mut self, c: u8) {
        if let Some(slot) = self.buf.get_mut(self.len) {
            *slot = c;
            self.len += 1;
        } else {
            self.dropped += 1;
        }
    }
}

/// `core::fmt::Write` adapter, so `write!` works on any sink.
pub struct Console<S> {
    sink: S,
}

impl<S: OutputSink> Console<S> {
    pub const fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S: OutputSink> OutputSink for Console<S> {
    fn put_char(&mut self, c: u8) {
        self.sink.put_char(c)
    }
}

impl<S: OutputSink> fmt::Write for Console<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // NUL is data here, not a terminator.
        s.bytes().for_each(|c| self.sink.put_char(c));
        Ok(())
    }
}
