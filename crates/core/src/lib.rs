// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Formatted output for freestanding targets.
//!
//! Three layers, leaf-first:
//! - [`sink`]: the byte-at-a-time output channel (MMIO or in-memory).
//! - [`convert`]: decimal integer conversion into caller-owned buffers.
//! - [`format`]: the `%`-specifier interpreter and the [`printf!`] macro.
//!
//! Nothing here allocates. The crate only links `std` for its own tests.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod convert;
pub mod format;
pub mod sink;

pub use convert::{convert_signed, convert_unsigned, DecimalBuf, MAX_DECIMAL_LEN};
pub use format::{count_conversions, printf, Arg};
pub use sink::{BufferSink, Console, Mmio, OutputSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("decimal text needs {required} bytes but the buffer holds {capacity}")]
    Truncated { required: usize, capacity: usize },
}

pub type FormatResult<T> = Result<T, FormatError>;
