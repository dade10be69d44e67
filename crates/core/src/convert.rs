// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Base-10 integer conversion into bounded buffers.
//!
//! Digits are counted first and then written back-to-front, so the buffer
//! always reads most significant digit first.
//!
//! Capacity policy: when the text does not fit, the bytes that fit are kept
//! (sign first, then the most significant digits), the least significant
//! digits are dropped, and [`FormatError::Truncated`] is returned. Nothing is
//! ever written past the end of the buffer.

use core::fmt;

use crate::{FormatError, FormatResult};

/// Longest decimal rendering of any 64-bit integer:
/// `-9223372036854775808` and `18446744073709551615` are both 20 bytes.
pub const MAX_DECIMAL_LEN: usize = 20;

fn digit_count(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 10 {
        value /= 10;
        n += 1;
    }
    n
}

/// Writes `value` in decimal at the start of `buf` and returns its length.
pub fn convert_unsigned(buf: &mut [u8], mut value: u64) -> FormatResult<usize> {
    let required = digit_count(value);
    let mut pos = required;
    while pos > 0 {
        pos -= 1;
        if let Some(slot) = buf.get_mut(pos) {
            *slot = b'0' + (value % 10) as u8;
        }
        value /= 10;
    }

    if required > buf.len() {
        return Err(FormatError::Truncated {
            required,
            capacity: buf.len(),
        });
    }
    Ok(required)
}

/// Like [`convert_unsigned`], with a leading `-` for negative values.
///
/// The magnitude comes from `unsigned_abs`, so `i64::MIN` needs no special case.
pub fn convert_signed(buf: &mut [u8], value: i64) -> FormatResult<usize> {
    if value >= 0 {
        return convert_unsigned(buf, value as u64);
    }

    let capacity = buf.len();
    let magnitude = value.unsigned_abs();
    let Some((sign, digits)) = buf.split_first_mut() else {
        return Err(FormatError::Truncated {
            required: 1 + digit_count(magnitude),
            capacity,
        });
    };

    *sign = b'-';
    match convert_unsigned(digits, magnitude) {
        Ok(n) => Ok(n + 1),
        Err(FormatError::Truncated { required, .. }) => Err(FormatError::Truncated {
            required: required + 1,
            capacity,
        }),
    }
}

/// Worst-case sized digit buffer; conversions into it never truncate.
#[derive(Clone, Copy)]
pub struct DecimalBuf {
    bytes: [u8; MAX_DECIMAL_LEN],
    len: usize,
}

impl DecimalBuf {
    pub fn signed(value: i64) -> Self {
        let mut bytes = [0; MAX_DECIMAL_LEN];
        let len = convert_signed(&mut bytes, value).unwrap_or(MAX_DECIMAL_LEN);
        Self { bytes, len }
    }

    pub fn unsigned(value: u64) -> Self {
        let mut bytes = [0; MAX_DECIMAL_LEN];
        let len = convert_unsigned(&mut bytes, value).unwrap_or(MAX_DECIMAL_LEN);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII digits and '-' are ever written.
        core::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for DecimalBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DecimalBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecimalBuf").field(&self.as_str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    fn unsigned_text(value: u64) -> std::string::String {
        let mut buf = [0u8; MAX_DECIMAL_LEN];
        let n = convert_unsigned(&mut buf, value).unwrap();
        std::str::from_utf8(&buf[..n]).unwrap().to_string()
    }

    fn signed_text(value: i64) -> std::string::String {
        let mut buf = [0u8; MAX_DECIMAL_LEN];
        let n = convert_signed(&mut buf, value).unwrap();
        std::str::from_utf8(&buf[..n]).unwrap().to_string()
    }

    const UNSIGNED_SAMPLES: &[u64] = &[
        0,
        1,
        7,
        9,
        10,
        11,
        99,
        100,
        1234,
        65_535,
        999_999,
        1_000_000,
        u32::MAX as u64,
        u32::MAX as u64 + 1,
        9_999_999_999_999_999_999,
        u64::MAX,
    ];

    #[test]
    fn test_zero_is_single_digit() {
        assert_eq!(unsigned_text(0), "0");
        assert_eq!(signed_text(0), "0");
    }

    #[test]
    fn test_digits_most_significant_first() {
        assert_eq!(unsigned_text(1234), "1234");
        assert_eq!(unsigned_text(10), "10");
        assert_eq!(unsigned_text(1_000_000), "1000000");
    }

    #[test]
    fn test_unsigned_matches_std_and_round_trips() {
        for &v in UNSIGNED_SAMPLES {
            let text = unsigned_text(v);
            assert_eq!(text, v.to_string());
            assert!(v == 0 || !text.starts_with('0'), "leading zero in {}", text);
            assert_eq!(text.parse::<u64>().unwrap(), v);
        }
    }

    #[test]
    fn test_negative_is_minus_plus_magnitude() {
        for &v in UNSIGNED_SAMPLES.iter().filter(|&&v| v > 0 && v <= i64::MAX as u64) {
            let neg = -(v as i64);
            assert_eq!(signed_text(neg), std::format!("-{}", unsigned_text(v)));
            assert_eq!(signed_text(neg).parse::<i64>().unwrap(), neg);
        }
    }

    #[test]
    fn test_signed_extremes() {
        assert_eq!(signed_text(i64::MIN), "-9223372036854775808");
        assert_eq!(signed_text(i64::MAX), "9223372036854775807");
        assert_eq!(signed_text(i32::MIN as i64), "-2147483648");
        assert_eq!(signed_text(-7), "-7");
        assert_eq!(signed_text(i64::MIN).len(), MAX_DECIMAL_LEN);
        assert_eq!(unsigned_text(u64::MAX).len(), MAX_DECIMAL_LEN);
    }

    #[test]
    fn test_exact_capacity_fits() {
        let mut buf = [0u8; 4];
        assert_eq!(convert_unsigned(&mut buf, 1234), Ok(4));
        assert_eq!(&buf, b"1234");

        let mut buf = [0u8; 2];
        assert_eq!(convert_signed(&mut buf, -7), Ok(2));
        assert_eq!(&buf, b"-7");
    }

    #[test]
    fn test_one_short_truncates_least_significant() {
        // The converter only sees the first three bytes; the fourth is a guard.
        let mut storage = [b'#'; 4];
        let res = convert_unsigned(&mut storage[..3], 1234);
        assert_eq!(
            res,
            Err(FormatError::Truncated {
                required: 4,
                capacity: 3
            })
        );
        assert_eq!(&storage, b"123#");
    }

    #[test]
    fn test_signed_truncation_keeps_sign() {
        let mut storage = [b'#'; 4];
        let res = convert_signed(&mut storage[..3], -4567);
        assert_eq!(
            res,
            Err(FormatError::Truncated {
                required: 5,
                capacity: 3
            })
        );
        assert_eq!(&storage, b"-45#");
    }

    #[test]
    fn test_zero_capacity_writes_nothing() {
        let mut empty: [u8; 0] = [];
        assert_eq!(
            convert_signed(&mut empty, -1),
            Err(FormatError::Truncated {
                required: 2,
                capacity: 0
            })
        );
        assert_eq!(
            convert_unsigned(&mut empty, 0),
            Err(FormatError::Truncated {
                required: 1,
                capacity: 0
            })
        );
    }

    #[test]
    fn test_decimal_buf() {
        let buf = DecimalBuf::signed(-1234);
        assert_eq!(buf.as_str(), "-1234");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_string(), "-1234");
        assert_eq!(DecimalBuf::unsigned(u64::MAX).as_bytes(), b"18446744073709551615");
        assert!(!DecimalBuf::unsigned(0).is_empty());
    }
}
