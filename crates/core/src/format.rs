// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! `%`-specifier interpreter.
//!
//! Supported conversions: `%d`/`%i` (signed), `%u` (unsigned), `%c`, `%s`
//! and `%%`. Any other byte after `%` is echoed verbatim together with the
//! `%`. The format ends at the end of the slice or at the first NUL byte; a
//! trailing `%` simply ends output.

use crate::convert::DecimalBuf;
use crate::sink::OutputSink;

/// One formatting argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Char(char),
    Str(&'a str),
}

macro_rules! impl_from_int {
    ($variant:ident, $wide:ty, $($t:ty),+) => {
        $(
            impl From<$t> for Arg<'_> {
                fn from(v: $t) -> Self {
                    Arg::$variant(v as $wide)
                }
            }
        )+
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64, isize);
impl_from_int!(Uint, u64, u8, u16, u32, u64, usize);

impl From<char> for Arg<'_> {
    fn from(c: char) -> Self {
        Arg::Char(c)
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Signed,
    Unsigned,
    Char,
    Str,
    Percent,
    Unknown,
}

impl Conversion {
    const fn from_byte(c: u8) -> Self {
        match c {
            b'd' | b'i' => Conversion::Signed,
            b'u' => Conversion::Unsigned,
            b'c' => Conversion::Char,
            b's' => Conversion::Str,
            b'%' => Conversion::Percent,
            _ => Conversion::Unknown,
        }
    }

    const fn takes_argument(self) -> bool {
        matches!(
            self,
            Conversion::Signed | Conversion::Unsigned | Conversion::Char | Conversion::Str
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Literal,
    Specifier,
}

/// Number of argument-consuming conversions in `fmt`.
///
/// Usable in const context; [`printf!`](crate::printf) relies on it to reject
/// argument count mismatches at compile time.
pub const fn count_conversions(fmt: &[u8]) -> usize {
    let mut i = 0;
    let mut n = 0;
    while i < fmt.len() && fmt[i] != 0 {
        if fmt[i] == b'%' {
            i += 1;
            if i >= fmt.len() || fmt[i] == 0 {
                break;
            }
            if Conversion::from_byte(fmt[i]).takes_argument() {
                n += 1;
            }
        }
        i += 1;
    }
    n
}

/// Interprets `fmt` against `args` and writes the result to `sink`.
///
/// Returns the number of bytes written. A conversion with no argument left,
/// or with an argument of the wrong kind, is written out verbatim (`%` and
/// the conversion byte); the mismatched argument is still consumed. `%d` of
/// an unsigned argument and `%u` of a signed one reinterpret the 64-bit
/// pattern. Surplus arguments are ignored.
pub fn printf<S>(sink: &mut S, fmt: impl AsRef<[u8]>, args: &[Arg<'_>]) -> usize
where
    S: OutputSink + ?Sized,
{
    let mut args = args.iter().copied();
    let mut written = 0;
    let mut state = State::Literal;

    for &c in fmt.as_ref().iter().take_while(|&&c| c != 0) {
        state = match state {
            State::Literal if c == b'%' => State::Specifier,
            State::Literal => {
                sink.put_char(c);
                written += 1;
                State::Literal
            }
            State::Specifier => {
                written += convert(sink, c, &mut args);
                State::Literal
            }
        };
    }

    written
}

fn convert<'a, S, I>(sink: &mut S, spec: u8, args: &mut I) -> usize
where
    S: OutputSink + ?Sized,
    I: Iterator<Item = Arg<'a>>,
{
    let conversion = Conversion::from_byte(spec);
    if conversion == Conversion::Percent {
        sink.put_char(b'%');
        return 1;
    }
    if !conversion.takes_argument() {
        return verbatim(sink, spec);
    }

    match (conversion, args.next()) {
        (Conversion::Signed, Some(Arg::Int(v))) => sink.put_bytes(DecimalBuf::signed(v).as_bytes()),
        (Conversion::Signed, Some(Arg::Uint(v))) => {
            sink.put_bytes(DecimalBuf::signed(v as i64).as_bytes())
        }
        (Conversion::Unsigned, Some(Arg::Uint(v))) => {
            sink.put_bytes(DecimalBuf::unsigned(v).as_bytes())
        }
        (Conversion::Unsigned, Some(Arg::Int(v))) => {
            sink.put_bytes(DecimalBuf::unsigned(v as u64).as_bytes())
        }
        (Conversion::Char, Some(Arg::Char(c))) => put_char_utf8(sink, c),
        (Conversion::Char, Some(Arg::Uint(v))) => match scalar(v) {
            Some(c) => put_char_utf8(sink, c),
            None => verbatim(sink, spec),
        },
        (Conversion::Char, Some(Arg::Int(v))) => match u64::try_from(v).ok().and_then(scalar) {
            Some(c) => put_char_utf8(sink, c),
            None => verbatim(sink, spec),
        },
        (Conversion::Str, Some(Arg::Str(s))) => sink.put_str(s),
        _ => verbatim(sink, spec),
    }
}

fn scalar(v: u64) -> Option<char> {
    u32::try_from(v).ok().and_then(char::from_u32)
}

fn put_char_utf8<S: OutputSink + ?Sized>(sink: &mut S, c: char) -> usize {
    let mut utf8 = [0u8; 4];
    let encoded = c.encode_utf8(&mut utf8);
    // Written byte by byte: '\0' is a valid character here, not a terminator.
    encoded.bytes().for_each(|b| sink.put_char(b));
    encoded.len()
}

fn verbatim<S: OutputSink + ?Sized>(sink: &mut S, spec: u8) -> usize {
    sink.put_char(b'%');
    sink.put_char(spec);
    2
}

/// `printf` with the argument count checked at compile time.
///
/// Every argument must convert into [`Arg`], and the number of arguments must
/// equal [`count_conversions`] of the literal format, otherwise the build
/// fails.
///
/// ```
/// use serialfmt_core::{printf, BufferSink};
///
/// let mut storage = [0u8; 32];
/// let mut sink = BufferSink::new(&mut storage);
/// printf!(&mut sink, "Test %d\n", 1234);
/// assert_eq!(sink.as_bytes(), b"Test 1234\n");
/// ```
#[macro_export]
macro_rules! printf {
    ($sink:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        const _: () = ::core::assert!(
            $crate::format::count_conversions($fmt.as_bytes())
                == $crate::__count_args!($($arg),*),
            "printf!: conversion count does not match argument count"
        );
        $crate::format::printf($sink, $fmt, &[$($crate::format::Arg::from($arg)),*])
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __count_args {
    () => { 0usize };
    ($head:expr $(, $tail:expr)*) => { 1usize + $crate::__count_args!($($tail),*) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use std::string::String;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder(Vec<u8>);

    impl OutputSink for Recorder {
        fn put_char(&mut self, c: u8) {
            self.0.push(c);
        }
    }

    fn render(fmt: &str, args: &[Arg<'_>]) -> String {
        let mut rec = Recorder::default();
        let n = printf(&mut rec, fmt, args);
        assert_eq!(n, rec.0.len(), "returned count must match bytes written");
        String::from_utf8(rec.0).unwrap()
    }

    #[test]
    fn test_literal_passthrough() {
        assert_eq!(render("Hello World!\n", &[]), "Hello World!\n");
        assert_eq!(render("", &[]), "");
    }

    #[test]
    fn test_escaped_percent() {
        assert_eq!(render("%%", &[]), "%");
        assert_eq!(render("100%% done", &[]), "100% done");
    }

    #[test]
    fn test_decimal_conversions() {
        assert_eq!(render("%d", &[Arg::Int(0)]), "0");
        assert_eq!(render("%d", &[Arg::Int(1234)]), "1234");
        assert_eq!(render("%d", &[Arg::Int(-7)]), "-7");
        assert_eq!(render("%i", &[Arg::from(i32::MIN)]), "-2147483648");
        assert_eq!(render("%u", &[Arg::from(u32::MAX)]), "4294967295");
        assert_eq!(render("[%d|%d]", &[Arg::Int(1), Arg::Int(-2)]), "[1|-2]");
    }

    #[test]
    fn test_sequence_of_calls() {
        let mut rec = Recorder::default();
        printf(&mut rec, "Hello World!\n", &[]);
        printf(&mut rec, "Test %d\n", &[Arg::Int(1234)]);
        assert_eq!(rec.0, b"Hello World!\nTest 1234\n");
    }

    #[test]
    fn test_unknown_specifier_is_echoed() {
        assert_eq!(render("%q", &[]), "%q");
        // An unknown conversion does not consume an argument.
        assert_eq!(render("%x%d", &[Arg::Int(5)]), "%x5");
    }

    #[test]
    fn test_trailing_introducer_ends_output() {
        assert_eq!(render("abc%", &[]), "abc");
        assert_eq!(render("%", &[Arg::Int(1)]), "");
    }

    #[test]
    fn test_nul_terminates_format() {
        let mut rec = Recorder::default();
        printf(&mut rec, b"ok\0%d never", &[Arg::Int(9)]);
        assert_eq!(rec.0, b"ok");

        let mut rec = Recorder::default();
        printf(&mut rec, b"x%\0d", &[Arg::Int(9)]);
        assert_eq!(rec.0, b"x");
    }

    #[test]
    fn test_missing_argument_is_echoed() {
        assert_eq!(render("a=%d b=%d", &[Arg::Int(1)]), "a=1 b=%d");
    }

    #[test]
    fn test_mismatched_argument_is_echoed_and_consumed() {
        assert_eq!(render("%d %d", &[Arg::Str("x"), Arg::Int(3)]), "%d 3");
        assert_eq!(render("%s", &[Arg::Int(3)]), "%s");
    }

    #[test]
    fn test_sign_reinterpretation() {
        assert_eq!(render("%u", &[Arg::Int(-1)]), "18446744073709551615");
        assert_eq!(render("%d", &[Arg::Uint(u64::MAX)]), "-1");
    }

    #[test]
    fn test_char_and_str() {
        assert_eq!(render("%c%c", &[Arg::Char('o'), Arg::from('k')]), "ok");
        assert_eq!(render("%c", &[Arg::Char('é')]), "é");
        assert_eq!(render("%c", &[Arg::from(b'A')]), "A");
        assert_eq!(render("%c", &[Arg::Int(-1)]), "%c");
        assert_eq!(render("<%s>", &[Arg::Str("serial")]), "<serial>");
    }

    #[test]
    fn test_char_nul_is_written() {
        let mut rec = Recorder::default();
        let n = printf(&mut rec, "%c", &[Arg::Char('\0')]);
        assert_eq!(n, 1);
        assert_eq!(rec.0, [0u8]);
    }

    #[test]
    fn test_surplus_arguments_ignored() {
        assert_eq!(render("%d", &[Arg::Int(1), Arg::Int(2)]), "1");
    }

    #[test]
    fn test_count_conversions() {
        assert_eq!(count_conversions(b"Test %d\n"), 1);
        assert_eq!(count_conversions(b"%%"), 0);
        assert_eq!(count_conversions(b"%q"), 0);
        assert_eq!(count_conversions(b"abc%"), 0);
        assert_eq!(count_conversions(b"%d%u%c%s%i"), 5);
        assert_eq!(count_conversions(b"%d\0%d"), 1);
    }

    #[test]
    fn test_printf_macro() {
        let mut storage = [0u8; 64];
        let mut sink = BufferSink::new(&mut storage);
        let n = crate::printf!(&mut sink, "Test %d\n", 1234);
        assert_eq!(n, 10);
        crate::printf!(&mut sink, "%s=%u%c", "max", u16::MAX, '!');
        crate::printf!(&mut sink, "%%\n");
        assert_eq!(sink.as_bytes(), b"Test 1234\nmax=65535!%\n");
    }

    #[test]
    fn test_printf_into_small_buffer_never_overruns() {
        let mut storage = [0u8; 4];
        let mut sink = BufferSink::new(&mut storage);
        let n = printf(&mut sink, "%d", &[Arg::Int(-123456)]);
        assert_eq!(n, 7);
        assert_eq!(sink.as_bytes(), b"-123");
        assert_eq!(sink.dropped(), 3);
    }
}
