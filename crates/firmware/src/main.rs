// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Hello-world guest for the serialfmt RV32I simulator.

#![no_main]
#![no_std]

use core::fmt::Write;
use core::panic::PanicInfo;
use serialfmt_core::{printf, Console, Mmio, OutputSink};

/// Serial transmit register.
const SERIAL_ADDR: usize = 0x6969;
/// A byte stored here ends the simulation with that status.
const EXIT_ADDR: usize = 0x7000;

core::arch::global_asm!(
    ".section .text.entry, \"ax\"",
    ".globl _start",
    "_start:",
    "    la sp, __stack_top",
    "    call rust_main",
    "1:  j 1b",
);

fn serial() -> Console<Mmio> {
    // SAFETY: SERIAL_ADDR is the simulator's serial device and nothing else aliases it.
    Console::new(unsafe { Mmio::new(SERIAL_ADDR) })
}

fn exit(code: u8) -> ! {
    // SAFETY: EXIT_ADDR is the simulator's exit device.
    unsafe { core::ptr::write_volatile(EXIT_ADDR as *mut u8, code) };
    loop {}
}

#[no_mangle]
pub extern "C" fn rust_main() -> ! {
    let mut console = serial();
    console.put_str("Hello World!\n");
    printf!(&mut console, "Test %d\n", 1234);
    exit(1)
}

#[panic_handler]
fn panic_handler(info: &PanicInfo) -> ! {
    let mut console = serial();
    if let Some(location) = info.location() {
        let _ = writeln!(
            console,
            "panic in file `{}` at line {}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        let _ = writeln!(console, "panic: {}", info.message());
    }
    exit(101)
}
