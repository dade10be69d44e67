// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::any::Any;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Everything the guest has transmitted, in order.
pub type SerialLog = Arc<Mutex<Vec<u8>>>;

/// Transmit-only serial port.
/// A byte written at offset 0x0 is appended to the log and, when echo is
/// enabled, to the host's stdout.
#[derive(Debug)]
pub struct Serial {
    log: SerialLog,
    echo: bool,
}

impl Serial {
    pub fn new(log: SerialLog) -> Self {
        Self { log, echo: true }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }
}

impl crate::Peripheral for Serial {
    fn read(&self, offset: u64) -> SimResult<u8> {
        match offset {
            0x04 => Ok(0x01), // TX Ready (bit 0)
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset != 0x00 {
            return Ok(());
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(value);
        }
        if self.echo {
            let mut out = io::stdout().lock();
            if let Err(e) = out.write_all(&[value]).and_then(|_| out.flush()) {
                tracing::warn!("Serial echo to stdout failed: {}", e);
            }
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
