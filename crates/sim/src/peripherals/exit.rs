// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;

/// Process-termination register.
/// The first byte written becomes the exit status; later writes are ignored.
#[derive(Debug, Default)]
pub struct ExitDevice {
    status: Option<u8>,
}

impl ExitDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::Peripheral for ExitDevice {
    fn read(&self, _offset: u64) -> SimResult<u8> {
        Ok(self.status.unwrap_or(0))
    }

    fn write(&mut self, _offset: u64, value: u8) -> SimResult<()> {
        if self.status.is_none() {
            tracing::info!("Guest requested exit with status {}", value);
            self.status = Some(value);
        }
        Ok(())
    }

    fn exit_status(&self) -> Option<u8> {
        self.status
    }
}
