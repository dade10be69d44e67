// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::LinearMemory;
use crate::peripherals::exit::ExitDevice;
use crate::peripherals::serial::{Serial, SerialLog};
use crate::{Peripheral, SimResult, SimulationError};
use serialfmt_config::{MachineManifest, EXIT_REGION_SIZE, SERIAL_REGION_SIZE};

pub const DEFAULT_RAM_BASE: u64 = 0x0000_0000;
pub const DEFAULT_RAM_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_SERIAL_BASE: u64 = 0x6969;
pub const DEFAULT_EXIT_BASE: u64 = 0x7000;

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// RAM plus memory-mapped devices. Devices shadow RAM at their addresses.
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
    pub stack_top: u64,
    serial_log: SerialLog,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::with_layout(
            DEFAULT_RAM_BASE,
            DEFAULT_RAM_SIZE,
            DEFAULT_RAM_BASE + DEFAULT_RAM_SIZE as u64 - 0x1000,
            DEFAULT_SERIAL_BASE,
            DEFAULT_EXIT_BASE,
        )
    }

    pub fn from_manifest(manifest: &MachineManifest) -> anyhow::Result<Self> {
        manifest.validate()?;
        let ram_size = manifest.ram_size_bytes()? as usize;
        Ok(Self::with_layout(
            manifest.ram_base,
            ram_size,
            manifest.stack_top()?,
            manifest.serial_base,
            manifest.exit_base,
        ))
    }

    fn with_layout(
        ram_base: u64,
        ram_size: usize,
        stack_top: u64,
        serial_base: u64,
        exit_base: u64,
    ) -> Self {
        let serial_log = SerialLog::default();
        let peripherals = vec![
            PeripheralEntry {
                name: "serial".to_string(),
                base: serial_base,
                size: SERIAL_REGION_SIZE,
                dev: Box::new(Serial::new(serial_log.clone())),
            },
            PeripheralEntry {
                name: "exit".to_string(),
                base: exit_base,
                size: EXIT_REGION_SIZE,
                dev: Box::new(ExitDevice::new()),
            },
        ];

        Self {
            ram: LinearMemory::new(ram_size, ram_base),
            peripherals,
            stack_top,
            serial_log,
        }
    }

    pub fn serial_output(&self) -> Vec<u8> {
        self.serial_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Toggle mirroring of serial output to the host's stdout.
    pub fn set_serial_echo(&mut self, echo: bool) {
        for p in self.peripherals.iter_mut().filter(|p| p.name == "serial") {
            if let Some(serial) = p
                .dev
                .as_any_mut()
                .and_then(|any| any.downcast_mut::<Serial>())
            {
                serial.set_echo(echo);
            }
        }
    }

    pub fn exit_status(&self) -> Option<u8> {
        self.peripherals.iter().find_map(|p| p.dev.exit_status())
    }

    fn peripheral_at(&self, addr: u64) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.contains(addr))
    }

    fn peripheral_at_mut(&mut self, addr: u64) -> Option<&mut PeripheralEntry> {
        self.peripherals.iter_mut().find(|p| p.contains(addr))
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        if let Some(p) = self.peripheral_at(addr) {
            return p.dev.read(addr - p.base);
        }
        self.ram
            .read_u8(addr)
            .ok_or(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if let Some(p) = self.peripheral_at_mut(addr) {
            let offset = addr - p.base;
            return p.dev.write(offset, value);
        }
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        Err(SimulationError::MemoryViolation(addr))
    }
}
