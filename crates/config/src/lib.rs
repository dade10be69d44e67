// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Bytes decoded by the serial device (data at +0, status at +4).
pub const SERIAL_REGION_SIZE: u64 = 8;
/// Bytes decoded by the exit device.
pub const EXIT_REGION_SIZE: u64 = 1;
/// First address an RV32 hart cannot reach.
pub const ADDRESS_SPACE_END: u64 = 0x1_0000_0000;

fn default_name() -> String {
    "default".to_string()
}

fn default_ram_size() -> String {
    "16 MiB".to_string()
}

fn default_serial_base() -> u64 {
    0x6969
}

fn default_exit_base() -> u64 {
    0x7000
}

/// Memory map of the simulated machine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MachineManifest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub ram_base: u64,
    #[serde(default = "default_ram_size")]
    pub ram_size: String, // e.g. "16 MiB"
    /// Initial stack pointer; defaults to 4 KiB below the end of RAM.
    #[serde(default)]
    pub stack_top: Option<u64>,
    #[serde(default = "default_serial_base")]
    pub serial_base: u64,
    #[serde(default = "default_exit_base")]
    pub exit_base: u64,
}

impl Default for MachineManifest {
    fn default() -> Self {
        Self {
            name: default_name(),
            ram_base: 0,
            ram_size: default_ram_size(),
            stack_top: None,
            serial_base: default_serial_base(),
            exit_base: default_exit_base(),
        }
    }
}

impl MachineManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open machine manifest at {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse Machine Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn ram_size_bytes(&self) -> Result<u64> {
        parse_size(&self.ram_size)
    }

    pub fn stack_top(&self) -> Result<u64> {
        if let Some(top) = self.stack_top {
            return Ok(top);
        }
        let size = self.ram_size_bytes()?;
        self.ram_base
            .checked_add(size.saturating_sub(0x1000))
            .ok_or_else(|| anyhow!("Machine '{}': stack_top overflows the address space", self.name))
    }

    /// `base..base + size`, rejected when it leaves the 32-bit address space.
    fn window(&self, what: &str, base: u64, size: u64) -> Result<Range<u64>> {
        match base.checked_add(size) {
            Some(end) if end <= ADDRESS_SPACE_END => Ok(base..end),
            _ => anyhow::bail!(
                "Machine '{}': {} at {:#x} (+{:#x}) is beyond the 32-bit address space",
                self.name,
                what,
                base,
                size
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.ram_size_bytes()?;
        if size == 0 {
            anyhow::bail!("Machine '{}': ram_size must be greater than zero", self.name);
        }

        let serial = self.window("serial device", self.serial_base, SERIAL_REGION_SIZE)?;
        let exit = self.window("exit device", self.exit_base, EXIT_REGION_SIZE)?;
        if serial.start < exit.end && exit.start < serial.end {
            anyhow::bail!(
                "Machine '{}': serial device {:#x}..{:#x} and exit device {:#x}..{:#x} overlap",
                self.name,
                serial.start,
                serial.end,
                exit.start,
                exit.end
            );
        }

        let ram_end = self.window("RAM", self.ram_base, size)?.end;
        let top = self.stack_top()?;
        // sp is 32 bits wide, so the top must itself be addressable.
        if top <= self.ram_base || top > ram_end || top >= ADDRESS_SPACE_END {
            anyhow::bail!(
                "Machine '{}': stack_top {:#x} is outside RAM [{:#x}, {:#x}]",
                self.name,
                top,
                self.ram_base,
                ram_end
            );
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub firmware: String,
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_steps: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WallTime,
    MemoryViolation,
    DecodeError,
    Exit,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SerialContainsAssertion {
    pub serial_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SerialEqualsAssertion {
    pub serial_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExitCodeAssertion {
    pub expected_exit_code: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    SerialContains(SerialContainsAssertion),
    SerialEquals(SerialEqualsAssertion),
    ExitCode(ExitCodeAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.firmware.trim().is_empty() {
            anyhow::bail!("Input 'firmware' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        Ok(())
    }

    /// Firmware path, relative paths resolved against the script's directory.
    pub fn firmware_path(&self, script_path: &Path) -> PathBuf {
        resolve_relative(script_path, &self.inputs.firmware)
    }

    pub fn system_path(&self, script_path: &Path) -> Option<PathBuf> {
        self.inputs
            .system
            .as_deref()
            .map(|s| resolve_relative(script_path, s))
    }
}

fn resolve_relative(anchor: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    anchor
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(target)
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format '{}': {}", size_str, e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
