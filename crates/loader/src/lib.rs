// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use serialfmt_sim::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    parse_elf(&buffer)
}

fn parse_elf(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut program_image = ProgramImage::new(elf.entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }

        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;
        let mem_size = ph.p_memsz as usize;

        if mem_size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes (mem {}), Offset={:#x}",
            start_addr, size, mem_size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|&end| end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;

        // .bss tail is zero-filled
        let mut segment_data = buffer[offset..end].to_vec();
        if mem_size > size {
            segment_data.resize(mem_size, 0);
        }
        program_image.add_segment(start_addr, segment_data);
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// Loads a flat binary as a single segment at `base`, which is also the entry point.
pub fn load_raw(path: &Path, base: u64) -> Result<ProgramImage> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read raw image: {:?}", path))?;
    Ok(raw_image(buffer, base))
}

fn raw_image(buffer: Vec<u8>, base: u64) -> ProgramImage {
    info!("Raw image: {} bytes at {:#x}", buffer.len(), base);
    if buffer.is_empty() {
        warn!("Raw image is empty");
    }
    let mut program_image = ProgramImage::new(base);
    program_image.add_segment(base, buffer);
    program_image
}

/// Loads `path` as ELF when it carries the ELF magic, as a raw image at `base` otherwise.
pub fn load_program(path: &Path, base: u64) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    if buffer.starts_with(ELF_MAGIC) {
        parse_elf(&buffer)
    } else {
        Ok(raw_image(buffer, base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Minimal little-endian ELF32 RISC-V executable with one PT_LOAD segment.
    fn elf32(entry: u32, addr: u32, code: &[u8], mem_size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(ELF_MAGIC);
        out.extend_from_slice(&[1, 1, 1, 0]); // ELFCLASS32, LSB, version, SysV
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&0xF3u16.to_le_bytes()); // EM_RISCV
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&52u32.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&52u16.to_le_bytes()); // e_ehsize
        out.extend_from_slice(&32u16.to_le_bytes()); // e_phentsize
        out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        out.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(out.len(), 52);

        let data_offset = 52u32 + 32;
        for field in [
            PT_LOAD,
            data_offset,
            addr,
            addr,
            code.len() as u32,
            mem_size,
            5, // R+X
            4,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(code);
        out
    }

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "serialfmt-loader-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_elf_segment() {
        let code = [0x6F, 0x00, 0x00, 0x00];
        let image = parse_elf(&elf32(0x100, 0x100, &code, 4)).unwrap();
        assert_eq!(image.entry_point, 0x100);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].start_addr, 0x100);
        assert_eq!(image.segments[0].data, code);
    }

    #[test]
    fn test_parse_elf_zero_fills_bss() {
        let image = parse_elf(&elf32(0, 0, &[1, 2], 6)).unwrap();
        assert_eq!(image.segments[0].data, vec![1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_elf_rejects_truncated_segment() {
        let mut bytes = elf32(0, 0, &[1, 2, 3, 4], 4);
        bytes.truncate(bytes.len() - 2);
        let err = parse_elf(&bytes).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_parse_elf_rejects_garbage() {
        assert!(parse_elf(b"\x7fELF not really").is_err());
    }

    #[test]
    fn test_load_raw_uses_base_as_entry() {
        let path = temp_file("raw.bin", &[0x13, 0x00, 0x00, 0x00]);
        let image = load_raw(&path, 0x400).unwrap();
        assert_eq!(image.entry_point, 0x400);
        assert_eq!(image.segments[0].start_addr, 0x400);
        assert_eq!(image.size(), 4);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_program_detects_format() {
        let elf_path = temp_file("detect.elf", &elf32(0x20, 0x20, &[0; 8], 8));
        let raw_path = temp_file("detect.bin", &[0xEF; 8]);

        let elf = load_program(&elf_path, 0x1000).unwrap();
        assert_eq!(elf.entry_point, 0x20);

        let raw = load_program(&raw_path, 0x1000).unwrap();
        assert_eq!(raw.entry_point, 0x1000);
        assert_eq!(raw.segments[0].data, vec![0xEF; 8]);

        let _ = fs::remove_file(elf_path);
        let _ = fs::remove_file(raw_path);
    }

    #[test]
    fn test_missing_file() {
        let err = load_program(Path::new("/nonexistent/serialfmt.bin"), 0).unwrap_err();
        assert!(err.to_string().contains("Failed to read image"));
    }
}
