/*++

Licensed under the Apache-2.0 license.

File Name:

    fake.rs

Abstract:

    File contains a builder for small synthetic Mach-O images used by the
    integrity tests.

--*/

use alloc::vec::Vec;
use core::mem::size_of;

use zerocopy::IntoBytes;

use crate::macho::{
    MachHeader32, MachHeader64, Section32, Section64, SegmentCommand32, SegmentCommand64,
    LC_SEGMENT, LC_SEGMENT_64, MH_DYLIB_IN_CACHE, MH_MAGIC, MH_MAGIC_64, SECT_TEXT, SEG_TEXT,
    SEG_TEXT_EXEC,
};

/// Text segment base address used for in-cache images.
pub const CACHE_TEXT_BASE: u64 = 0x0001_8000_0000;

pub fn pad16(name: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name);
    out
}

/// Shape of the image to build. One segment, one section, code appended
/// directly after the load commands.
pub struct FakeImage {
    pub bits64: bool,
    pub in_cache: bool,
    pub exec_segment: bool,
    pub sectname: [u8; 16],
}

impl Default for FakeImage {
    fn default() -> Self {
        Self {
            bits64: true,
            in_cache: false,
            exec_segment: false,
            sectname: pad16(SECT_TEXT),
        }
    }
}

impl FakeImage {
    pub fn build(&self, code: &[u8]) -> Vec<u8> {
        if self.bits64 {
            self.build64(code)
        } else {
            self.build32(code)
        }
    }

    fn segname(&self) -> [u8; 16] {
        if self.exec_segment {
            pad16(SEG_TEXT_EXEC)
        } else {
            pad16(SEG_TEXT)
        }
    }

    fn build64(&self, code: &[u8]) -> Vec<u8> {
        let seg_size = size_of::<SegmentCommand64>() + size_of::<Section64>();
        let code_off = size_of::<MachHeader64>() + seg_size;
        let segname = self.segname();
        let vmaddr = if self.in_cache { CACHE_TEXT_BASE } else { 0 };

        let header = MachHeader64 {
            magic: MH_MAGIC_64,
            cputype: 0x0100_000c,
            cpusubtype: 0,
            filetype: 6,
            ncmds: 1,
            sizeofcmds: seg_size as u32,
            flags: if self.in_cache { MH_DYLIB_IN_CACHE } else { 0 },
            reserved: 0,
        };
        let seg = SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: seg_size as u32,
            segname,
            vmaddr,
            vmsize: (code_off + code.len()) as u64,
            fileoff: 0,
            filesize: (code_off + code.len()) as u64,
            maxprot: 5,
            initprot: 5,
            nsects: 1,
            flags: 0,
        };
        let sect = Section64 {
            sectname: self.sectname,
            segname,
            addr: vmaddr + code_off as u64,
            size: code.len() as u64,
            offset: code_off as u32,
            align: 4,
            reloff: 0,
            nreloc: 0,
            flags: 0,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
        };

        let mut out = Vec::with_capacity(code_off + code.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(seg.as_bytes());
        out.extend_from_slice(sect.as_bytes());
        out.extend_from_slice(code);
        out
    }

    fn build32(&self, code: &[u8]) -> Vec<u8> {
        let seg_size = size_of::<SegmentCommand32>() + size_of::<Section32>();
        let code_off = size_of::<MachHeader32>() + seg_size;
        let segname = self.segname();

        let header = MachHeader32 {
            magic: MH_MAGIC,
            cputype: 0x0000_000c,
            cpusubtype: 0,
            filetype: 6,
            ncmds: 1,
            sizeofcmds: seg_size as u32,
            flags: 0,
        };
        let seg = SegmentCommand32 {
            cmd: LC_SEGMENT,
            cmdsize: seg_size as u32,
            segname,
            vmaddr: 0,
            vmsize: (code_off + code.len()) as u32,
            fileoff: 0,
            filesize: (code_off + code.len()) as u32,
            maxprot: 5,
            initprot: 5,
            nsects: 1,
            flags: 0,
        };
        let sect = Section32 {
            sectname: self.sectname,
            segname,
            addr: code_off as u32,
            size: code.len() as u32,
            offset: code_off as u32,
            align: 4,
            reloff: 0,
            nreloc: 0,
            flags: 0,
            reserved1: 0,
            reserved2: 0,
        };

        let mut out = Vec::with_capacity(code_off + code.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(seg.as_bytes());
        out.extend_from_slice(sect.as_bytes());
        out.extend_from_slice(code);
        out
    }
}
