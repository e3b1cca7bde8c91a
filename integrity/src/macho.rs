/*++

Licensed under the Apache-2.0 license.

File Name:

    macho.rs

Abstract:

    File contains the Mach-O structures and the load-command walk that
    locates the code section covered by the module integrity check.

--*/

use core::mem::size_of;
use core::ops::Range;

use cryptolith_error::{CryptolithError, CryptolithResult};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const MH_MAGIC: u32 = 0xfeed_face;
pub const MH_MAGIC_64: u32 = 0xfeed_facf;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SEGMENT_64: u32 = 0x19;

/// Set when the image was loaded out of a shared cache; section addresses
/// are then virtual and must be rebased against the text segment.
pub const MH_DYLIB_IN_CACHE: u32 = 0x8000_0000;

pub const SEG_TEXT: &[u8] = b"__TEXT";
pub const SEG_TEXT_EXEC: &[u8] = b"__TEXT_EXEC";
pub const SECT_TEXT: &[u8] = b"__text";

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct MachHeader32 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct MachHeader64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct LoadCommand {
    pub cmd: u32,
    pub cmdsize: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct SegmentCommand32 {
    pub cmd: u32,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u32,
    pub vmsize: u32,
    pub fileoff: u32,
    pub filesize: u32,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct SegmentCommand64 {
    pub cmd: u32,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Section32 {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u32,
    pub size: u32,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Section64 {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    pub reserved3: u32,
}

/// Image word size, selected once from the header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Bits32,
    Bits64,
}

/// Segment fields needed by the walk, independent of word size.
struct SegmentView {
    segname: [u8; 16],
    vmaddr: u64,
    nsects: u32,
}

/// Section fields needed by the walk, independent of word size.
struct SectionView {
    sectname: [u8; 16],
    segname: [u8; 16],
    addr: u64,
    size: u64,
    offset: u32,
}

/// True when `field`, treated as a NUL-padded fixed string, equals `name`.
fn name_eq(field: &[u8; 16], name: &[u8]) -> bool {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end] == name
}

fn name_starts_with(field: &[u8; 16], prefix: &[u8]) -> bool {
    prefix.len() <= field.len() && &field[..prefix.len()] == prefix
}

fn read_segment(
    format: ImageFormat,
    body: &[u8],
) -> CryptolithResult<(SegmentView, usize)> {
    match format {
        ImageFormat::Bits32 => {
            let (seg, _) = SegmentCommand32::read_from_prefix(body)
                .map_err(|_| CryptolithError::INTEGRITY_MALFORMED_COMMAND)?;
            Ok((
                SegmentView {
                    segname: seg.segname,
                    vmaddr: seg.vmaddr as u64,
                    nsects: seg.nsects,
                },
                size_of::<SegmentCommand32>(),
            ))
        }
        ImageFormat::Bits64 => {
            let (seg, _) = SegmentCommand64::read_from_prefix(body)
                .map_err(|_| CryptolithError::INTEGRITY_MALFORMED_COMMAND)?;
            Ok((
                SegmentView {
                    segname: seg.segname,
                    vmaddr: seg.vmaddr,
                    nsects: seg.nsects,
                },
                size_of::<SegmentCommand64>(),
            ))
        }
    }
}

fn read_section<'a>(
    format: ImageFormat,
    bytes: &'a [u8],
) -> CryptolithResult<(SectionView, &'a [u8])> {
    match format {
        ImageFormat::Bits32 => {
            let (sect, tail) = Section32::read_from_prefix(bytes)
                .map_err(|_| CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
            Ok((
                SectionView {
                    sectname: sect.sectname,
                    segname: sect.segname,
                    addr: sect.addr as u64,
                    size: sect.size as u64,
                    offset: sect.offset,
                },
                tail,
            ))
        }
        ImageFormat::Bits64 => {
            let (sect, tail) = Section64::read_from_prefix(bytes)
                .map_err(|_| CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
            Ok((
                SectionView {
                    sectname: sect.sectname,
                    segname: sect.segname,
                    addr: sect.addr,
                    size: sect.size,
                    offset: sect.offset,
                },
                tail,
            ))
        }
    }
}

/// Locate the code section inside `image`.
///
/// `max_offset` bounds the region of the image that structures and the code
/// section may occupy; zero means the whole slice. The returned range indexes
/// into `image` and is guaranteed to lie inside the bounded region.
pub fn find_code_section(image: &[u8], max_offset: usize) -> CryptolithResult<Range<usize>> {
    let bound = if max_offset == 0 {
        image.len()
    } else {
        max_offset.min(image.len())
    };
    let region = &image[..bound];

    if bound < size_of::<MachHeader64>() + size_of::<LoadCommand>() {
        return Err(CryptolithError::INTEGRITY_IMAGE_TOO_SMALL);
    }

    let (magic, _) = u32::read_from_prefix(region)
        .map_err(|_| CryptolithError::INTEGRITY_IMAGE_TOO_SMALL)?;
    let (format, ncmds, flags, mut offset) = match magic {
        MH_MAGIC => {
            let (hdr, _) = MachHeader32::read_from_prefix(region)
                .map_err(|_| CryptolithError::INTEGRITY_IMAGE_TOO_SMALL)?;
            (
                ImageFormat::Bits32,
                hdr.ncmds,
                hdr.flags,
                size_of::<MachHeader32>(),
            )
        }
        MH_MAGIC_64 => {
            let (hdr, _) = MachHeader64::read_from_prefix(region)
                .map_err(|_| CryptolithError::INTEGRITY_IMAGE_TOO_SMALL)?;
            (
                ImageFormat::Bits64,
                hdr.ncmds,
                hdr.flags,
                size_of::<MachHeader64>(),
            )
        }
        _ => return Err(CryptolithError::INTEGRITY_UNSUPPORTED_IMAGE),
    };
    let in_cache = flags & MH_DYLIB_IN_CACHE != 0;

    // Base address of the text segment, learned on the way past it. Needed
    // only for in-cache images, where section addresses are virtual.
    let mut text_vmaddr: Option<u64> = None;

    for _ in 0..ncmds {
        let cmd_bytes = region
            .get(offset..)
            .ok_or(CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
        let (lc, _) = LoadCommand::read_from_prefix(cmd_bytes)
            .map_err(|_| CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
        let cmdsize = lc.cmdsize as usize;
        if cmdsize < size_of::<LoadCommand>() {
            return Err(CryptolithError::INTEGRITY_MALFORMED_COMMAND);
        }
        let cmd_end = offset
            .checked_add(cmdsize)
            .filter(|&end| end <= bound)
            .ok_or(CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
        let body = &region[offset..cmd_end];

        let is_segment = match format {
            ImageFormat::Bits32 => lc.cmd == LC_SEGMENT,
            ImageFormat::Bits64 => lc.cmd == LC_SEGMENT_64,
        };
        if is_segment {
            if let Some(range) =
                scan_segment(format, body, bound, in_cache, &mut text_vmaddr)?
            {
                return Ok(range);
            }
        }
        offset = cmd_end;
    }

    Err(CryptolithError::INTEGRITY_CODE_SECTION_NOT_FOUND)
}

/// Scan one segment command for the code section.
fn scan_segment(
    format: ImageFormat,
    body: &[u8],
    bound: usize,
    in_cache: bool,
    text_vmaddr: &mut Option<u64>,
) -> CryptolithResult<Option<Range<usize>>> {
    let (seg, header_len) = read_segment(format, body)?;

    if !name_starts_with(&seg.segname, SEG_TEXT) && !name_starts_with(&seg.segname, SEG_TEXT_EXEC)
    {
        return Ok(None);
    }
    if in_cache && name_eq(&seg.segname, SEG_TEXT) {
        *text_vmaddr = Some(seg.vmaddr);
    }

    // Sections follow the segment header inside the same command.
    let mut sect_bytes = &body[header_len..];
    for _ in 0..seg.nsects {
        let (sect, tail) = read_section(format, sect_bytes)?;
        sect_bytes = tail;

        if !name_eq(&sect.sectname, SECT_TEXT) {
            continue;
        }
        if !name_eq(&sect.segname, SEG_TEXT) && !name_eq(&sect.segname, SEG_TEXT_EXEC) {
            continue;
        }

        let start = if in_cache {
            // The image handle points at the header, so the section's slid
            // address rebases to an offset relative to the text segment base.
            let base = text_vmaddr.ok_or(CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
            let delta = sect
                .addr
                .checked_sub(base)
                .ok_or(CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
            usize::try_from(delta).map_err(|_| CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?
        } else {
            sect.offset as usize
        };
        let len =
            usize::try_from(sect.size).map_err(|_| CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= bound)
            .ok_or(CryptolithError::INTEGRITY_BOUNDS_VIOLATION)?;
        return Ok(Some(start..end));
    }

    Ok(None)
}
