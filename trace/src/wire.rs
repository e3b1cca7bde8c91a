/*++

Licensed under the Apache-2.0 license.

File Name:

    wire.rs

Abstract:

    File contains the trace artifact wire format: the header structure, the
    reserved identifiers, and a parser for completed artifacts.

--*/

use alloc::string::String;
use alloc::vec::Vec;
use cryptolith_error::{CryptolithError, CryptolithResult};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic constant starting every trace artifact.
pub const TRACE_MAGIC: u32 = 0x6670_7472;

/// Wire format version produced by this crate.
pub const TRACE_PROTOCOL_VERSION: u32 = 1;

/// Maximum length of one interned event name.
pub const TRACE_MAX_NAME_LEN: usize = 0xFF;

/// Maximum number of distinct names interned per session, leaving room for
/// reserved id values below the u8 maximum.
pub const TRACE_MAX_NAMES: usize = 0xF0;

/// Reserved id announcing that the interning table follows.
pub const TRACE_TABLE_ID: u8 = (TRACE_MAX_NAMES + 1) as u8;

/// Maximum number of event ids recorded per session.
pub const TRACE_MAX_EVENTS: usize = 65535;

/// Synthetic final event recorded on success.
pub const TRACE_SUCCESS_STR: &str = "-POST_SUCCESS";

/// Prefix of the synthetic final event recorded on failure; followed by
/// eight uppercase hex digits of the aggregate result.
pub const TRACE_FAILURE_PREFIX: &str = "-POST_FAILURE: 0x";

/// Upper bound on the size of one complete artifact.
pub const TRACE_MAX_ARTIFACT_SIZE: usize = core::mem::size_of::<TraceHeader>()
    + TRACE_MAX_EVENTS
    + TRACE_MAX_NAMES * (TRACE_MAX_NAME_LEN + 1);

/// Header prepended onto each artifact.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct TraceHeader {
    pub magic: u32,
    pub version: u32,
    pub mode: u32,
    pub integ_mac: [u8; 32],
    pub system_flags: u64,
}

/// A fully parsed trace artifact.
#[derive(Debug)]
pub struct TraceArtifact {
    pub header: TraceHeader,
    pub event_ids: Vec<u8>,
    pub table: Vec<String>,
}

impl TraceArtifact {
    /// Event stream resolved through the interning table, in order.
    pub fn event_names(&self) -> Vec<&str> {
        self.event_ids
            .iter()
            .map(|&id| self.table[id as usize].as_str())
            .collect()
    }
}

/// Parse one complete artifact produced by a traced POST run.
pub fn parse_trace(buf: &[u8]) -> CryptolithResult<TraceArtifact> {
    let (header, mut rest) = TraceHeader::read_from_prefix(buf)
        .map_err(|_| CryptolithError::TRACE_ARTIFACT_TRUNCATED)?;

    if header.magic != TRACE_MAGIC || header.version != TRACE_PROTOCOL_VERSION {
        return Err(CryptolithError::TRACE_ARTIFACT_MALFORMED);
    }

    // Event ids run until the reserved table marker.
    let mut event_ids = Vec::new();
    loop {
        let (&id, tail) = rest
            .split_first()
            .ok_or(CryptolithError::TRACE_ARTIFACT_TRUNCATED)?;
        rest = tail;
        if id == TRACE_TABLE_ID {
            break;
        }
        event_ids.push(id);
    }

    let (&count, mut rest) = rest
        .split_first()
        .ok_or(CryptolithError::TRACE_ARTIFACT_TRUNCATED)?;
    if count as usize > TRACE_MAX_NAMES {
        return Err(CryptolithError::TRACE_ARTIFACT_MALFORMED);
    }

    let mut table = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (&len, tail) = rest
            .split_first()
            .ok_or(CryptolithError::TRACE_ARTIFACT_TRUNCATED)?;
        if tail.len() < len as usize {
            return Err(CryptolithError::TRACE_ARTIFACT_TRUNCATED);
        }
        let (name, tail) = tail.split_at(len as usize);
        let name = core::str::from_utf8(name)
            .map_err(|_| CryptolithError::TRACE_ARTIFACT_MALFORMED)?;
        table.push(String::from(name));
        rest = tail;
    }

    if !rest.is_empty() {
        return Err(CryptolithError::TRACE_ARTIFACT_MALFORMED);
    }

    // Every recorded id must resolve through the table.
    if event_ids.iter().any(|&id| id as usize >= table.len()) {
        return Err(CryptolithError::TRACE_ARTIFACT_MALFORMED);
    }

    Ok(TraceArtifact {
        header,
        event_ids,
        table,
    })
}
