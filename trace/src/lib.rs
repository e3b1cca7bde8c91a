/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the event trace recorder for the Cryptolith POST
    subsystem. One recorder serves one POST run: it interns event names,
    streams their ids through a caller-supplied sink as checkpoints are
    reached, and finishes the artifact with the interning table.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod wire;

use alloc::borrow::Cow;
use alloc::format;
use alloc::vec::Vec;

use cryptolith_common::{expected_integrity_mac, platform_flags, PostMode};
use cryptolith_error::{CryptolithError, CryptolithResult};
use zerocopy::IntoBytes;

pub use wire::{parse_trace, TraceArtifact, TraceHeader};
use wire::{
    TRACE_FAILURE_PREFIX, TRACE_MAGIC, TRACE_MAX_EVENTS, TRACE_MAX_NAMES, TRACE_MAX_NAME_LEN,
    TRACE_PROTOCOL_VERSION, TRACE_SUCCESS_STR, TRACE_TABLE_ID,
};

/// Sink receiving the serialized artifact as it is produced.
///
/// The write call is synchronous and may block; a returned error invalidates
/// the current trace session but never the process.
pub trait TraceWriter {
    fn write(&mut self, buf: &[u8]) -> CryptolithResult<()>;
}

/// Collects the artifact in memory.
impl TraceWriter for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> CryptolithResult<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// Discards everything; used when tracing is requested but no collector was
/// supplied.
#[derive(Default)]
pub struct NoopWriter;

impl TraceWriter for NoopWriter {
    fn write(&mut self, _buf: &[u8]) -> CryptolithResult<()> {
        Ok(())
    }
}

/// Event trace recorder for one POST run.
///
/// Names are interned by content into a table of at most
/// [`wire::TRACE_MAX_NAMES`] entries; ids 0 and 1 are reserved by `start`
/// for the internal sentinel and the test-boundary marker. Any recorder
/// failure invalidates the session so that no partial artifact is mistaken
/// for a complete one.
pub struct TraceRecorder<'w> {
    mode: PostMode,
    writer: Option<&'w mut dyn TraceWriter>,
    names: Vec<Cow<'static, str>>,
    events: usize,
    fault: Option<CryptolithError>,
}

impl<'w> Default for TraceRecorder<'w> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'w> TraceRecorder<'w> {
    /// Internal sentinel reserving id 0.
    pub const SENTINEL_STR: &'static str = "-";

    /// Test-boundary marker reserving id 1.
    pub const TEST_STR: &'static str = "?";

    /// An inactive recorder.
    pub fn new() -> Self {
        Self {
            mode: PostMode::empty(),
            writer: None,
            names: Vec::new(),
            events: 0,
            fault: None,
        }
    }

    /// Begin a trace session and write the artifact header.
    ///
    /// Fails unless `mode` carries the trace flag. A session already in
    /// progress is cleared first.
    pub fn start(
        &mut self,
        mode: PostMode,
        writer: &'w mut dyn TraceWriter,
    ) -> CryptolithResult<()> {
        self.clear();

        if !mode.is_trace() {
            return Err(CryptolithError::TRACE_NOT_STARTED);
        }

        self.mode = mode;
        self.writer = Some(writer);

        let header = TraceHeader {
            magic: TRACE_MAGIC,
            version: TRACE_PROTOCOL_VERSION,
            mode: mode.bits(),
            integ_mac: *expected_integrity_mac(),
            system_flags: platform_flags(),
        };
        self.emit(header.as_bytes())?;

        // Reserve id 0, and id 1 for the test-boundary marker.
        self.intern(Cow::Borrowed(Self::SENTINEL_STR));
        self.intern(Cow::Borrowed(Self::TEST_STR));

        Ok(())
    }

    /// True iff the trace flag is set and a sink is installed.
    pub fn is_active(&self) -> bool {
        self.mode.is_trace() && self.writer.is_some()
    }

    /// The error that invalidated the last session, if any. Cleared when a
    /// new session starts.
    pub fn last_fault(&self) -> Option<CryptolithError> {
        self.fault
    }

    /// Record that the named checkpoint was reached.
    ///
    /// Silently returns when no session is active. On any failure the
    /// session is invalidated rather than truncated.
    pub fn record(&mut self, name: &'static str) {
        self.record_name(Cow::Borrowed(name));
    }

    fn record_name(&mut self, name: Cow<'static, str>) {
        if !self.is_active() {
            return;
        }

        if self.events >= TRACE_MAX_EVENTS {
            self.invalidate(CryptolithError::TRACE_EVENT_OVERFLOW);
            return;
        }

        match self.intern(name) {
            Some(id) => {
                self.events += 1;
                // emit already invalidated the session on a sink failure.
                let _ = self.emit(&[id]);
            }
            None => self.invalidate(CryptolithError::TRACE_TABLE_FULL),
        }
    }

    /// Finish the session: record the synthetic result event, then write the
    /// end marker and the pascal-encoded interning table, then reset.
    pub fn end(&mut self, result: u32) -> CryptolithResult<()> {
        if !self.is_active() {
            return Err(CryptolithError::TRACE_NOT_ACTIVE);
        }

        if result == 0 {
            self.record_name(Cow::Borrowed(TRACE_SUCCESS_STR));
        } else {
            self.record_name(Cow::Owned(format!("{TRACE_FAILURE_PREFIX}{result:08X}")));
        }

        // The synthetic event may itself have exhausted the table or the sink.
        if !self.is_active() {
            return Err(CryptolithError::TRACE_NOT_ACTIVE);
        }

        self.emit(&[TRACE_TABLE_ID])?;
        self.emit(&[self.names.len() as u8])?;

        for idx in 0..self.names.len() {
            let name = self.names[idx].clone();
            if name.len() > TRACE_MAX_NAME_LEN {
                self.invalidate(CryptolithError::TRACE_NAME_TOO_LONG);
                return Err(CryptolithError::TRACE_NAME_TOO_LONG);
            }
            self.emit(&[name.len() as u8])?;
            self.emit(name.as_bytes())?;
        }

        self.clear();
        Ok(())
    }

    /// Reset to the inactive state. Idempotent; the universal recovery
    /// action, callable in any state.
    pub fn clear(&mut self) {
        self.mode = PostMode::empty();
        self.writer = None;
        self.names.clear();
        self.events = 0;
        self.fault = None;
    }

    /// Invalidate the session, keeping the cause for diagnosis.
    fn invalidate(&mut self, err: CryptolithError) {
        self.clear();
        self.fault = Some(err);
    }

    /// Look the name up in the table, interning it on first use. Returns
    /// `None` when the table is full.
    fn intern(&mut self, name: Cow<'static, str>) -> Option<u8> {
        if let Some(idx) = self.names.iter().position(|n| *n == name) {
            return Some(idx as u8);
        }
        if self.names.len() >= TRACE_MAX_NAMES {
            return None;
        }
        self.names.push(name);
        Some((self.names.len() - 1) as u8)
    }

    /// Write through the sink, invalidating the session on failure.
    fn emit(&mut self, buf: &[u8]) -> CryptolithResult<()> {
        let res = match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(CryptolithError::TRACE_NOT_ACTIVE),
        };
        if res.is_err() {
            self.invalidate(CryptolithError::TRACE_WRITE_FAILED);
            return Err(CryptolithError::TRACE_WRITE_FAILED);
        }
        Ok(())
    }
}
