use std::path::Path;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::cursor::{VarWriteCursor, WriteCursor};
use crate::error::Result;
use crate::page::PageKind;
use crate::page_buffers::PageBuffers;
use crate::pipe::PipeWriteEnd;
use crate::sink::Sink;

/// Default page size, used as the flush threshold for a drainable
/// stream: 256KiB is large enough that the per-page framing overhead
/// this crate adds (none, in the core) never dominates, and small
/// enough that a pipe's default backpressure threshold
/// (`DEFAULT_MAX_BUFFERED_BYTES`) stays a modest multiple of it.
pub const DEFAULT_PAGE_SIZE: usize = 256 * 1024;

/// Default backpressure threshold for an `AsyncPipe`: four pages'
/// worth of buffered bytes before the writer suspends.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 4 * DEFAULT_PAGE_SIZE;

/// Marker for types that may be written verbatim by
/// `OutputStream::write_primitive` — fixed-width, no padding, no
/// indirection. Sealed so it can only be implemented inside this
/// crate.
pub unsafe trait Pod: Copy + 'static {}

unsafe impl Pod for u8 {}
unsafe impl Pod for u16 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for u64 {}
unsafe impl Pod for i8 {}
unsafe impl Pod for i16 {}
unsafe impl Pod for i32 {}
unsafe impl Pod for i64 {}
unsafe impl Pod for f32 {}
unsafe impl Pod for f64 {}

enum BufferStorage {
    Owned(PageBuffers),
    Shared(Arc<Mutex<PageBuffers>>),
}

impl BufferStorage {
    fn with<R>(&mut self, f: impl FnOnce(&mut PageBuffers) -> R) -> R {
        match self {
            BufferStorage::Owned(buffers) => f(buffers),
            BufferStorage::Shared(shared) => f(&mut shared.lock()),
        }
    }
}

enum Backing {
    /// A paged queue, optionally drained through a sink. `None` sink
    /// means a pure in-memory stream that buffers forever.
    Buffered {
        buffers: BufferStorage,
        detachable: bool,
    },
    /// A caller-owned fixed region with no paging and no sink. Writing
    /// past its end, or attempting any reservation against it, is a
    /// programming defect.
    Fixed { data: Box<[u8]> },
}

/// The driver of a paged byte stream: buffers writes into pages,
/// carves out forward reservations that are backfilled later, and
/// drains completed pages to a sink once no reservation is
/// outstanding.
pub struct OutputStream {
    backing: Backing,
    span_start: usize,
    span_end: usize,
    ext_cursors_count: usize,
    page_size: usize,
    pos: u64,
    sink: Option<Sink>,
    /// Set once a sink operation has reported an I/O failure. Recovery
    /// after a partial drain is not well-defined (which pages actually
    /// reached the sink is unknown), so every further operation is
    /// refused once a stream has failed rather than risk resuming
    /// mid-drain. See DESIGN.md for the full reasoning.
    failed: bool,
}

impl OutputStream {
    /// A stream with no sink at all: writes accumulate in memory until
    /// `get_output`/`consume_outputs` extracts them.
    pub fn new_in_memory(page_size: usize) -> OutputStream {
        OutputStream {
            backing: Backing::Buffered {
                buffers: BufferStorage::Owned(PageBuffers::new(page_size)),
                detachable: true,
            },
            span_start: 0,
            span_end: 0,
            ext_cursors_count: 0,
            page_size,
            pos: 0,
            sink: None,
            failed: false,
        }
    }

    /// A stream backed by a file: writes drain synchronously once a
    /// page fills or `flush`/`close` is called.
    pub fn new_file(path: &Path, page_size: usize) -> Result<OutputStream> {
        debug!("opening file-backed output stream at {}", path.display());
        Ok(OutputStream {
            backing: Backing::Buffered {
                buffers: BufferStorage::Owned(PageBuffers::new(page_size)),
                detachable: false,
            },
            span_start: 0,
            span_end: 0,
            ext_cursors_count: 0,
            page_size,
            pos: 0,
            sink: Some(Sink::file(path)?),
            failed: false,
        })
    }

    /// A stream over a caller-supplied fixed region. There is no
    /// paging and no sink; exhausting the region, or attempting any
    /// reservation, is a programming defect rather than a recoverable
    /// error, matching the Non-goal that this mode never owns its own
    /// buffer.
    pub fn new_unsafe_memory(data: Box<[u8]>) -> OutputStream {
        let page_size = data.len();
        let span_end = data.len();
        OutputStream {
            backing: Backing::Fixed { data },
            span_start: 0,
            span_end,
            ext_cursors_count: 0,
            page_size,
            pos: 0,
            sink: None,
            failed: false,
        }
    }

    pub(crate) fn for_pipe(
        page_size: usize,
        buffers: Arc<Mutex<PageBuffers>>,
        write_end: PipeWriteEnd,
    ) -> OutputStream {
        OutputStream {
            backing: Backing::Buffered {
                buffers: BufferStorage::Shared(buffers),
                detachable: false,
            },
            span_start: 0,
            span_end: 0,
            ext_cursors_count: 0,
            page_size,
            pos: 0,
            sink: Some(Sink::Pipe(write_end)),
            failed: false,
        }
    }

    /// Total bytes written so far.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Bytes written so far into a fixed-size ("unsafe memory")
    /// stream's caller-supplied region. Panics on any other backing,
    /// which has no single fixed region to read back — use
    /// `get_output`/`consume_outputs` there instead.
    pub fn unsafe_memory_written(&self) -> &[u8] {
        match &self.backing {
            Backing::Fixed { data } => &data[..self.span_start],
            Backing::Buffered { .. } => {
                panic!("unsafe_memory_written is only valid on a fixed-size stream")
            }
        }
    }

    /// Whether this stream's active sink (if any) supports async
    /// operations at all. A file sink only ever supports sync
    /// write/flush/close; only a pipe's writer side is async-capable.
    pub(crate) fn sink_supports_async(&self) -> bool {
        self.sink.as_ref().map_or(false, |s| s.is_async())
    }

    fn span_remaining(&self) -> usize {
        self.span_end - self.span_start
    }

    fn drainable(&self) -> bool {
        self.sink.is_some() && self.ext_cursors_count == 0
    }

    /// Replaces the current span with a freshly appended page of at
    /// least `min_size` bytes and records its index as the active page.
    fn open_new_span(&mut self, min_size: usize) {
        match &mut self.backing {
            Backing::Buffered {
                buffers,
                detachable,
            } => {
                let kind = if *detachable {
                    PageKind::Detachable
                } else {
                    PageKind::Plain
                };
                let cap = min_size.max(self.page_size);
                let new_end = buffers.with(|b| {
                    let idx = b.add_writable_page(cap, kind);
                    b.pages[idx].capacity()
                });
                self.span_start = 0;
                self.span_end = new_end;
            }
            Backing::Fixed { .. } => {
                panic!("a fixed-size stream cannot grow past its capacity");
            }
        }
    }

    /// Writes a single byte, opening a new page or draining as needed.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Panics if the active sink only supports async operations (an
    /// `AsyncPipe`'s writer side).
    fn assert_sink_supports_sync(&self) {
        assert!(
            self.sink.as_ref().map_or(true, |s| !s.is_async()),
            "this stream's sink only supports async operations; call the async equivalent instead"
        );
    }

    /// Writes `bytes` into the stream synchronously. Panics if the
    /// active sink only supports async operations (an `AsyncPipe`'s
    /// writer side) — use `write_async` there instead.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_not_failed()?;
        self.assert_sink_supports_sync();

        if bytes.len() <= self.span_remaining() {
            self.copy_into_span(bytes);
            return Ok(());
        }

        match &self.backing {
            Backing::Fixed { .. } => panic!("write past the end of a fixed-size stream"),
            Backing::Buffered { .. } => {}
        }

        if !self.drainable() {
            let (prefix, rest) = bytes.split_at(self.span_remaining());
            self.copy_into_span(prefix);
            self.open_new_span(rest.len());
            self.copy_into_span(rest);
            return Ok(());
        }

        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        let result = self.drain_sync(Some(bytes));
        if result.is_err() {
            self.failed = true;
            return result;
        }
        self.open_new_span(self.page_size);
        Ok(())
    }

    fn check_not_failed(&self) -> Result<()> {
        if self.failed {
            return Err(crate::error::Error::Closed);
        }
        Ok(())
    }

    /// Panics if the active sink only supports sync operations (a file
    /// sink, or none at all — both fine to call an async method on
    /// only when there's truly nothing async-specific to do, which the
    /// callers below handle by checking this before touching the sink).
    fn assert_sink_supports_async(&self) {
        assert!(
            self.sink.as_ref().map_or(true, |s| s.is_async()),
            "this stream's sink only supports sync operations; call the sync equivalent instead"
        );
    }

    /// Waits out an `AsyncPipe` writer's backpressure threshold for
    /// `additional_len` more bytes, if the active sink is a pipe.
    /// No-op for every other sink (or no sink at all): those modes have
    /// no shared reader to coordinate with, so a span-fitting write can
    /// land directly with no waiting.
    async fn await_pipe_capacity(&self, additional_len: usize) {
        if let Some(Sink::Pipe(p)) = self.sink.as_ref() {
            p.wait_for_capacity(additional_len).await;
        }
    }

    /// Wakes a reader parked on an `AsyncPipe`, if the active sink is a
    /// pipe. Must be called after every direct write into the span of a
    /// pipe-backed stream — including the span-fitting fast path, which
    /// never goes through `Sink::write_async` and so would otherwise
    /// leave a parked reader waiting on data that already arrived.
    fn signal_pipe_reader(&self) {
        if let Some(Sink::Pipe(p)) = self.sink.as_ref() {
            p.signal_reader();
        }
    }

    /// Writes `bytes` into the stream, suspending if the active sink
    /// (an `AsyncPipe`'s writer side, or a plain in-memory stream with
    /// no sink at all) needs to apply backpressure before accepting
    /// more data. Panics if the active sink only supports sync
    /// operations (a file sink) — call `write` there instead.
    pub async fn write_async(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_not_failed()?;
        self.assert_sink_supports_async();

        if bytes.len() <= self.span_remaining() {
            self.await_pipe_capacity(bytes.len()).await;
            self.copy_into_span(bytes);
            self.signal_pipe_reader();
            return Ok(());
        }

        if !self.drainable() {
            let (prefix, rest) = bytes.split_at(self.span_remaining());
            self.await_pipe_capacity(prefix.len()).await;
            self.copy_into_span(prefix);
            self.signal_pipe_reader();
            self.open_new_span(rest.len());
            self.await_pipe_capacity(rest.len()).await;
            self.copy_into_span(rest);
            self.signal_pipe_reader();
            return Ok(());
        }

        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if let Err(e) = self.drain_async(Some(bytes)).await {
            self.failed = true;
            return Err(e);
        }
        self.open_new_span(self.page_size);
        Ok(())
    }

    /// Async counterpart of `close_sync`. Panics if the active sink
    /// only supports sync operations (a file sink) — call `close_sync`
    /// there instead.
    pub async fn close_async(&mut self) -> Result<()> {
        if self.failed {
            self.sink = None;
            return Err(crate::error::Error::Closed);
        }
        self.assert_sink_supports_async();
        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if self.ext_cursors_count == 0 {
            if let Err(e) = self.drain_async(None).await {
                self.failed = true;
                self.sink = None;
                return Err(e);
            }
        }
        if let Some(sink) = &mut self.sink {
            let result = sink.close_async().await;
            self.sink = None;
            result?;
        }
        Ok(())
    }

    /// Closes the stream synchronously: drains any remaining pages and
    /// releases the sink. Panics if the active sink only supports
    /// async operations (an `AsyncPipe`'s writer side) — use
    /// `close_async` there instead.
    pub fn close_sync(&mut self) -> Result<()> {
        if self.failed {
            self.sink = None;
            return Err(crate::error::Error::Closed);
        }
        self.assert_sink_supports_sync();
        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if self.ext_cursors_count == 0 {
            if let Err(e) = self.drain_sync(None) {
                self.failed = true;
                self.sink = None;
                return Err(e);
            }
        }
        if let Some(sink) = &mut self.sink {
            let result = sink.close_sync();
            self.sink = None;
            result?;
        }
        Ok(())
    }

    fn current_page_end_addr(&mut self) -> usize {
        self.span_start
    }

    fn end_last_page_at(&mut self, addr: usize) {
        if let Backing::Buffered { buffers, .. } = &mut self.backing {
            buffers.with(|b| {
                if b.last_index().is_some() {
                    b.end_last_page_at(addr);
                }
            });
        }
    }

    fn copy_into_span(&mut self, bytes: &[u8]) {
        let start = self.span_start;
        match &mut self.backing {
            Backing::Buffered { buffers, .. } => {
                buffers.with(|b| {
                    let idx = b.pages.len() - 1;
                    let page = &mut b.pages[idx];
                    page.data[start..start + bytes.len()].copy_from_slice(bytes);
                    page.end = page.end.max(start + bytes.len());
                });
            }
            Backing::Fixed { data, .. } => {
                data[start..start + bytes.len()].copy_from_slice(bytes);
            }
        }
        self.span_start += bytes.len();
        self.pos += bytes.len() as u64;
    }

    /// Writes the raw bytes of a `Copy`, padding-free value directly
    /// into the stream.
    pub fn write_primitive<T: Pod>(&mut self, value: T) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(&value as *const T as *const u8, std::mem::size_of::<T>())
        };
        self.write(bytes)
    }

    /// Reserves `n` bytes at the current position, to be filled in
    /// later by the returned cursor. May straddle into a freshly
    /// appended page if the current span is too small.
    ///
    /// Not supported on a fixed-size ("unsafe memory") stream: that
    /// mode never owns a page queue for a cursor to index into.
    pub fn reserve_fixed(&mut self, n: usize) -> WriteCursor {
        let buffers = match &mut self.backing {
            Backing::Buffered { buffers, .. } => buffers,
            Backing::Fixed { .. } => panic!("reservations are not supported on a fixed-size stream"),
        };

        self.ext_cursors_count += 1;

        if n <= self.span_remaining() {
            let page = buffers.with(|b| b.last_index().unwrap());
            let offset = self.span_start;
            self.span_start += n;
            self.pos += n as u64;
            return WriteCursor::new_unsplit(page, offset, n);
        }

        let first_page = buffers.with(|b| b.last_index().unwrap());
        let first_offset = self.span_start;
        let first_len = self.span_remaining();
        let deficit = n - first_len;
        self.span_start += first_len;
        self.pos += first_len as u64;

        // The first fragment runs to the end of this page, but its bytes
        // arrive later through the cursor, not through `copy_into_span` —
        // which is the only other place that advances a page's `end`. Set
        // it now, since this page is about to stop being the last one and
        // nothing will touch its `end` again.
        buffers.with(|b| b.end_last_page_at(first_offset + first_len));

        let new_page = buffers.with(|b| {
            let idx = b.add_writable_page(deficit, PageKind::Plain);
            b.pages[idx].end = deficit;
            b.pages[idx].split_reserved = deficit;
            idx
        });
        self.span_start = deficit;
        self.span_end = buffers.with(|b| b.pages[new_page].capacity());
        self.pos += deficit as u64;

        WriteCursor::new_split(first_page, first_offset, first_len, new_page, deficit)
    }

    /// Reserves up to `max_n` bytes; the cursor's eventual `finalize`
    /// call may supply fewer bytes, trimming the overestimate from the
    /// stream with no trace. Requires the stream to own a page queue
    /// (forbidden on a fixed-size stream).
    pub fn reserve_var(&mut self, max_n: usize) -> VarWriteCursor {
        let buffers = match &mut self.backing {
            Backing::Buffered { buffers, .. } => buffers,
            Backing::Fixed { .. } => {
                panic!("variable-size reservations are not supported on a fixed-size stream")
            }
        };

        self.ext_cursors_count += 1;

        if max_n <= self.span_remaining() {
            let addr = self.span_start + max_n;
            let page = buffers.with(|b| b.split_last_page_at(addr));
            let reservation_page = page - 1;
            let start = self.span_start;
            self.span_start = 0;
            self.span_end = buffers.with(|b| b.pages[page].capacity());
            self.pos += max_n as u64;
            return VarWriteCursor::new_tail(reservation_page, start, max_n);
        }

        let end_addr = self.span_start;
        buffers.with(|b| {
            if b.last_index().is_some() {
                b.end_last_page_at(end_addr);
            }
        });

        let cap = max_n.max(self.page_size);
        let page = buffers.with(|b| {
            let idx = b.add_writable_page(cap, PageKind::Plain);
            b.pages[idx].end = max_n;
            idx
        });
        self.span_start = max_n;
        self.span_end = buffers.with(|b| b.pages[page].capacity());
        self.pos += max_n as u64;
        VarWriteCursor::new_head(page, max_n)
    }

    /// Finalizes a fixed-size reservation with its remaining bytes and
    /// marks it resolved.
    pub fn finalize_fixed(&mut self, cursor: WriteCursor, data: &[u8]) {
        let buffers = match &mut self.backing {
            Backing::Buffered { buffers, .. } => buffers,
            Backing::Fixed { .. } => unreachable!("fixed-size streams never issue cursors"),
        };
        buffers.with(|b| cursor.finalize(b, data));
        self.ext_cursors_count -= 1;
    }

    /// Finalizes a variable-size reservation with its actual bytes and
    /// marks it resolved.
    pub fn finalize_var(&mut self, cursor: VarWriteCursor, data: &[u8]) {
        let buffers = match &mut self.backing {
            Backing::Buffered { buffers, .. } => buffers,
            Backing::Fixed { .. } => unreachable!("fixed-size streams never issue cursors"),
        };
        buffers.with(|b| cursor.finalize(b, data));
        self.ext_cursors_count -= 1;
    }

    /// Advances a still-open fixed-size cursor without finalizing it.
    pub fn write_cursor(&mut self, cursor: &mut WriteCursor, data: &[u8]) {
        let buffers = match &mut self.backing {
            Backing::Buffered { buffers, .. } => buffers,
            Backing::Fixed { .. } => unreachable!("fixed-size streams never issue cursors"),
        };
        buffers.with(|b| cursor.write(b, data));
    }

    fn drain_sync(&mut self, extra: Option<&[u8]>) -> Result<()> {
        if self.sink.is_none() {
            // A pure in-memory stream has nothing to drain to; pages stay
            // buffered until `get_output`/`consume_outputs` extracts them.
            return Ok(());
        }
        if let Backing::Buffered { buffers, .. } = &mut self.backing {
            // Pages must still be dropped from the queue even if a later
            // one fails to write, so collect live regions first rather
            // than writing from inside the `consume_all_pages` callback,
            // which has no way to short-circuit on error.
            let mut pages = Vec::new();
            buffers.with(|b| {
                b.consume_all_pages(|live| {
                    if !live.is_empty() {
                        pages.push(live.to_vec());
                    }
                });
            });
            let sink = self.sink.as_mut().expect("drain requires a sink");
            trace!(
                "draining {} completed page(s) ({} bytes) to sink",
                pages.len(),
                pages.iter().map(Vec::len).sum::<usize>()
            );
            for page in pages {
                sink.write_sync(&page)?;
            }
            if let Some(extra) = extra {
                if !extra.is_empty() {
                    trace!("writing {} unbuffered bytes directly to sink", extra.len());
                    sink.write_sync(extra)?;
                }
            }
        }
        Ok(())
    }

    async fn drain_async(&mut self, extra: Option<&[u8]>) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }
        if let Backing::Buffered { buffers, .. } = &mut self.backing {
            let mut pages = Vec::new();
            buffers.with(|b| {
                b.consume_all_pages(|live| pages.push(live.to_vec()));
            });
            let sink = self.sink.as_mut().expect("drain requires a sink");
            for page in pages {
                if !page.is_empty() {
                    sink.write_async(&page).await?;
                }
            }
            if let Some(extra) = extra {
                if !extra.is_empty() {
                    sink.write_async(extra).await?;
                }
            }
        }
        Ok(())
    }

    /// Reopens a fresh writable span after a drain/flush. A no-op for a
    /// fixed-size ("unsafe memory") stream: that backing has no page
    /// queue to replenish from, never drains, and its span is simply
    /// whatever of the caller's region remains unwritten.
    fn reopen_span_after_drain(&mut self) {
        if matches!(self.backing, Backing::Buffered { .. }) {
            self.open_new_span(self.page_size);
        }
    }

    /// Flushes all completed data to the sink. Requires no outstanding
    /// reservations. A no-op beyond the precondition checks for a
    /// fixed-size stream, which has no sink to flush to.
    pub fn flush(&mut self) -> Result<()> {
        self.check_not_failed()?;
        self.assert_sink_supports_sync();
        assert_eq!(
            self.ext_cursors_count, 0,
            "cannot flush while a reservation is outstanding"
        );
        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if let Err(e) = self.drain_sync(None) {
            self.failed = true;
            return Err(e);
        }
        if let Some(sink) = &mut self.sink {
            if let Err(e) = sink.flush_sync() {
                self.failed = true;
                return Err(e);
            }
        }
        self.reopen_span_after_drain();
        Ok(())
    }

    /// Async counterpart of `flush`. Panics if the active sink only
    /// supports sync operations (a file sink) — call `flush` there
    /// instead.
    pub async fn flush_async(&mut self) -> Result<()> {
        self.check_not_failed()?;
        self.assert_sink_supports_async();
        assert_eq!(
            self.ext_cursors_count, 0,
            "cannot flush while a reservation is outstanding"
        );
        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if let Err(e) = self.drain_async(None).await {
            self.failed = true;
            return Err(e);
        }
        if let Some(sink) = &mut self.sink {
            if let Err(e) = sink.flush_async().await {
                self.failed = true;
                return Err(e);
            }
        }
        self.reopen_span_after_drain();
        Ok(())
    }

    /// Extracts everything written so far as a single contiguous
    /// buffer. Only valid for streams with no sink. Leaves the stream
    /// ready for fresh writes afterward.
    pub fn get_output(&mut self) -> Vec<u8> {
        assert!(!self.failed, "stream is closed after a previous I/O failure");
        assert_eq!(
            self.ext_cursors_count, 0,
            "cannot extract output while a reservation is outstanding"
        );
        assert!(self.sink.is_none(), "get_output is only valid on an in-memory stream");

        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);

        let result = match &mut self.backing {
            Backing::Buffered { buffers, detachable } => buffers.with(|b| {
                if *detachable
                    && b.pages.len() == 1
                    && b.pages[0].kind == PageKind::Detachable
                    && b.pages[0].start == 0
                {
                    let page = b.pages.pop_front().unwrap();
                    let mut data = page.data;
                    data.truncate(page.end);
                    data
                } else {
                    let mut out = Vec::with_capacity(b.buffered_len());
                    b.consume_all_pages(|live| out.extend_from_slice(live));
                    out
                }
            }),
            Backing::Fixed { .. } => unreachable!("get_output requires buffers"),
        };

        self.span_start = 0;
        self.span_end = 0;
        self.pos = 0;
        result
    }

    /// Like `get_output`, but yields each page's live region without
    /// concatenating them into one allocation. Only valid for streams
    /// with no sink, same as `get_output` — a sink-backed stream
    /// already drains its pages to the sink, so there would be nothing
    /// left buffered to hand to the callback without silently losing
    /// data that was never actually written anywhere.
    pub fn consume_outputs<F: FnMut(&[u8])>(&mut self, mut callback: F) {
        assert!(!self.failed, "stream is closed after a previous I/O failure");
        assert_eq!(
            self.ext_cursors_count, 0,
            "cannot consume outputs while a reservation is outstanding"
        );
        assert!(
            self.sink.is_none(),
            "consume_outputs is only valid on an in-memory stream"
        );
        let end_addr = self.current_page_end_addr();
        self.end_last_page_at(end_addr);
        if let Backing::Buffered { buffers, .. } = &mut self.backing {
            buffers.with(|b| b.consume_all_pages(&mut callback));
        }
        self.span_start = 0;
        self.span_end = 0;
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_roundtrips_bytes() {
        let mut stream = OutputStream::new_in_memory(16);
        stream.write(b"0 bottles on the wall\n").unwrap();
        stream.write(b"1 bottles on the wall\n").unwrap();
        let out = stream.get_output();
        assert_eq!(out, b"0 bottles on the wall\n1 bottles on the wall\n".to_vec());
    }

    #[test]
    fn delayed_fixed_write_lands_at_reservation_point() {
        let mut stream = OutputStream::new_in_memory(64);
        stream.write(b"initial output\n").unwrap();
        let cursor = stream.reserve_fixed(14);
        for size in [12usize, 342, 2121, 23, 1, 34012, 932] {
            let before = stream.pos();
            let block = vec![0u8; size];
            stream.write(&block).unwrap();
            assert_eq!(stream.pos() - before, size as u64);
        }
        stream.finalize_fixed(cursor, b"delayed write\n");

        let out = stream.get_output();
        assert!(out.starts_with(b"initial output\n"));
        assert_eq!(&out[15..29], b"delayed write\n");
    }

    #[test]
    fn writes_past_span_open_a_new_page() {
        let mut stream = OutputStream::new_in_memory(4);
        stream.write(b"ab").unwrap();
        stream.write(b"cdefgh").unwrap();
        let out = stream.get_output();
        assert_eq!(out, b"abcdefgh".to_vec());
    }
}
