use std::future::poll_fn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Poll, Waker};

use log::trace;
use parking_lot::Mutex;

use crate::error::Result;
use crate::page::PageKind;
use crate::page_buffers::PageBuffers;
use crate::stream::OutputStream;

/// A single-slot, one-shot wakeup. At most one task parks on a given
/// slot at a time, matching the single-producer/single-consumer shape
/// of an `AsyncPipe`: the writer only ever parks on `waiting_writer`
/// and the reader only ever parks on `waiting_reader`. Built directly
/// on `poll_fn` rather than a channel type so the core stays
/// executor-agnostic.
#[derive(Debug, Default)]
struct WaitSlot {
    signaled: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl WaitSlot {
    fn new() -> WaitSlot {
        WaitSlot {
            signaled: AtomicBool::new(false),
            waker: Mutex::new(None),
        }
    }

    /// Wakes a parked task, if any. A signal on a slot nobody is
    /// parked on is remembered so the next `wait` returns immediately,
    /// and is otherwise a no-op.
    fn signal(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }

    async fn wait(&self) {
        poll_fn(|cx| {
            if self.signaled.swap(false, Ordering::SeqCst) {
                return Poll::Ready(());
            }
            *self.waker.lock() = Some(cx.waker().clone());
            if self.signaled.swap(false, Ordering::SeqCst) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

#[derive(Debug)]
struct PipeShared {
    buffers: Arc<Mutex<PageBuffers>>,
    max_buffered_bytes: usize,
    waiting_reader: WaitSlot,
    waiting_writer: WaitSlot,
}

/// The writer-side half of an `AsyncPipe`, wrapped in `Sink::Pipe` and
/// driven through an `OutputStream`'s ordinary async write path.
#[derive(Debug)]
pub struct PipeWriteEnd {
    shared: Arc<PipeShared>,
}

impl PipeWriteEnd {
    /// Suspends on `waiting_writer` until the buffers can accept
    /// `additional_len` more bytes without exceeding
    /// `max_buffered_bytes`. Used both by `write` and by any other
    /// writer-side path that lands bytes directly into a page shared
    /// with the reader (the `OutputStream` span-fitting fast path),
    /// since those bytes are just as visible to the reader as ones that
    /// went through `write` itself.
    pub(crate) async fn wait_for_capacity(&self, additional_len: usize) {
        loop {
            let buffered = self.shared.buffers.lock().buffered_len();
            if buffered == 0 || buffered + additional_len <= self.shared.max_buffered_bytes {
                return;
            }
            trace!(
                "pipe write backpressured: {} buffered bytes, {} byte write, {} max",
                buffered,
                additional_len,
                self.shared.max_buffered_bytes
            );
            self.shared.waiting_reader.signal();
            self.shared.waiting_writer.wait().await;
        }
    }

    /// Wakes a reader parked on `waiting_reader`, if any. Call after
    /// any bytes become newly visible in the shared buffers, whether
    /// written through `write` or copied directly into an open span.
    pub(crate) fn signal_reader(&self) {
        self.shared.waiting_reader.signal();
    }

    pub(crate) async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.wait_for_capacity(bytes.len()).await;

        {
            let mut buffers = self.shared.buffers.lock();
            let idx = buffers.add_writable_page(bytes.len(), PageKind::Plain);
            let page = &mut buffers.pages[idx];
            page.writable_mut()[..bytes.len()].copy_from_slice(bytes);
            page.end = bytes.len();
        }
        self.signal_reader();
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.shared.buffers.lock().eof_reached = true;
        self.signal_reader();
    }
}

/// The reader-side half of an `AsyncPipe`.
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<PipeShared>,
}

impl PipeReader {
    /// Delivers at least one byte into `dst` unless the pipe has
    /// reached EOF with nothing buffered, in which case it returns 0.
    /// Returns the number of bytes actually copied, which may be less
    /// than `dst.len()`.
    pub async fn read(&self, dst: &mut [u8]) -> usize {
        let target = dst.len().min(1);
        loop {
            let (buffered, eof) = {
                let buffers = self.shared.buffers.lock();
                (buffers.buffered_len(), buffers.eof_reached)
            };
            if buffered >= target || eof {
                break;
            }
            trace!("pipe reader waiting: {} buffered, {} target", buffered, target);
            self.shared.waiting_writer.signal();
            self.shared.waiting_reader.wait().await;
        }

        let n = self.shared.buffers.lock().drain_into(dst);
        if n > 0 {
            self.shared.waiting_writer.signal();
        }
        n
    }
}

/// A page queue shared between a writer-side `OutputStream` and a
/// reader-side `PipeReader`, with cooperative backpressure: the writer
/// suspends once `max_buffered_bytes` is exceeded, the reader suspends
/// until data (or EOF) is available.
pub struct AsyncPipe;

impl AsyncPipe {
    /// `max_buffered_bytes` is typically a small multiple of `page_size`
    /// (see `DEFAULT_MAX_BUFFERED_BYTES`); passing an unrelated value is
    /// fine, it only controls how eagerly the writer suspends.
    pub fn new(page_size: usize, max_buffered_bytes: usize) -> (OutputStream, PipeReader) {
        let buffers = Arc::new(Mutex::new(PageBuffers::new(page_size)));
        let shared = Arc::new(PipeShared {
            buffers: Arc::clone(&buffers),
            max_buffered_bytes,
            waiting_reader: WaitSlot::new(),
            waiting_writer: WaitSlot::new(),
        });

        let writer = OutputStream::for_pipe(
            page_size,
            buffers,
            PipeWriteEnd {
                shared: Arc::clone(&shared),
            },
        );
        let reader = PipeReader { shared };
        (writer, reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_and_reader_exchange_bytes() {
        let (mut writer, reader) = AsyncPipe::new(64, 256);
        writer.write_async(b"hello").await.unwrap();
        writer.close_async().await.unwrap();

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await;
        assert_eq!(&buf[..n], b"hello");

        let mut buf2 = [0u8; 16];
        let n2 = reader.read(&mut buf2).await;
        assert_eq!(n2, 0);
    }

    #[tokio::test]
    async fn reader_drains_in_order_across_writes() {
        let (mut writer, reader) = AsyncPipe::new(8, 1024);
        writer.write_async(b"abc").await.unwrap();
        writer.write_async(b"def").await.unwrap();
        writer.close_async().await.unwrap();

        let mut buf = [0u8; 2];
        let mut out = Vec::new();
        loop {
            let n = reader.read(&mut buf).await;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcdef");
    }
}
