use std::collections::VecDeque;

use crate::page::{Page, PageKind};

/// An ordered queue of [`Page`]s, the backing storage of an
/// [`OutputStream`](crate::stream::OutputStream) and the shared buffer
/// inside an [`AsyncPipe`](crate::pipe::AsyncPipe).
///
/// Pages are drained strictly front-to-back, so the queue is a
/// `VecDeque` rather than a `Vec`: draining and pipe-reader consumption
/// both pop from the front while writes only ever touch the back.
#[derive(Debug)]
pub(crate) struct PageBuffers {
    pub(crate) pages: VecDeque<Page>,
    pub(crate) page_size: usize,
    pub(crate) eof_reached: bool,
}

impl PageBuffers {
    pub(crate) fn new(page_size: usize) -> PageBuffers {
        PageBuffers {
            pages: VecDeque::new(),
            page_size,
            eof_reached: false,
        }
    }

    fn round_up(&self, size: usize) -> usize {
        size.max(self.page_size)
    }

    /// Appends a fresh writable page and returns its index.
    pub(crate) fn add_writable_page(&mut self, size: usize, kind: PageKind) -> usize {
        let page = Page::new(self.round_up(size), kind);
        self.pages.push_back(page);
        self.pages.len() - 1
    }

    pub(crate) fn last_index(&self) -> Option<usize> {
        if self.pages.is_empty() {
            None
        } else {
            Some(self.pages.len() - 1)
        }
    }

    /// Sets the live-region end of the last page to `addr`, an absolute
    /// offset within that page's data. Idempotent when `addr` already
    /// equals the current end.
    pub(crate) fn end_last_page_at(&mut self, addr: usize) {
        let page = self.pages.back_mut().expect("no pages to end");
        debug_assert!(addr <= page.capacity());
        page.end = addr;
    }

    /// Ends the last page at `addr` and starts a fresh page sized for
    /// whatever capacity remains beyond `addr`. Used to carve a
    /// variable-size reservation out of the tail of the current page:
    /// the reservation stays attached to the (now shorter) old page,
    /// and ordinary writes continue in the newly appended one.
    ///
    /// Nothing has been written past `addr` yet here, so the old page's
    /// buffer is simply truncated (reclaiming its unused tail capacity)
    /// and a new page is pushed for the remainder, with no aliasing and
    /// no unsafe code.
    pub(crate) fn split_last_page_at(&mut self, addr: usize) -> usize {
        let remainder_cap = {
            let page = self.pages.back_mut().expect("no pages to split");
            debug_assert!(addr <= page.capacity());
            page.end = addr;
            let remainder = page.capacity() - addr;
            page.data.truncate(addr);
            remainder
        };
        self.add_writable_page(remainder_cap, PageKind::Plain)
    }

    /// Drops every page front-to-back, invoking `callback` with each
    /// page's live region before it is discarded. Leaves the queue
    /// empty.
    pub(crate) fn consume_all_pages<F: FnMut(&[u8])>(&mut self, mut callback: F) {
        while let Some(page) = self.pages.pop_front() {
            callback(page.live());
        }
    }

    /// Copies buffered bytes into `dst`, dropping fully consumed pages
    /// from the front and trimming the new front page's `start` for a
    /// partial consumption. Returns the number of bytes copied. Used
    /// only by the reader side of an [`AsyncPipe`].
    pub(crate) fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let Some(page) = self.pages.front_mut() else {
                break;
            };
            let available = page.live_len();
            if available == 0 {
                self.pages.pop_front();
                continue;
            }
            let take = available.min(dst.len() - copied);
            dst[copied..copied + take]
                .copy_from_slice(&page.data[page.start..page.start + take]);
            page.start += take;
            copied += take;
            if page.start == page.end {
                self.pages.pop_front();
            }
        }
        copied
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.pages.iter().map(Page::live_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_all_pages_yields_stream_order() {
        let mut buffers = PageBuffers::new(4);
        let idx0 = buffers.add_writable_page(4, PageKind::Plain);
        buffers.pages[idx0].writable_mut()[..4].copy_from_slice(b"abcd");
        buffers.pages[idx0].end = 4;
        let idx1 = buffers.add_writable_page(4, PageKind::Plain);
        buffers.pages[idx1].writable_mut()[..2].copy_from_slice(b"ef");
        buffers.pages[idx1].end = 2;

        let mut out = Vec::new();
        buffers.consume_all_pages(|bytes| out.extend_from_slice(bytes));
        assert_eq!(out, b"abcdef");
        assert!(buffers.pages.is_empty());
    }

    #[test]
    fn split_last_page_preserves_prefix_and_opens_new_tail() {
        let mut buffers = PageBuffers::new(8);
        let idx = buffers.add_writable_page(8, PageKind::Plain);
        buffers.pages[idx].writable_mut()[..3].copy_from_slice(b"abc");
        buffers.pages[idx].end = 3;

        let new_idx = buffers.split_last_page_at(5);
        assert_eq!(new_idx, idx + 1);
        assert_eq!(buffers.pages[idx].capacity(), 5);
        assert_eq!(buffers.pages[idx].end, 5);
        assert_eq!(buffers.pages[new_idx].capacity(), 8);
        assert_eq!(buffers.pages[new_idx].remaining(), 8);
    }

    #[test]
    fn drain_into_partially_consumes_front_page() {
        let mut buffers = PageBuffers::new(4);
        let idx = buffers.add_writable_page(4, PageKind::Plain);
        buffers.pages[idx].writable_mut()[..4].copy_from_slice(b"abcd");
        buffers.pages[idx].end = 4;

        let mut dst = [0u8; 2];
        let n = buffers.drain_into(&mut dst);
        assert_eq!(n, 2);
        assert_eq!(&dst, b"ab");
        assert_eq!(buffers.pages[0].live(), b"cd");

        let mut dst2 = [0u8; 4];
        let n2 = buffers.drain_into(&mut dst2);
        assert_eq!(n2, 2);
        assert_eq!(&dst2[..2], b"cd");
        assert!(buffers.pages.is_empty());
    }
}
