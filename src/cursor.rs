use crate::page_buffers::PageBuffers;

/// A handle to a forward reservation of exactly `n` bytes, created by
/// `OutputStream::reserve_fixed`. The reservation may straddle a page
/// boundary, in which case `write`/`finalize` transparently continue
/// into the second fragment.
///
/// Must be consumed by [`WriteCursor::finalize`] exactly once; dropping
/// one unfinalized leaves the owning stream's reservation count above
/// zero forever, so draining and flushing are permanently refused. The
/// `#[must_use]` catches the case where the cursor is never used at
/// all; it cannot catch a cursor that is used but never finalized.
#[must_use]
#[derive(Debug)]
pub struct WriteCursor {
    cur_page: usize,
    cur_offset: usize,
    cur_remaining: usize,
    pending: Option<(usize, usize)>,
}

impl WriteCursor {
    pub(crate) fn new_unsplit(page: usize, offset: usize, len: usize) -> WriteCursor {
        WriteCursor {
            cur_page: page,
            cur_offset: offset,
            cur_remaining: len,
            pending: None,
        }
    }

    pub(crate) fn new_split(
        first_page: usize,
        first_offset: usize,
        first_len: usize,
        second_page: usize,
        second_len: usize,
    ) -> WriteCursor {
        WriteCursor {
            cur_page: first_page,
            cur_offset: first_offset,
            cur_remaining: first_len,
            pending: Some((second_page, second_len)),
        }
    }

    /// Total bytes not yet written into this reservation.
    pub fn remaining(&self) -> usize {
        self.cur_remaining + self.pending.map_or(0, |(_, l)| l)
    }

    /// Writes `data` into the reservation, advancing past the current
    /// fragment into the pending one if `data` runs past it.
    ///
    /// Panics if `data` is longer than [`WriteCursor::remaining`].
    pub fn write(&mut self, buffers: &mut PageBuffers, mut data: &[u8]) {
        assert!(
            data.len() <= self.remaining(),
            "write past the end of a fixed-size reservation"
        );
        while !data.is_empty() {
            if self.cur_remaining == 0 {
                let (page, len) = self
                    .pending
                    .take()
                    .expect("write past the end of a fixed-size reservation");
                debug_assert_eq!(buffers.pages[page].split_reserved, len);
                buffers.pages[page].split_reserved = 0;
                self.cur_page = page;
                self.cur_offset = 0;
                self.cur_remaining = len;
            }
            let n = data.len().min(self.cur_remaining);
            let page = &mut buffers.pages[self.cur_page];
            page.data[self.cur_offset..self.cur_offset + n].copy_from_slice(&data[..n]);
            self.cur_offset += n;
            self.cur_remaining -= n;
            data = &data[n..];
        }
    }

    /// Writes the final `data`, which must exactly fill what remains of
    /// the reservation, and consumes the cursor. The caller (the owning
    /// `OutputStream`) is responsible for decrementing its outstanding
    /// reservation count.
    pub fn finalize(mut self, buffers: &mut PageBuffers, data: &[u8]) {
        assert_eq!(
            data.len(),
            self.remaining(),
            "fixed-size reservation finalized with the wrong number of bytes"
        );
        self.write(buffers, data);
    }
}

/// Which end of its page a variable-size reservation occupies. An
/// overestimated reservation is trimmed by adjusting that page's
/// `start` (head) or `end` (tail) on finalize; the rest of the page is
/// never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarAnchor {
    Tail,
    Head,
}

/// A handle to a reservation of up to `max_len` bytes, created by
/// `OutputStream::reserve_var`. Unlike [`WriteCursor`] it never
/// straddles a page: the reservation is carved wholly from the tail of
/// the page the stream was about to write into, or occupies the head
/// of a freshly appended page.
#[must_use]
#[derive(Debug)]
pub struct VarWriteCursor {
    page: usize,
    start: usize,
    max_len: usize,
    anchor: VarAnchor,
}

impl VarWriteCursor {
    pub(crate) fn new_tail(page: usize, start: usize, max_len: usize) -> VarWriteCursor {
        VarWriteCursor {
            page,
            start,
            max_len,
            anchor: VarAnchor::Tail,
        }
    }

    pub(crate) fn new_head(page: usize, max_len: usize) -> VarWriteCursor {
        VarWriteCursor {
            page,
            start: 0,
            max_len,
            anchor: VarAnchor::Head,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Writes `actual`, which must be no longer than the reservation's
    /// declared maximum, and consumes the cursor. Bytes beyond
    /// `actual.len()` are trimmed from the stream with no trace.
    pub fn finalize(self, buffers: &mut PageBuffers, actual: &[u8]) {
        assert!(
            actual.len() <= self.max_len,
            "variable-size reservation finalized with more bytes than reserved"
        );
        let page = &mut buffers.pages[self.page];
        match self.anchor {
            VarAnchor::Tail => {
                let end = self.start + actual.len();
                page.data[self.start..end].copy_from_slice(actual);
                page.end = end;
            }
            VarAnchor::Head => {
                let overestimated = self.max_len - actual.len();
                page.data[overestimated..overestimated + actual.len()].copy_from_slice(actual);
                page.start = overestimated;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageKind;

    #[test]
    fn unsplit_cursor_writes_in_place() {
        let mut buffers = PageBuffers::new(16);
        let idx = buffers.add_writable_page(16, PageKind::Plain);
        buffers.pages[idx].end = 4;
        let cursor = WriteCursor::new_unsplit(idx, 0, 4);
        cursor.finalize(&mut buffers, b"abcd");
        assert_eq!(&buffers.pages[idx].data[..4], b"abcd");
    }

    #[test]
    fn split_cursor_crosses_pages() {
        let mut buffers = PageBuffers::new(4);
        let first = buffers.add_writable_page(4, PageKind::Plain);
        buffers.pages[first].end = 4;
        let second = buffers.add_writable_page(4, PageKind::Plain);
        buffers.pages[second].end = 2;
        buffers.pages[second].split_reserved = 2;

        let mut cursor = WriteCursor::new_split(first, 0, 4, second, 2);
        cursor.write(&mut buffers, b"abcd");
        cursor.finalize(&mut buffers, b"ef");

        assert_eq!(&buffers.pages[first].data[..4], b"abcd");
        assert_eq!(&buffers.pages[second].data[..2], b"ef");
        assert_eq!(buffers.pages[second].split_reserved, 0);
    }

    #[test]
    fn var_cursor_tail_trims_on_underfill() {
        let mut buffers = PageBuffers::new(16);
        let idx = buffers.add_writable_page(16, PageKind::Plain);
        buffers.pages[idx].end = 16; // reservation reserved through addr 16

        let cursor = VarWriteCursor::new_tail(idx, 0, 16);
        cursor.finalize(&mut buffers, b"hello");
        assert_eq!(buffers.pages[idx].end, 5);
        assert_eq!(buffers.pages[idx].live(), b"hello");
    }

    #[test]
    fn var_cursor_head_trims_on_underfill() {
        let mut buffers = PageBuffers::new(16);
        let idx = buffers.add_writable_page(16, PageKind::Plain);
        buffers.pages[idx].end = 16;

        let cursor = VarWriteCursor::new_head(idx, 16);
        cursor.finalize(&mut buffers, b"hi");
        assert_eq!(buffers.pages[idx].start, 14);
        assert_eq!(buffers.pages[idx].live(), b"hi");
    }
}
