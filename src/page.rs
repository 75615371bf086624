/// Distinguishes a page that can be handed back to the caller without
/// copying (see `OutputStream::get_output`) from an ordinary page whose
/// bytes must be concatenated into a fresh buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PageKind {
    Plain,
    Detachable,
}

/// A single contiguous, fixed-capacity region of a page queue.
///
/// `data` is allocated at its full capacity up front and never grows;
/// `start`/`end` delimit the live bytes within it. Most pages keep
/// `start == 0`; a non-zero `start` only ever arises from trimming the
/// overestimated head of a variable-size reservation or from a reader
/// partially consuming a page out of an `AsyncPipe`.
#[derive(Debug)]
pub(crate) struct Page {
    pub(crate) data: Vec<u8>,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) kind: PageKind,
    /// Bytes at the front of this page still reserved for the tail
    /// fragment of a split fixed-size cursor. Zero once that fragment
    /// has been written, or if this page never held one. This is the
    /// non-negative stand-in for a signed `start` offset.
    pub(crate) split_reserved: usize,
}

impl Page {
    pub(crate) fn new(capacity: usize, kind: PageKind) -> Page {
        Page {
            data: vec![0u8; capacity],
            start: 0,
            end: 0,
            kind,
            split_reserved: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written but not yet consumed or trimmed away.
    pub(crate) fn live(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    pub(crate) fn live_len(&self) -> usize {
        self.end - self.start
    }

    /// Remaining writable capacity at the tail of this page.
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.end
    }

    pub(crate) fn writable_mut(&mut self) -> &mut [u8] {
        let end = self.end;
        &mut self.data[end..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_has_no_live_bytes() {
        let page = Page::new(16, PageKind::Plain);
        assert_eq!(page.live_len(), 0);
        assert_eq!(page.remaining(), 16);
    }

    #[test]
    fn advancing_end_grows_live_region() {
        let mut page = Page::new(8, PageKind::Plain);
        page.writable_mut()[..3].copy_from_slice(b"abc");
        page.end += 3;
        assert_eq!(page.live(), b"abc");
        assert_eq!(page.remaining(), 5);
    }

    #[test]
    fn trimmed_start_excludes_head_bytes() {
        let mut page = Page::new(8, PageKind::Plain);
        page.data.copy_from_slice(b"xxxxhell");
        page.end = 8;
        page.start = 4;
        assert_eq!(page.live(), b"hell");
    }
}
