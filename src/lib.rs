//! A paged output stream with in-place delayed writes.
//!
//! An [`OutputStream`] hands out forward reservations — [`WriteCursor`] for
//! a fixed number of bytes, [`VarWriteCursor`] for an upper bound on a
//! number of bytes decided later — that the caller fills in once the value
//! they describe is actually known, without losing its place in the
//! stream. Completed pages drain into a pluggable [`Sink`]: in-memory (no
//! sink at all), a plain file, or the writer side of an [`AsyncPipe`].
//!
//! # Writing a stream
//!
//! Create a stream with one of [`OutputStream::new_in_memory`],
//! [`OutputStream::new_file`], [`OutputStream::new_unsafe_memory`], or
//! [`AsyncPipe::new`], then write to it with [`OutputStream::write`] (or
//! the async [`OutputStream::write_async`] for a pipe-backed stream).
//!
//! To reserve space for a value whose size isn't known until later, call
//! [`OutputStream::reserve_fixed`] (exact size) or
//! [`OutputStream::reserve_var`] (upper bound), write through ordinarily,
//! then finalize the cursor with [`OutputStream::finalize_fixed`] /
//! [`OutputStream::finalize_var`] once the real bytes are ready.
//!
//! [`Handle`] wraps an `OutputStream` and guarantees its sink is closed
//! exactly once, whether the caller closes it explicitly or drops the
//! handle without doing so.
#![deny(warnings)]

mod cursor;
mod error;
mod handle;
mod page;
mod page_buffers;
mod pipe;
mod sink;
mod stream;

pub use crate::cursor::{VarWriteCursor, WriteCursor};
pub use crate::error::{Error, Result};
pub use crate::handle::{CloseBehavior, Handle};
pub use crate::pipe::{AsyncPipe, PipeReader};
pub use crate::stream::{OutputStream, Pod, DEFAULT_MAX_BUFFERED_BYTES, DEFAULT_PAGE_SIZE};
