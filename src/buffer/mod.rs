//! Internal buffer management.
//!
//! This module provides a thread-local buffer pool and the byte-at-a-time
//! reader the hole finder is built on. It is an implementation detail and
//! not part of the public API.

mod pool;
mod reader;

pub(crate) use pool::Buffer;
pub(crate) use reader::ByteReader;
