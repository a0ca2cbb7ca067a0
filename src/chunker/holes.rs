//! Sparse hole detection.
//!
//! [`HoleFinder`] turns a byte stream into a sequence of literal bytes and
//! zero runs. Runs of at least `threshold` zeros are reported once, as a
//! length; shorter runs are replayed byte by byte so they stay ordinary data.

use std::io::{self, Read};

use crate::buffer::ByteReader;

/// One step of hole detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleEvent {
    /// A single literal byte (possibly a zero from a run below threshold).
    Byte(u8),
    /// A run of this many zero bytes, always at least the threshold.
    Hole(u64),
    /// The underlying stream is exhausted.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Passing bytes through, replaying pending zeros first.
    Reading,
    /// Counting zeros, threshold not reached yet.
    Accumulating,
    /// Threshold reached, swallowing the rest of the run.
    Found,
    /// Source exhausted, replaying pending zeros.
    AtEnd,
}

/// Hole detector over a byte source.
pub struct HoleFinder<R> {
    reader: ByteReader<R>,
    zeros: u64,
    threshold: u64,
    state: State,
}

impl<R: Read> HoleFinder<R> {
    /// Creates a hole finder reporting zero runs of at least `threshold` bytes.
    ///
    /// A threshold of 0 is treated as 1.
    pub fn new(reader: R, threshold: u64) -> Self {
        Self {
            reader: ByteReader::new(reader),
            zeros: 0,
            threshold: threshold.max(1),
            state: State::Reading,
        }
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Advances the state machine until it has something to report.
    pub fn next_event(&mut self) -> io::Result<HoleEvent> {
        loop {
            match self.state {
                State::Reading => {
                    if self.zeros > 0 {
                        self.zeros -= 1;
                        return Ok(HoleEvent::Byte(0));
                    }
                    match self.reader.read_byte()? {
                        None => return Ok(HoleEvent::End),
                        Some(b) if b != 0 => return Ok(HoleEvent::Byte(b)),
                        Some(_) => {
                            self.zeros = 1;
                            self.state = if self.zeros == self.threshold {
                                State::Found
                            } else {
                                State::Accumulating
                            };
                        }
                    }
                }
                State::Accumulating => match self.reader.read_byte()? {
                    None => self.state = State::AtEnd,
                    Some(0) => {
                        self.zeros += 1;
                        if self.zeros == self.threshold {
                            self.state = State::Found;
                        }
                    }
                    Some(_) => {
                        self.reader.unread_byte();
                        self.state = State::Reading;
                    }
                },
                State::Found => match self.reader.read_byte()? {
                    None => {
                        self.state = State::AtEnd;
                        return Ok(HoleEvent::Hole(std::mem::take(&mut self.zeros)));
                    }
                    Some(0) => self.zeros += 1,
                    Some(_) => {
                        self.reader.unread_byte();
                        self.state = State::Reading;
                        return Ok(HoleEvent::Hole(std::mem::take(&mut self.zeros)));
                    }
                },
                State::AtEnd => {
                    if self.zeros > 0 {
                        self.zeros -= 1;
                        return Ok(HoleEvent::Byte(0));
                    }
                    return Ok(HoleEvent::End);
                }
            }
        }
    }
}
