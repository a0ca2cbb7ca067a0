//! Rolling checksum used to place content-defined chunk boundaries.
//!
//! This is the bup/rsync style sum: two running sums over a 64-byte sliding
//! window, each byte biased by a constant so that runs of zeros still move
//! the state. A boundary falls wherever the low `n` bits of the second sum
//! are all ones, which gives an average chunk size of `2^n` bytes.
//!
//! All arithmetic wraps at 32 bits.

/// Size of the sliding window. Must be a power of two.
pub const WINDOW_SIZE: usize = 64;

/// Bias added to every byte entering the window.
const CHAR_OFFSET: u32 = 31;

/// Rolling checksum state.
///
/// # Example
///
/// ```
/// use chunked_zstd::RollSum;
///
/// let mut rs = RollSum::new();
/// let mut splits = 0;
/// for i in 0u32..1_000_000 {
///     rs.roll((i.wrapping_mul(2654435761) >> 24) as u8);
///     if rs.on_split_with_bits(13) {
///         splits += 1;
///     }
/// }
/// assert!(splits > 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollSum {
    s1: u32,
    s2: u32,
    window: [u8; WINDOW_SIZE],
    wofs: usize,
}

impl RollSum {
    /// Creates a checksum over a window primed with zeros.
    pub fn new() -> Self {
        let window_size = WINDOW_SIZE as u32;
        Self {
            s1: window_size * CHAR_OFFSET,
            s2: window_size * (window_size - 1) * CHAR_OFFSET,
            window: [0; WINDOW_SIZE],
            wofs: 0,
        }
    }

    fn add(&mut self, drop: u32, add: u32) {
        let s1 = self.s1.wrapping_add(add).wrapping_sub(drop);
        self.s1 = s1;
        self.s2 = self.s2.wrapping_add(
            s1.wrapping_sub((WINDOW_SIZE as u32).wrapping_mul(drop.wrapping_add(CHAR_OFFSET))),
        );
    }

    /// Slides the window forward by one byte.
    pub fn roll(&mut self, ch: u8) {
        let dropped = self.window[self.wofs];
        self.add(u32::from(dropped), u32::from(ch));
        self.window[self.wofs] = ch;
        self.wofs = (self.wofs + 1) & (WINDOW_SIZE - 1);
    }

    /// Returns true when the low `bits` bits of the second sum are all ones.
    pub fn on_split_with_bits(&self, bits: u32) -> bool {
        let mask = (1u32 << bits) - 1;
        self.s2 & mask == mask
    }

    /// Returns the 32-bit digest of the current window.
    pub fn digest(&self) -> u32 {
        (self.s1 << 16) | (self.s2 & 0xffff)
    }
}

impl Default for RollSum {
    fn default() -> Self {
        Self::new()
    }
}
