//! Opaque handles crossing the native/managed boundary
//!
//! A handle is a pointer-sized word. `0` is the null handle; every other
//! value packs a slot index and a slot generation:
//!
//! ```text
//! high half of the word: generation
//! low half of the word:  slot index + 1
//! ```
//!
//! Native code must treat handles as opaque. Only the bridge that issued a
//! handle can interpret it.

use std::fmt;

/// Number of bits holding `index + 1` in the low half of the word.
pub const INDEX_BITS: u32 = usize::BITS / 2;

const INDEX_MASK: usize = (1usize << INDEX_BITS) - 1;

/// Largest generation that still fits in the high half of the word.
pub const MAX_GENERATION: u32 = if usize::BITS >= 64 {
    u32::MAX
} else {
    ((1u64 << (usize::BITS - INDEX_BITS)) - 1) as u32
};

/// Largest slot index a handle can encode.
pub const MAX_INDEX: u32 = (INDEX_MASK - 1) as u32;

/// Opaque identifier for a type, member, or instance.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(usize);

impl Handle {
    /// The null handle. Returned for resolution misses.
    pub const NULL: Handle = Handle(0);

    /// Build a handle from a slot index and generation.
    ///
    /// Returns `None` when either part does not fit the encoding.
    #[inline]
    pub fn compose(index: u32, generation: u32) -> Option<Self> {
        if index > MAX_INDEX || generation > MAX_GENERATION {
            return None;
        }
        let low = index as usize + 1;
        let high = (generation as usize) << INDEX_BITS;
        Some(Handle(high | low))
    }

    /// Split a non-null handle into `(index, generation)`.
    #[inline]
    pub fn decompose(self) -> Option<(u32, u32)> {
        let low = self.0 & INDEX_MASK;
        if low == 0 {
            return None;
        }
        let generation = (self.0 >> INDEX_BITS) as u32;
        Some(((low - 1) as u32, generation))
    }

    /// Reinterpret a raw word received from native code
    #[inline(always)]
    pub const fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    /// Raw word to hand to native code
    #[inline(always)]
    pub const fn to_raw(self) -> usize {
        self.0
    }

    /// Check for the null handle
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decompose() {
            Some((index, generation)) => write!(f, "Handle({}v{})", index, generation),
            None if self.is_null() => write!(f, "Handle::NULL"),
            None => write!(f, "Handle(invalid {:#x})", self.0),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
