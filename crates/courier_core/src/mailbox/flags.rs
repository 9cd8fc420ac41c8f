//! Acknowledgement flags a producer can request when posting.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of acknowledgements requested for a posted message.
///
/// `post_message` returns only once every requested acknowledgement has
/// happened.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AckFlags(u8);

impl AckFlags {
    /// Fire-and-forget.
    pub const NONE: Self = Self(0);
    /// Wait until the consumer has dequeued the message.
    pub const RECEIVED: Self = Self(0b01);
    /// Wait until the consumer's handler has returned for the message.
    pub const PROCESSED: Self = Self(0b10);
    /// Both acknowledgements.
    pub const ALL: Self = Self(Self::RECEIVED.0 | Self::PROCESSED.0);

    /// Returns whether every flag in `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether no flag is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub(crate) const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub(crate) const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }
}

impl BitOr for AckFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AckFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AckFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::RECEIVED), self.contains(Self::PROCESSED)) {
            (false, false) => f.write_str("none"),
            (true, false) => f.write_str("received"),
            (false, true) => f.write_str("processed"),
            (true, true) => f.write_str("received|processed"),
        }
    }
}

impl fmt::Debug for AckFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckFlags({self})")
    }
}
