//! Process-wide session key handed to clients that take a hook.
//!
//! The key is advisory. It lets a client prove it is the one that armed a
//! hook, but a mismatch on `release` is only reported, never enforced.

use core::fmt;

/// Opaque, non-zero session token.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionKey(u32);

impl SessionKey {
    /// Scrambles `seed` into a key.
    pub const fn from_seed(seed: u32) -> Self {
        // xorshift32 has no fixed point other than zero
        let mut state = if seed == 0 { 0x9E37_79B9 } else { seed };
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Self(state)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Compares a textual key as supplied on the wire.
    pub fn matches(self, text: &str) -> bool {
        text.parse::<u32>().is_ok_and(|value| value == self.0)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
