//! Strongly-typed layout primitives: staff-space lengths and time positions.
//!
//! Almost every engraving constant in this crate is expressed in staff
//! spaces (the gap between two adjacent staff lines); [`Sp`] keeps those
//! values distinct from already-scaled page units until the moment a
//! `spatium` is applied.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A length in staff spaces.
///
/// Converted to page units by multiplying with the score's spatium via
/// [`Sp::units`].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[repr(transparent)]
pub struct Sp(pub f64);

impl Sp {
    pub const ZERO: Sp = Sp(0.0);

    #[inline]
    pub const fn new(val: f64) -> Sp {
        Sp(val)
    }

    /// Scale into page units for the given spatium.
    #[inline]
    pub fn units(self, spatium: f64) -> f64 {
        self.0 * spatium
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl Add for Sp {
    type Output = Sp;
    fn add(self, rhs: Sp) -> Sp {
        Sp(self.0 + rhs.0)
    }
}

impl Sub for Sp {
    type Output = Sp;
    fn sub(self, rhs: Sp) -> Sp {
        Sp(self.0 - rhs.0)
    }
}

impl Mul<f64> for Sp {
    type Output = Sp;
    fn mul(self, rhs: f64) -> Sp {
        Sp(self.0 * rhs)
    }
}

impl Neg for Sp {
    type Output = Sp;
    fn neg(self) -> Sp {
        Sp(-self.0)
    }
}

impl fmt::Display for Sp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}sp", self.0)
    }
}

/// A musical time position in ticks.
///
/// The layout core never does duration arithmetic beyond ordering and
/// subtraction; ticks come pre-computed from the score model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Tick(pub i64);

impl Tick {
    /// Sentinel for a connector that is not attached to a score (palette
    /// previews, partially constructed documents).
    pub const NONE: Tick = Tick(-1);

    #[inline]
    pub const fn new(val: i64) -> Tick {
        Tick(val)
    }

    #[inline]
    pub fn is_unset(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Signed distance to another tick.
    #[inline]
    pub fn delta(self, earlier: Tick) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
