//! Opaque cross-runtime handles

use std::fmt;

/// Integer naming an object across the runtime boundary.
///
/// Handles carry no meaning on their own; each side maps them to its
/// objects. `Handle::NULL` (0) means "no object" and is never issued.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The reserved "no object" handle
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw handle value received from the other side
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Raw integer value as sent over the boundary
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Handle {
    fn from(raw: u32) -> Self {
        Handle(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
