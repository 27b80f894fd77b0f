//! Pipe and user handle types
//!
//! Both are opaque 32-bit values handed out by the backing service.
//! Zero is reserved as the "no handle" sentinel, matching what the
//! service itself uses on the wire.

use core::fmt;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel value meaning "no handle"
            pub const NONE: $name = $name(0);

            #[inline]
            pub const fn new(raw: u32) -> Self {
                $name(raw)
            }

            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }

            #[inline]
            pub const fn is_some(self) -> bool {
                self.0 != 0
            }

            #[inline]
            pub const fn to_option(self) -> Option<$name> {
                if self.is_none() {
                    None
                } else {
                    Some(self)
                }
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(h: $name) -> Self {
                h.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, concat!($label, "(NONE)"))
                } else {
                    write!(f, concat!($label, "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, "none")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NONE
            }
        }
    };
}

opaque_handle!(
    /// One logical connection session to the backing service.
    ///
    /// Every interface resolved against a pipe dies with it.
    PipeHandle,
    "PipeHandle"
);

opaque_handle!(
    /// An authenticated principal within a pipe.
    UserHandle,
    "UserHandle"
);
