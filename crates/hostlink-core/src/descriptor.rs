//! Interface descriptors and version tags
//!
//! A version tag is the three-digit suffix the service publishes for each
//! frozen method shape (`"009"`, `"019"`, ...). A full version string
//! glues the logical name and the tag together: `"User019"`.

use core::fmt;

/// A published interface version tag.
///
/// Always exactly three ASCII digits. Ordering is numeric.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(u16);

impl VersionTag {
    /// Parse a tag such as `"017"`.
    ///
    /// Returns `None` for anything that isn't exactly three digits.
    pub fn parse(tag: &str) -> Option<Self> {
        let bytes = tag.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        tag.parse().ok().map(VersionTag)
    }

    /// Build a tag from its numeric value. Values above 999 are rejected.
    pub const fn from_number(n: u16) -> Option<Self> {
        if n > 999 {
            None
        } else {
            Some(VersionTag(n))
        }
    }

    /// Unchecked constructor for the compiled-in catalog.
    pub(crate) const fn raw(n: u16) -> Self {
        VersionTag(n)
    }

    #[inline]
    pub const fn number(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionTag({:03})", self.0)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Identifies one frozen method-shape contract: `(name, version)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InterfaceDescriptor {
    pub name: &'static str,
    pub version: VersionTag,
}

impl InterfaceDescriptor {
    pub const fn new(name: &'static str, version: VersionTag) -> Self {
        Self { name, version }
    }

    /// The full version string, e.g. `"Friends015"`.
    pub fn version_string(&self) -> String {
        format!("{}{}", self.name, self.version)
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.version)
    }
}

/// Split a full version string into `(name, tag)`.
///
/// `"User019"` -> `("User", 019)`. The name part must be non-empty and
/// the string must end in exactly three digits.
pub fn split_version_string(s: &str) -> Option<(&str, VersionTag)> {
    if s.len() < 4 || !s.is_char_boundary(s.len() - 3) {
        return None;
    }
    let (name, tag) = s.split_at(s.len() - 3);
    if name.ends_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    VersionTag::parse(tag).map(|tag| (name, tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_parse() {
        assert_eq!(VersionTag::parse("019").map(VersionTag::number), Some(19));
        assert_eq!(VersionTag::parse("000").map(VersionTag::number), Some(0));
        assert!(VersionTag::parse("19").is_none());
        assert!(VersionTag::parse("0190").is_none());
        assert!(VersionTag::parse("0a9").is_none());
        assert!(VersionTag::parse("+19").is_none());
    }

    #[test]
    fn test_tag_order_and_display() {
        let old = VersionTag::parse("009").unwrap();
        let new = VersionTag::parse("019").unwrap();
        assert!(old < new);
        assert_eq!(old.to_string(), "009");
        assert!(VersionTag::from_number(1000).is_none());
    }

    #[test]
    fn test_split_version_string() {
        let (name, tag) = split_version_string("User019").unwrap();
        assert_eq!(name, "User");
        assert_eq!(tag.to_string(), "019");

        assert!(split_version_string("019").is_none());
        assert!(split_version_string("User").is_none());
        assert!(split_version_string("User0019").is_none());
    }

    #[test]
    fn test_descriptor_display() {
        let d = InterfaceDescriptor::new("Friends", VersionTag::parse("015").unwrap());
        assert_eq!(d.version_string(), "Friends015");
        assert_eq!(format!("{}", d), "Friends015");
    }
}
