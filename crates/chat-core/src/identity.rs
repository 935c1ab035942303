//! Session identity value objects.

use std::fmt;

use crate::{DomainError, DomainResult};

/// Character that prefixes a directed message (`@bob hello`).
///
/// Display names may never contain it, otherwise a name could not be
/// addressed unambiguously.
pub const ADDRESS_CHAR: char = '@';

// ============================================================================
// Slot Identifier
// ============================================================================

/// Index of a slot in the session registry.
///
/// Assigned when a connection is admitted and stable for the lifetime of
/// the session that occupies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the zero-based slot index.
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SlotId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

// ============================================================================
// Display Name
// ============================================================================

/// A validated chat display name.
///
/// Guarantees:
/// - surrounding whitespace is trimmed
/// - never empty
/// - never contains [`ADDRESS_CHAR`]
/// - a single word, so `@name` always reaches it
///
/// Names compare case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Validates a raw nickname line as typed by a client.
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptyName` if nothing is left after trimming
    /// - `DomainError::ReservedCharacter` if the name contains `@`
    /// - `DomainError::InnerWhitespace` if the name has more than one word
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let name = raw.trim();

        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }

        if name.contains(ADDRESS_CHAR) {
            return Err(DomainError::ReservedCharacter { ch: ADDRESS_CHAR });
        }

        if name.contains(char::is_whitespace) {
            return Err(DomainError::InnerWhitespace);
        }

        Ok(Self(name.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DisplayName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DisplayName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let name = DisplayName::parse("  alice \r").unwrap();
        assert_eq!(name.as_str(), "alice");
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(DisplayName::parse(""), Err(DomainError::EmptyName));
        assert_eq!(DisplayName::parse("   \t"), Err(DomainError::EmptyName));
    }

    #[test]
    fn test_parse_rejects_address_char() {
        for raw in ["@alice", "al@ice", "alice@", "@"] {
            assert_eq!(
                DisplayName::parse(raw),
                Err(DomainError::ReservedCharacter { ch: '@' }),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let lower = DisplayName::parse("bob").unwrap();
        let upper = DisplayName::parse("Bob").unwrap();
        assert_ne!(lower, upper);
        assert!(lower == "bob");
        assert!(upper != "bob");
    }

    #[test]
    fn test_parse_rejects_inner_whitespace() {
        for raw in ["big bird", "big\tbird", " big  bird "] {
            assert_eq!(
                DisplayName::parse(raw),
                Err(DomainError::InnerWhitespace),
                "{raw:?} should be rejected"
            );
        }
        assert_eq!(DisplayName::parse(" bigbird ").unwrap(), "bigbird");
    }

    #[test]
    fn test_slot_id() {
        let slot = SlotId::new(3);
        assert_eq!(slot.index(), 3);
        assert_eq!(slot.to_string(), "3");
        assert_eq!(SlotId::from(3), slot);
        assert!(SlotId::new(1) < SlotId::new(2));
    }
}
