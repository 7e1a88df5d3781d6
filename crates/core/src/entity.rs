//! Entity traits: identity and ownership of stored documents.

use crate::id::AccountId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// An entity that belongs to exactly one account.
pub trait Owned {
    fn account(&self) -> AccountId;

    fn is_owned_by(&self, account: AccountId) -> bool {
        self.account() == account
    }
}
