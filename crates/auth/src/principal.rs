use serde::Serialize;

use spacedock_core::{AccountId, InventoryError, InventoryResult, Owned};

/// Authenticated caller of a core operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub account: AccountId,
    pub privileged: bool,
}

impl Principal {
    pub fn player(account: AccountId) -> Self {
        Self {
            account,
            privileged: false,
        }
    }

    pub fn service(account: AccountId) -> Self {
        Self {
            account,
            privileged: true,
        }
    }

    /// Ownership policy: the caller must own the entity.
    pub fn ensure_owns(&self, entity: &impl Owned) -> InventoryResult<()> {
        if entity.is_owned_by(self.account) {
            Ok(())
        } else {
            Err(InventoryError::Unauthorized)
        }
    }

    /// Whether the caller may see the entity (owners, or any privileged caller).
    pub fn can_view(&self, entity: &impl Owned) -> bool {
        self.privileged || entity.is_owned_by(self.account)
    }

    /// Privileged callers may act on behalf of another account.
    pub fn acting_for(&self, account: AccountId) -> InventoryResult<Principal> {
        if !self.privileged {
            return Err(InventoryError::Unauthorized);
        }
        Ok(Principal::service(account))
    }
}
