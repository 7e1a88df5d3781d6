use spacedock_auth::Principal;

/// Caller context for a request (the resolved bearer credential).
///
/// Inserted by the auth middleware; present for all protected routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }
}
