//! Time limits on calls to external collaborators.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use spacedock_core::{InventoryError, InventoryResult};

/// Run `fut` under `limit`. Elapsed deadlines and collaborator errors both
/// surface as [`InventoryError::DependencyFailure`].
pub async fn within<T, E, F>(limit: Duration, what: &str, fut: F) -> InventoryResult<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(InventoryError::dependency(format!("{what}: {e}"))),
        Err(_) => Err(InventoryError::dependency(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
