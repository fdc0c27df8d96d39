use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::cli::ConnectionArgs;
use crate::session::SessionStore;

pub mod ask;
pub mod auth;
pub mod contracts;
pub mod status;
pub mod upload;

pub(crate) fn connect(args: &ConnectionArgs) -> Result<(ApiClient, SessionStore)> {
    let client = ApiClient::new(&args.api_base_url, Duration::from_millis(args.timeout_ms))?;
    let store = SessionStore::new(&args.cache_root);
    Ok((client, store))
}

/// Drops the stored session when the server no longer accepts it.
pub(crate) fn guard_session<T>(store: &SessionStore, result: Result<T, ApiError>) -> Result<T> {
    match result {
        Err(ApiError::Unauthorized) => {
            if store.clear()? {
                warn!(path = %store.path().display(), "stored session rejected by server; cleared");
            }
            Err(ApiError::Unauthorized.into())
        }
        other => other.map_err(Into::into),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn guard_session_clears_rejected_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        store
            .save(&Session {
                username: "jane@example.com".to_string(),
                token: "stale".to_string(),
                token_type: "bearer".to_string(),
                issued_at: "2024-05-01T09:00:00Z".to_string(),
            })
            .expect("save");

        let err = guard_session::<()>(&store, Err(ApiError::Unauthorized)).expect_err("rejected");
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn guard_session_keeps_token_for_other_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        store
            .save(&Session {
                username: "jane@example.com".to_string(),
                token: "fresh".to_string(),
                token_type: "bearer".to_string(),
                issued_at: "2024-05-01T09:00:00Z".to_string(),
            })
            .expect("save");

        let result = guard_session::<()>(
            &store,
            Err(ApiError::Status {
                status: 500,
                detail: "boom".to_string(),
            }),
        );
        assert!(result.is_err());
        assert!(store.load().expect("load").is_some());
    }
}
