use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::write_json_private;

const SESSION_FILE: &str = "session.json";

/// Credentials attached to every protected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
    pub token_type: String,
    pub issued_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not signed in; run `contractwise login` first")]
pub struct NotSignedIn;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            path: cache_root.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let session: Session = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;

        if session.token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Loads the session or stops at the login boundary.
    pub fn require(&self) -> Result<Session> {
        match self.load()? {
            Some(session) => Ok(session),
            None => Err(NotSignedIn.into()),
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        write_json_private(&self.path, session)?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Returns whether a session file was present.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session {
            username: "jane@example.com".to_string(),
            token: "eyJhbGciOiJIUzI1NiJ9.payload.sig".to_string(),
            token_type: "bearer".to_string(),
            issued_at: "2024-05-01T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn save_load_and_clear_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(&dir.path().join("nested"));

        assert!(store.load().expect("load empty").is_none());
        store.save(&sample()).expect("save");
        assert_eq!(store.load().expect("load saved"), Some(sample()));

        assert!(store.clear().expect("clear"));
        assert!(!store.clear().expect("clear twice"));
        assert!(store.load().expect("load cleared").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only_even_when_it_existed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        fs::write(store.path(), b"{}").expect("seed file");
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).expect("widen");

        store.save(&sample()).expect("save");
        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().expect("load"), Some(sample()));
    }

    #[test]
    fn require_without_session_hits_login_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());

        let err = store.require().expect_err("no session stored");
        assert!(err.downcast_ref::<NotSignedIn>().is_some());
    }

    #[test]
    fn blank_token_counts_as_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        let mut session = sample();
        session.token = "  ".to_string();
        store.save(&session).expect("save");

        assert!(store.load().expect("load").is_none());
    }
}
