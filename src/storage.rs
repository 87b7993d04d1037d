use sled::Db;
use tracing::debug;

use crate::error::StoreError;

/// Fixed key the bearer token lives under
pub const TOKEN_KEY: &str = "sweet_shop_token";

/// Durable token storage backed by an embedded Sled database.
///
/// The token survives process restarts (the CLI equivalent of a page reload).
/// This layer is storage only: it never looks inside the token and never
/// enforces expiry. Cloning is cheap and every clone sees the same tree, so one
/// store can be shared by the session context and the API gateway.
#[derive(Clone)]
pub struct TokenStore {
    db: Db,
    tree: sled::Tree,
}

impl TokenStore {
    /// Open or create the Sled database at the given path
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that is discarded on drop (tests, one-shot runs)
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let tree = db.open_tree("session")?;
        Ok(Self { db, tree })
    }

    pub fn get(&self) -> Result<Option<String>, StoreError> {
        match self.tree.get(TOKEN_KEY)? {
            Some(bytes) => {
                let token = String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::InvalidUtf8)?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, token: &str) -> Result<(), StoreError> {
        self.tree.insert(TOKEN_KEY, token.as_bytes())?;
        self.db.flush()?;
        debug!("Token stored ({} bytes)", token.len());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.tree.remove(TOKEN_KEY)?;
        self.db.flush()?;
        debug!("Token cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_set_get_clear() {
        let store = TokenStore::temporary().expect("temporary store");
        assert_eq!(store.get().unwrap(), None);

        store.set("abc.def.ghi").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("abc.def.ghi"));

        // Clones share the same tree
        let other = store.clone();
        other.set("second").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second"));

        store.clear().unwrap();
        assert_eq!(other.get().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_token_survives_reopen() {
        let temp_dir = std::env::temp_dir().join("sweet_shop_test_token_store");
        let _ = fs::remove_dir_all(&temp_dir);
        let path = temp_dir.to_str().unwrap();

        {
            let store = TokenStore::open(path).expect("Failed to open store");
            store.set("persisted").unwrap();
        }

        let reopened = TokenStore::open(path).expect("Failed to reopen store");
        assert_eq!(reopened.get().unwrap().as_deref(), Some("persisted"));

        drop(reopened);
        let _ = fs::remove_dir_all(temp_dir);
    }
}
