use super::ChasingStore;
use crate::{error::ChasingResult, types::Timestamp};
use rusqlite::{params, OptionalExtension};

impl ChasingStore {
    // ── Named locks ───────────────────────────────────────────────

    /// Take `name` for `owner` until `expires_at`. Succeeds when the lock is
    /// free or its previous holder's lease has expired.
    pub fn try_acquire_lock(
        &self,
        name: &str,
        owner: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> ChasingResult<bool> {
        self.transaction(|store| {
            store.conn.execute(
                "DELETE FROM chasing_lock WHERE name = ?1 AND expires_at <= ?2",
                params![name, now],
            )?;
            let inserted = store.conn.execute(
                "INSERT OR IGNORE INTO chasing_lock (name, owner, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, owner, now, expires_at],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Release `name` if `owner` still holds it. Returns whether a row was removed.
    pub fn release_lock(&self, name: &str, owner: &str) -> ChasingResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM chasing_lock WHERE name = ?1 AND owner = ?2",
            params![name, owner],
        )?;
        Ok(n == 1)
    }

    pub fn lock_owner(&self, name: &str) -> ChasingResult<Option<String>> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner FROM chasing_lock WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }
}
