use crate::error::{CoreError, Result};
use crate::secret::generate_secret;
use crate::storage::Storage;
use crate::types::{MatchRecord, MatchType, Participant};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

/// Result of the atomic check-then-append of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Appended; carries the participant count after the append.
    Joined(usize),
    AlreadyJoined,
    Full,
}

pub struct MatchStore<'a> {
    storage: &'a Storage,
}

impl<'a> MatchStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a match with a fresh id and secret and no participants.
    pub async fn create_match(&self, creator: &str, match_type: MatchType) -> Result<MatchRecord> {
        let conn = self.storage.get_connection().await;

        // Secrets are unique across stored matches; regenerate on the
        // rare collision before inserting. The secret never changes
        // once the row exists.
        let mut secret = generate_secret();
        for _ in 0..8 {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM matches WHERE secret = ?1)",
                params![secret],
                |row| row.get(0),
            )?;
            if !taken {
                break;
            }
            secret = generate_secret();
        }

        let record = MatchRecord {
            id: Uuid::new_v4().to_string(),
            match_type,
            secret,
            creator: creator.to_string(),
            created_at: Utc::now(),
            participants: Vec::new(),
        };

        conn.execute(
            "INSERT INTO matches (id, match_type, secret, creator, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.match_type.as_str(),
                record.secret,
                record.creator,
                record.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| CoreError::creation_failed(e.to_string()))?;

        tracing::info!(
            "Created {} match {} for host {}",
            record.match_type,
            record.id,
            record.creator
        );
        Ok(record)
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        let conn = self.storage.get_connection().await;

        let row = conn
            .query_row(
                "SELECT id, match_type, secret, creator, created_at
                 FROM matches WHERE id = ?1",
                params![match_id],
                map_match_row,
            )
            .optional()?;

        let mut record = match row {
            Some(record) => record,
            None => return Ok(None),
        };
        record.participants = load_participants(&conn, match_id)?;
        Ok(Some(record))
    }

    pub async fn list_participants(&self, match_id: &str) -> Result<Vec<Participant>> {
        let conn = self.storage.get_connection().await;
        load_participants(&conn, match_id)
    }

    /// Cheap read for the quorum poller.
    pub async fn participant_count(&self, match_id: &str) -> Result<usize> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM participants WHERE match_id = ?1",
            params![match_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Append `user_id` to the match's participants unless they are
    /// already present or the match has reached its target. Membership
    /// check, capacity check, and insert run inside one transaction so
    /// two concurrent joiners can never both be accepted past target.
    pub async fn append_participant_if_room(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<AppendOutcome> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let match_type: Option<String> = tx
            .query_row(
                "SELECT match_type FROM matches WHERE id = ?1",
                params![match_id],
                |row| row.get(0),
            )
            .optional()?;
        let match_type = match match_type {
            Some(t) => t
                .parse::<MatchType>()
                .map_err(CoreError::internal)?,
            None => return Err(CoreError::match_not_found(match_id)),
        };

        let already: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM participants WHERE match_id = ?1 AND user_id = ?2)",
            params![match_id, user_id],
            |row| row.get(0),
        )?;
        if already {
            return Ok(AppendOutcome::AlreadyJoined);
        }

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM participants WHERE match_id = ?1",
            params![match_id],
            |row| row.get(0),
        )?;
        if count as usize >= match_type.target_participants() {
            return Ok(AppendOutcome::Full);
        }

        tx.execute(
            "INSERT INTO participants (match_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![match_id, user_id, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;

        Ok(AppendOutcome::Joined(count as usize + 1))
    }

    pub async fn list_matches(&self) -> Result<Vec<MatchRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, match_type, secret, creator, created_at
             FROM matches ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], map_match_row)?;

        let mut matches = Vec::new();
        for row in rows {
            let mut record = row?;
            record.participants = load_participants(&conn, &record.id)?;
            matches.push(record);
        }

        Ok(matches)
    }
}

fn map_match_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRecord> {
    // A row that no longer parses is corruption, not a default; a
    // corrupted Doubles row must not quietly report a Singles target
    let match_type_str: String = row.get(1)?;
    let match_type = match_type_str.parse::<MatchType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(MatchRecord {
        id: row.get(0)?,
        match_type,
        secret: row.get(2)?,
        creator: row.get(3)?,
        created_at: timestamp_from_millis(row.get(4)?, 4)?,
        participants: Vec::new(),
    })
}

fn timestamp_from_millis(
    millis: i64,
    column: usize,
) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {}", millis).into(),
        )
    })
}

fn load_participants(conn: &rusqlite::Connection, match_id: &str) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, joined_at FROM participants
         WHERE match_id = ?1 ORDER BY joined_at, rowid",
    )?;

    let rows = stmt.query_map(params![match_id], |row| {
        Ok(Participant {
            user_id: row.get(0)?,
            joined_at: timestamp_from_millis(row.get(1)?, 1)?,
        })
    })?;

    let mut participants = Vec::new();
    for participant in rows {
        participants.push(participant?);
    }

    Ok(participants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> Storage {
        Storage::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_match() {
        let storage = open_store().await;
        let store = MatchStore::new(&storage);

        let created = store.create_match("host", MatchType::Doubles).await.unwrap();
        assert_eq!(created.participants.len(), 0);
        assert_eq!(created.secret.len(), crate::secret::SECRET_LEN);

        let loaded = store.get_match(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.match_type, MatchType::Doubles);
        assert_eq!(loaded.secret, created.secret);
        assert_eq!(loaded.creator, "host");
    }

    #[tokio::test]
    async fn test_get_match_missing() {
        let storage = open_store().await;
        let store = MatchStore::new(&storage);
        assert!(store.get_match("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_respects_uniqueness_and_capacity() {
        let storage = open_store().await;
        let store = MatchStore::new(&storage);
        let m = store.create_match("host", MatchType::Singles).await.unwrap();

        assert_eq!(
            store.append_participant_if_room(&m.id, "a").await.unwrap(),
            AppendOutcome::Joined(1)
        );
        assert_eq!(
            store.append_participant_if_room(&m.id, "a").await.unwrap(),
            AppendOutcome::AlreadyJoined
        );
        assert_eq!(
            store.append_participant_if_room(&m.id, "b").await.unwrap(),
            AppendOutcome::Joined(2)
        );
        // Singles target is 2; a third distinct identity is rejected
        assert_eq!(
            store.append_participant_if_room(&m.id, "c").await.unwrap(),
            AppendOutcome::Full
        );
        assert_eq!(store.participant_count(&m.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_to_unknown_match() {
        let storage = open_store().await;
        let store = MatchStore::new(&storage);
        let err = store
            .append_participant_if_room("missing", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MatchNotFound(_)));
    }

    #[tokio::test]
    async fn test_participants_ordered_by_join_time() {
        let storage = open_store().await;
        let store = MatchStore::new(&storage);
        let m = store.create_match("host", MatchType::Doubles).await.unwrap();

        for user in ["p1", "p2", "p3"] {
            store.append_participant_if_room(&m.id, user).await.unwrap();
        }

        let participants = store.list_participants(&m.id).await.unwrap();
        let ids: Vec<&str> = participants.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_corrupted_rows_fail_loudly() {
        let storage = open_store().await;
        {
            let conn = storage.get_connection().await;
            conn.execute(
                "INSERT INTO matches (id, match_type, secret, creator, created_at)
                 VALUES ('bad-type', 'triples', 'ABCDEF', 'host', 0)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO matches (id, match_type, secret, creator, created_at)
                 VALUES ('bad-time', 'doubles', 'GHJKLM', 'host', ?1)",
                params![i64::MAX],
            )
            .unwrap();
        }

        let store = MatchStore::new(&storage);
        for id in ["bad-type", "bad-time"] {
            let err = store.get_match(id).await.unwrap_err();
            assert!(matches!(err, CoreError::Storage(_)), "row {} did not fail", id);
        }
    }

    #[tokio::test]
    async fn test_on_disk_storage_round_trip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rallytag.db");

        let created_id = {
            let storage = Storage::new(&db_path).await.unwrap();
            let store = MatchStore::new(&storage);
            let m = store.create_match("host", MatchType::Singles).await.unwrap();
            store.append_participant_if_room(&m.id, "a").await.unwrap();
            m.id
        };

        let storage = Storage::new(&db_path).await.unwrap();
        let store = MatchStore::new(&storage);
        let loaded = store.get_match(&created_id).await.unwrap().unwrap();
        assert_eq!(loaded.participants.len(), 1);
    }
}
