use rusqlite::params;
use uuid::Uuid;

use crate::credential::parse_rfc3339;
use crate::database::Database;
use crate::error::Result;
use crate::metrics::collect_rows;
use crate::models::ChatRow;

impl Database {
    pub fn insert_chat_message(&self, message: &ChatRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chat_messages (id, session_id, timestamp, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                message.id.to_string(),
                message.session_id,
                message.timestamp.to_rfc3339(),
                message.payload,
            ],
        )?;
        Ok(())
    }

    /// All messages of one session in send order (timestamp ascending).
    pub fn chat_messages_for_session(&self, session_id: &str) -> Result<Vec<ChatRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, session_id, timestamp, payload FROM chat_messages
             WHERE session_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_chat)?;
        collect_rows(rows)
    }

    /// Messages belonging to sessions created at or after the given
    /// boundary.
    ///
    /// Session ids are lexicographically sortable and start with their
    /// creation timestamp, so "session created >= boundary" is a plain
    /// string comparison against a prefix built from the boundary time.
    pub fn chat_messages_in_sessions_since(&self, session_prefix: &str) -> Result<Vec<ChatRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, session_id, timestamp, payload FROM chat_messages
             WHERE session_id >= ?1 ORDER BY session_id ASC, timestamp ASC",
        )?;
        let rows = stmt.query_map(params![session_prefix], row_to_chat)?;
        collect_rows(rows)
    }

    /// Distinct session ids, most recently created first.
    pub fn recent_session_ids(&self, limit: u32) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT session_id FROM chat_messages
             ORDER BY session_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
        collect_rows(rows)
    }

    pub fn all_chat_messages(&self) -> Result<Vec<ChatRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, session_id, timestamp, payload FROM chat_messages
             ORDER BY session_id ASC, timestamp ASC",
        )?;
        let rows = stmt.query_map([], row_to_chat)?;
        collect_rows(rows)
    }

    pub fn delete_chat_message(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM chat_messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    let id_str: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let ts_str: String = row.get(2)?;
    let payload: Vec<u8> = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ChatRow {
        id,
        session_id,
        timestamp: parse_rfc3339(&ts_str, 2)?,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(session_id: &str, offset_secs: i64) -> ChatRow {
        ChatRow {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            payload: b"msg".to_vec(),
        }
    }

    #[test]
    fn session_messages_in_send_order() {
        let db = Database::open_in_memory().unwrap();
        let second = message("s20260806T100000-aa", 10);
        let first = message("s20260806T100000-aa", 0);
        db.insert_chat_message(&second).unwrap();
        db.insert_chat_message(&first).unwrap();

        let messages = db.chat_messages_for_session("s20260806T100000-aa").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, first.id);
        assert_eq!(messages[1].id, second.id);
    }

    #[test]
    fn session_prefix_window() {
        let db = Database::open_in_memory().unwrap();
        db.insert_chat_message(&message("s20260801T090000-aa", 0)).unwrap();
        db.insert_chat_message(&message("s20260805T090000-bb", 0)).unwrap();
        db.insert_chat_message(&message("s20260806T090000-cc", 0)).unwrap();

        let windowed = db.chat_messages_in_sessions_since("s20260805T000000").unwrap();
        assert_eq!(windowed.len(), 2);
        assert!(windowed.iter().all(|m| m.session_id >= "s20260805T000000".to_string()));
    }

    #[test]
    fn recent_sessions_distinct_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for session in ["s20260801T090000-aa", "s20260805T090000-bb"] {
            db.insert_chat_message(&message(session, 0)).unwrap();
            db.insert_chat_message(&message(session, 5)).unwrap();
        }

        let sessions = db.recent_session_ids(5).unwrap();
        assert_eq!(
            sessions,
            vec![
                "s20260805T090000-bb".to_string(),
                "s20260801T090000-aa".to_string()
            ]
        );
    }
}
