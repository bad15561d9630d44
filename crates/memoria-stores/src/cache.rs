use chrono::Duration;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

const PROFILE_CACHE_TTL_SECS: i64 = 300;

/// C6 — hot profiles, short-term memory layer, per-user activity set, and
/// namespace counters, following the cache keyspace in §6. There is no
/// external cache server in this stack; these tables live in the same
/// SQLite file and enforce TTL at read time, the same way the vector store
/// stands in for an external vector database.
pub fn namespace(conn: &Connection, user_id: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT ns FROM cache_namespaces WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
    .map(|v| v.unwrap_or(0))
    .map_err(StoreError::from)
}

/// `INCR mem:ns:{user_id}` (§4.5 invalidation protocol) — old cache entries
/// are left to expire naturally rather than deleted eagerly.
pub fn bump_namespace(conn: &Connection, user_id: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO cache_namespaces (user_id, ns) VALUES (?1, 1)
         ON CONFLICT(user_id) DO UPDATE SET ns = ns + 1",
        params![user_id],
    )?;
    namespace(conn, user_id)
}

fn profile_key(user_id: &str, ns: i64) -> String {
    format!("profile:{user_id}:v{ns}")
}

pub fn cache_profile(
    conn: &Connection,
    user_id: &str,
    ns: i64,
    profile_json: &serde_json::Value,
) -> Result<(), StoreError> {
    let expires_at = (chrono::Utc::now() + Duration::seconds(PROFILE_CACHE_TTL_SECS)).to_rfc3339();
    conn.execute(
        "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        params![profile_key(user_id, ns), profile_json.to_string(), expires_at],
    )?;
    Ok(())
}

pub fn get_cached_profile(
    conn: &Connection,
    user_id: &str,
    ns: i64,
) -> Result<Option<serde_json::Value>, StoreError> {
    let now = memoria_core::now_iso();
    let row: Option<String> = conn
        .query_row(
            "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
            params![profile_key(user_id, ns), now],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.and_then(|s| serde_json::from_str(&s).ok()))
}

/// `recent_users:{YYYYMMDD}` activity set (§4.8 compaction targeting).
pub fn mark_active_today(conn: &Connection, day: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO recent_users (day, user_id) VALUES (?1, ?2)",
        params![day, user_id],
    )?;
    Ok(())
}

pub fn recent_users(conn: &Connection, day: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT user_id FROM recent_users WHERE day = ?1")?;
    let rows = stmt.query_map(params![day], |row| row.get(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// `memory:short-term:{user_id}:{mem_id}` TTL 3600 s.
pub fn set_short_term(
    conn: &Connection,
    user_id: &str,
    mem_id: &str,
    value: &serde_json::Value,
    ttl_secs: i64,
) -> Result<(), StoreError> {
    let key = format!("memory:short-term:{user_id}:{mem_id}");
    let expires_at = (chrono::Utc::now() + Duration::seconds(ttl_secs)).to_rfc3339();
    conn.execute(
        "INSERT INTO short_term_memory (key, user_id, memory_id, value, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        params![key, user_id, mem_id, value.to_string(), expires_at],
    )?;
    Ok(())
}

pub fn list_short_term(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, StoreError> {
    let now = memoria_core::now_iso();
    let mut stmt = conn.prepare(
        "SELECT value FROM short_term_memory WHERE user_id = ?1 AND expires_at > ?2",
    )?;
    let rows = stmt.query_map(params![user_id, now], |row| row.get::<_, String>(0))?;
    Ok(rows
        .filter_map(|r| r.ok())
        .filter_map(|s| serde_json::from_str(&s).ok())
        .collect())
}

pub fn evict_expired(conn: &Connection) -> Result<usize, StoreError> {
    let now = memoria_core::now_iso();
    let a = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
    let b = conn.execute(
        "DELETE FROM short_term_memory WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn bump_namespace_invalidates_old_profile_key() {
        let conn = test_conn();
        let ns0 = namespace(&conn, "u1").unwrap();
        cache_profile(&conn, "u1", ns0, &serde_json::json!({"a": 1})).unwrap();
        assert!(get_cached_profile(&conn, "u1", ns0).unwrap().is_some());

        let ns1 = bump_namespace(&conn, "u1").unwrap();
        assert_ne!(ns0, ns1);
        assert!(get_cached_profile(&conn, "u1", ns1).unwrap().is_none());
        assert!(get_cached_profile(&conn, "u1", ns0).unwrap().is_some());
    }

    #[test]
    fn short_term_respects_ttl() {
        let conn = test_conn();
        set_short_term(&conn, "u1", "mem_1", &serde_json::json!({"content": "x"}), -1).unwrap();
        assert!(list_short_term(&conn, "u1").unwrap().is_empty());
    }
}
