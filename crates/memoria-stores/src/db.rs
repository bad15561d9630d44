use rusqlite::{Connection, Result};

/// Initialise every table backing C3–C6. Safe to call on every startup
/// (idempotent) — mirrors the reference stack's `init_db` convention of one
/// function per logical table group.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_vector_table(conn)?;
    create_episodic_table(conn)?;
    create_emotional_table(conn)?;
    create_procedural_tables(conn)?;
    create_portfolio_tables(conn)?;
    create_profile_tables(conn)?;
    create_scheduled_intents_tables(conn)?;
    create_hook_consents_table(conn)?;
    create_hook_events_table(conn)?;
    create_cache_tables(conn)?;
    Ok(())
}

/// C3 — the vector store. `embedding` is stored as a little-endian f32 blob;
/// there is no ANN index (no vector-database dependency in this stack), so
/// `vector.rs` does a brute-force cosine scan filtered by the indexed
/// columns below. FTS5 backs the text side of hybrid lookups.
fn create_vector_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            content          TEXT NOT NULL,
            layer            TEXT NOT NULL,
            type             TEXT NOT NULL,
            importance       REAL NOT NULL DEFAULT 0.8,
            confidence       REAL NOT NULL DEFAULT 0.9,
            relevance_score  REAL NOT NULL,
            usage_count      INTEGER NOT NULL DEFAULT 0,
            persona_tags     TEXT NOT NULL DEFAULT '[]',
            embedding        BLOB NOT NULL,
            timestamp        TEXT NOT NULL,
            metadata         TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
        CREATE INDEX IF NOT EXISTS idx_memories_user_layer ON memories(user_id, layer);
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts
            USING fts5(content, content='memories', content_rowid='rowid');",
    )
}

/// C4 — episodic rows, time-partitioned by `event_timestamp`.
fn create_episodic_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS episodic_rows (
            id                  TEXT NOT NULL,
            user_id             TEXT NOT NULL,
            event_timestamp     TEXT NOT NULL,
            event_type          TEXT,
            content             TEXT NOT NULL,
            location            TEXT,
            participants        TEXT NOT NULL DEFAULT '[]',
            emotional_valence   REAL,
            emotional_arousal   REAL,
            importance_score    REAL NOT NULL DEFAULT 0.5,
            tags                TEXT NOT NULL DEFAULT '[]',
            metadata            TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (id, event_timestamp)
        );
        CREATE INDEX IF NOT EXISTS idx_episodic_user_time
            ON episodic_rows(user_id, event_timestamp);",
    )
}

/// C4 — emotional rows, time-partitioned by `timestamp`.
fn create_emotional_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS emotional_rows (
            id                TEXT NOT NULL,
            user_id           TEXT NOT NULL,
            timestamp         TEXT NOT NULL,
            emotional_state   TEXT NOT NULL,
            valence           REAL NOT NULL,
            arousal           REAL NOT NULL,
            dominance         REAL NOT NULL,
            context           TEXT,
            trigger_event     TEXT,
            intensity         REAL NOT NULL,
            duration_minutes  REAL,
            PRIMARY KEY (id, timestamp)
        );
        CREATE INDEX IF NOT EXISTS idx_emotional_user_time
            ON emotional_rows(user_id, timestamp);",
    )
}

/// C5 — procedural skills, keyed by `id`.
fn create_procedural_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS procedural_rows (
            id                 TEXT PRIMARY KEY,
            user_id            TEXT NOT NULL,
            skill_name         TEXT NOT NULL,
            proficiency_level  TEXT NOT NULL DEFAULT 'beginner',
            prerequisites      TEXT NOT NULL DEFAULT '[]',
            practice_count     INTEGER NOT NULL DEFAULT 0,
            success_rate       REAL NOT NULL DEFAULT 0,
            last_practiced     TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_procedural_user ON procedural_rows(user_id);

        CREATE TABLE IF NOT EXISTS skill_progressions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            skill_id         TEXT NOT NULL,
            from_level       TEXT NOT NULL,
            to_level         TEXT NOT NULL,
            transitioned_at  TEXT NOT NULL
        );",
    )
}

/// C5 — portfolio holdings/transactions/preferences, plus time-partitioned
/// snapshots (C4).
fn create_portfolio_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS portfolio_holdings (
            user_id      TEXT NOT NULL,
            ticker       TEXT NOT NULL,
            shares       REAL NOT NULL,
            avg_price    REAL NOT NULL,
            asset_name   TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL,
            PRIMARY KEY (user_id, ticker)
        );

        CREATE TABLE IF NOT EXISTS portfolio_transactions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT NOT NULL,
            ticker        TEXT NOT NULL,
            action        TEXT NOT NULL,
            shares        REAL NOT NULL,
            price         REAL NOT NULL,
            executed_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_portfolio_tx_user
            ON portfolio_transactions(user_id, executed_at);

        CREATE TABLE IF NOT EXISTS portfolio_snapshots (
            user_id             TEXT NOT NULL,
            snapshot_timestamp  TEXT NOT NULL,
            total_value         REAL NOT NULL,
            holdings            TEXT NOT NULL,
            PRIMARY KEY (user_id, snapshot_timestamp)
        );

        CREATE TABLE IF NOT EXISTS portfolio_preferences (
            user_id     TEXT NOT NULL,
            pref_key    TEXT NOT NULL,
            pref_value  TEXT NOT NULL,
            PRIMARY KEY (user_id, pref_key)
        );",
    )
}

/// C5 — the four user-profile tables (§3).
fn create_profile_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            user_id            TEXT PRIMARY KEY,
            completeness_pct   REAL NOT NULL DEFAULT 0,
            total_fields       INTEGER NOT NULL,
            populated_fields   INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            last_updated       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profile_fields (
            user_id      TEXT NOT NULL,
            category     TEXT NOT NULL,
            field_name   TEXT NOT NULL,
            field_value  TEXT NOT NULL,
            value_type   TEXT NOT NULL DEFAULT 'string',
            PRIMARY KEY (user_id, category, field_name)
        );

        CREATE TABLE IF NOT EXISTS profile_confidence_scores (
            user_id              TEXT NOT NULL,
            category             TEXT NOT NULL,
            field_name           TEXT NOT NULL,
            overall_confidence   REAL NOT NULL DEFAULT 0,
            frequency            REAL NOT NULL DEFAULT 0,
            recency              REAL NOT NULL DEFAULT 0,
            explicitness         REAL NOT NULL DEFAULT 0,
            source_diversity     REAL NOT NULL DEFAULT 0,
            mention_count        INTEGER NOT NULL DEFAULT 0,
            last_mentioned       TEXT NOT NULL,
            PRIMARY KEY (user_id, category, field_name)
        );

        CREATE TABLE IF NOT EXISTS profile_sources (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id            TEXT NOT NULL,
            category           TEXT NOT NULL,
            field_name         TEXT NOT NULL,
            source_memory_id   TEXT,
            source_type        TEXT NOT NULL,
            extracted_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profile_sources_field
            ON profile_sources(user_id, category, field_name);",
    )
}

/// C5 — scheduled intents and their execution log (owned operationally by
/// the intents engine, C12).
fn create_scheduled_intents_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scheduled_intents (
            id                     TEXT PRIMARY KEY,
            user_id                TEXT NOT NULL,
            trigger_kind           TEXT NOT NULL,
            trigger_config         TEXT NOT NULL,
            action                 TEXT NOT NULL,
            enabled                INTEGER NOT NULL DEFAULT 1,
            next_check             TEXT,
            claimed_at             TEXT,
            last_checked           TEXT,
            last_executed          TEXT,
            last_condition_fire    TEXT,
            execution_count        INTEGER NOT NULL DEFAULT 0,
            max_executions         INTEGER,
            expires_at             TEXT,
            created_at             TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_intents_user ON scheduled_intents(user_id);
        CREATE INDEX IF NOT EXISTS idx_intents_pending
            ON scheduled_intents(enabled, next_check);

        CREATE TABLE IF NOT EXISTS intent_executions (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            intent_id      TEXT NOT NULL,
            started_at     TEXT NOT NULL,
            finished_at    TEXT NOT NULL,
            result         TEXT NOT NULL,
            gate_result    TEXT,
            detail         TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_executions_intent
            ON intent_executions(intent_id, started_at);",
    )
}

/// C5 — hook consents (C13).
fn create_hook_consents_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hook_consents (
            user_id      TEXT NOT NULL,
            hook_kind    TEXT NOT NULL,
            granted      INTEGER NOT NULL DEFAULT 0,
            granted_at   TEXT NOT NULL,
            PRIMARY KEY (user_id, hook_kind)
        );",
    )
}

/// C5 — dedup ledger for hook ingress (C13): one row per source-message-id
/// ever accepted, so a redelivered webhook or a re-polled item is dropped
/// before it ever reaches C8.
fn create_hook_events_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hook_events_seen (
            user_id            TEXT NOT NULL,
            hook_kind          TEXT NOT NULL,
            source_message_id  TEXT NOT NULL,
            seen_at            TEXT NOT NULL,
            PRIMARY KEY (user_id, hook_kind, source_message_id)
        );",
    )
}

/// C6 — cache-ish tables backing the keyspace in §6: `profile:{user_id}:v{ns}`,
/// `mem:ns:{user_id}`, `recent_users:{YYYYMMDD}`, `memory:short-term:*`.
/// Implemented as SQLite tables rather than an external cache server (no
/// such dependency exists in this stack) with TTL enforced at read time.
fn create_cache_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cache_namespaces (
            user_id   TEXT PRIMARY KEY,
            ns        INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS recent_users (
            day        TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            PRIMARY KEY (day, user_id)
        );

        CREATE TABLE IF NOT EXISTS short_term_memory (
            key         TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            memory_id   TEXT NOT NULL,
            value       TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_short_term_user ON short_term_memory(user_id);",
    )
}
