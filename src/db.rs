// ==========================================
// 报表数据导入平台 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表入口（溯源表 + 事实表）
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等，可重复执行）
///
/// 包含：
/// - 5 张溯源表（import_job / import_file / column_mapping / import_issue / imported_row）
/// - 旧数字作业号桥接表（legacy_job_alias）
/// - 4 张事实表（fact_production / fact_market_share / fact_funnel / fact_org_unit）
/// - 配置表（config_kv）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS import_job (
            job_id              TEXT PRIMARY KEY,
            dataset_key         TEXT,
            source_system       TEXT,
            original_filename   TEXT,
            content_hash        TEXT,
            status              TEXT NOT NULL DEFAULT 'uploaded',
            row_count           INTEGER NOT NULL DEFAULT 0,
            row_count_committed INTEGER NOT NULL DEFAULT 0,
            error_count         INTEGER NOT NULL DEFAULT 0,
            scope_id            TEXT,
            notes               TEXT,
            parsed_columns      TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_file (
            file_id      TEXT PRIMARY KEY,
            job_id       TEXT NOT NULL REFERENCES import_job(job_id),
            stored_path  TEXT NOT NULL,
            content_type TEXT,
            size_bytes   INTEGER NOT NULL DEFAULT 0,
            uploaded_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_file_job ON import_file(job_id, uploaded_at);

        CREATE TABLE IF NOT EXISTS column_mapping (
            mapping_id   TEXT PRIMARY KEY,
            job_id       TEXT NOT NULL REFERENCES import_job(job_id),
            mapping_json TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_column_mapping_job ON column_mapping(job_id, created_at);

        CREATE TABLE IF NOT EXISTS import_issue (
            issue_id   TEXT PRIMARY KEY,
            job_id     TEXT NOT NULL REFERENCES import_job(job_id),
            row_index  INTEGER NOT NULL,
            field      TEXT,
            message    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_issue_job ON import_issue(job_id);

        CREATE TABLE IF NOT EXISTS imported_row (
            row_id       TEXT PRIMARY KEY,
            job_id       TEXT NOT NULL REFERENCES import_job(job_id),
            dataset_key  TEXT,
            row_index    INTEGER NOT NULL,
            payload_json TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_imported_row_job ON imported_row(job_id, row_index);

        CREATE TABLE IF NOT EXISTS legacy_job_alias (
            legacy_id  INTEGER PRIMARY KEY,
            job_id     TEXT NOT NULL REFERENCES import_job(job_id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id   TEXT NOT NULL DEFAULT 'global',
            key        TEXT NOT NULL,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS fact_production (
            fact_id       TEXT PRIMARY KEY,
            org_unit      TEXT NOT NULL,
            period_date   TEXT NOT NULL,
            metric        TEXT NOT NULL,
            value         REAL NOT NULL,
            source_system TEXT,
            import_job_id TEXT,
            created_at    TEXT NOT NULL,
            record_status TEXT NOT NULL DEFAULT 'active',
            archived_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_fact_production_bk
            ON fact_production(org_unit, period_date, metric, record_status);

        CREATE TABLE IF NOT EXISTS fact_market_share (
            fact_id       TEXT PRIMARY KEY,
            zip_code      TEXT NOT NULL,
            category      TEXT NOT NULL,
            share         REAL NOT NULL,
            period_date   TEXT,
            source_system TEXT,
            import_job_id TEXT,
            created_at    TEXT NOT NULL,
            record_status TEXT NOT NULL DEFAULT 'active',
            archived_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_fact_market_share_bk
            ON fact_market_share(zip_code, category, period_date, record_status);

        CREATE TABLE IF NOT EXISTS fact_funnel (
            fact_id       TEXT PRIMARY KEY,
            org_unit      TEXT NOT NULL,
            period_date   TEXT NOT NULL,
            stage_from    TEXT NOT NULL,
            stage_to      TEXT NOT NULL,
            stage_count   REAL NOT NULL,
            source_system TEXT,
            import_job_id TEXT,
            created_at    TEXT NOT NULL,
            record_status TEXT NOT NULL DEFAULT 'active',
            archived_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_fact_funnel_bk
            ON fact_funnel(org_unit, period_date, stage_from, stage_to, record_status);

        CREATE TABLE IF NOT EXISTS fact_org_unit (
            fact_id       TEXT PRIMARY KEY,
            org_id        TEXT NOT NULL,
            org_type      TEXT NOT NULL,
            name          TEXT,
            zip_code      TEXT,
            service       TEXT,
            source_system TEXT,
            import_job_id TEXT,
            created_at    TEXT NOT NULL,
            record_status TEXT NOT NULL DEFAULT 'active',
            archived_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_fact_org_unit_bk
            ON fact_org_unit(org_id, record_status);
        "#,
    )?;
    Ok(())
}

/// 打开连接并确保 schema 就绪（服务启动/CLI 入口使用）
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}
