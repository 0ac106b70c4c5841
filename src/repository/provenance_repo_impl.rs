// ==========================================
// 报表数据导入平台 - 溯源 Repository 实现
// ==========================================
// 存储: SQLite（rusqlite，阻塞 I/O 包装在 async 接口内）
// 约定: 时间戳 RFC3339 文本；映射/行载荷/列清单以 JSON 文本列存储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::job::{ColumnMapping, ImportFileRecord, ImportIssue, ImportJob, ImportedRow};
use crate::domain::types::{DatasetKind, JobStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::provenance_repo::ProvenanceRepository;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SqliteProvenanceRepository
// ==========================================
pub struct SqliteProvenanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvenanceRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（测试/同连接复用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 行 → ImportJob
fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ImportJob> {
    let dataset_key: Option<String> = row.get("dataset_key")?;
    let status: String = row.get("status")?;
    let parsed_columns: Option<String> = row.get("parsed_columns")?;

    Ok(ImportJob {
        job_id: row.get("job_id")?,
        dataset_key: dataset_key.map(|k| DatasetKind::from_key(&k)),
        source_system: row.get("source_system")?,
        original_filename: row.get("original_filename")?,
        content_hash: row.get("content_hash")?,
        status: JobStatus::from_str(&status).unwrap_or(JobStatus::Uploaded),
        row_count: row.get("row_count")?,
        row_count_committed: row.get("row_count_committed")?,
        error_count: row.get("error_count")?,
        scope_id: row.get("scope_id")?,
        notes: row.get("notes")?,
        parsed_columns: parsed_columns
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// 行 → ImportFileRecord
fn file_from_row(row: &Row<'_>) -> rusqlite::Result<ImportFileRecord> {
    Ok(ImportFileRecord {
        file_id: row.get("file_id")?,
        job_id: row.get("job_id")?,
        stored_path: row.get("stored_path")?,
        content_type: row.get("content_type")?,
        size_bytes: row.get("size_bytes")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

/// 行 → ColumnMapping（mapping_json 解析失败时按空映射处理）
fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<ColumnMapping> {
    let mapping_json: String = row.get("mapping_json")?;
    Ok(ColumnMapping {
        mapping_id: row.get("mapping_id")?,
        job_id: row.get("job_id")?,
        mapping: serde_json::from_str::<BTreeMap<String, String>>(&mapping_json)
            .unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

/// 行 → ImportIssue
fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<ImportIssue> {
    Ok(ImportIssue {
        issue_id: row.get("issue_id")?,
        job_id: row.get("job_id")?,
        row_index: row.get("row_index")?,
        field: row.get("field")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
    })
}

/// 行 → ImportedRow
fn imported_row_from_row(row: &Row<'_>) -> rusqlite::Result<ImportedRow> {
    let dataset_key: Option<String> = row.get("dataset_key")?;
    let payload_json: String = row.get("payload_json")?;
    Ok(ImportedRow {
        row_id: row.get("row_id")?,
        job_id: row.get("job_id")?,
        dataset_key: dataset_key.map(|k| DatasetKind::from_key(&k)),
        row_index: row.get("row_index")?,
        payload: serde_json::from_str::<BTreeMap<String, String>>(&payload_json)
            .unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

#[async_trait]
impl ProvenanceRepository for SqliteProvenanceRepository {
    async fn insert_job(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO import_job (
                job_id, dataset_key, source_system, original_filename, content_hash,
                status, row_count, row_count_committed, error_count,
                scope_id, notes, parsed_columns, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                job.job_id,
                job.dataset_key.map(|k| k.as_key()),
                job.source_system,
                job.original_filename,
                job.content_hash,
                job.status.as_str(),
                job.row_count,
                job.row_count_committed,
                job.error_count,
                job.scope_id,
                job.notes,
                serde_json::to_string(&job.parsed_columns)?,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn update_job(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let affected = conn.execute(
            r#"
            UPDATE import_job SET
                dataset_key = ?2,
                source_system = ?3,
                original_filename = ?4,
                content_hash = ?5,
                status = ?6,
                row_count = ?7,
                row_count_committed = ?8,
                error_count = ?9,
                scope_id = ?10,
                notes = ?11,
                parsed_columns = ?12,
                updated_at = ?13
            WHERE job_id = ?1
            "#,
            params![
                job.job_id,
                job.dataset_key.map(|k| k.as_key()),
                job.source_system,
                job.original_filename,
                job.content_hash,
                job.status.as_str(),
                job.row_count,
                job.row_count_committed,
                job.error_count,
                job.scope_id,
                job.notes,
                serde_json::to_string(&job.parsed_columns)?,
                Utc::now(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJob".to_string(),
                id: job.job_id.clone(),
            });
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT * FROM import_job WHERE job_id = ?1",
            params![job_id],
            job_from_row,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_jobs(&self, limit: usize) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM import_job ORDER BY created_at DESC LIMIT ?1")?;
        let jobs = stmt
            .query_map(params![limit as i64], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    async fn try_transition_status(
        &self,
        job_id: &str,
        from: &[JobStatus],
        to: JobStatus,
    ) -> RepositoryResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        // 源状态为内部常量集合，直接内联为字面量列表
        let allowed: Vec<String> = from.iter().map(|s| format!("'{}'", s.as_str())).collect();
        let sql = format!(
            "UPDATE import_job SET status = ?1, updated_at = ?2 \
             WHERE job_id = ?3 AND status IN ({})",
            allowed.join(", ")
        );

        let conn = self.lock()?;
        let affected = conn.execute(&sql, params![to.as_str(), Utc::now(), job_id])?;
        Ok(affected == 1)
    }

    async fn insert_file(&self, file: &ImportFileRecord) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO import_file (
                file_id, job_id, stored_path, content_type, size_bytes, uploaded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                file.file_id,
                file.job_id,
                file.stored_path,
                file.content_type,
                file.size_bytes,
                file.uploaded_at,
            ],
        )?;
        Ok(())
    }

    async fn latest_file(&self, job_id: &str) -> RepositoryResult<Option<ImportFileRecord>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT * FROM import_file WHERE job_id = ?1 \
             ORDER BY uploaded_at DESC, rowid DESC LIMIT 1",
            params![job_id],
            file_from_row,
        );
        match result {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn files_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ImportFileRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM import_file WHERE job_id = ?1 ORDER BY uploaded_at, rowid")?;
        let files = stmt
            .query_map(params![job_id], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    async fn insert_mapping(&self, mapping: &ColumnMapping) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO column_mapping (mapping_id, job_id, mapping_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                mapping.mapping_id,
                mapping.job_id,
                serde_json::to_string(&mapping.mapping)?,
                mapping.created_at,
            ],
        )?;
        Ok(())
    }

    async fn latest_mapping(&self, job_id: &str) -> RepositoryResult<Option<ColumnMapping>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT * FROM column_mapping WHERE job_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![job_id],
            mapping_from_row,
        );
        match result {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn mappings_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ColumnMapping>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM column_mapping WHERE job_id = ?1 ORDER BY created_at, rowid")?;
        let mappings = stmt
            .query_map(params![job_id], mapping_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mappings)
    }

    async fn replace_issues(
        &self,
        job_id: &str,
        issues: &[ImportIssue],
    ) -> RepositoryResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM import_issue WHERE job_id = ?1", params![job_id])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO import_issue (issue_id, job_id, row_index, field, message, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for issue in issues {
                stmt.execute(params![
                    issue.issue_id,
                    issue.job_id,
                    issue.row_index,
                    issue.field,
                    issue.message,
                    issue.created_at,
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(issues.len())
    }

    async fn issues_for_job(
        &self,
        job_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<ImportIssue>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM import_issue WHERE job_id = ?1 ORDER BY row_index, rowid LIMIT ?2",
        )?;
        let issues = stmt
            .query_map(params![job_id, limit as i64], issue_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    async fn replace_rows(&self, job_id: &str, rows: &[ImportedRow]) -> RepositoryResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM imported_row WHERE job_id = ?1", params![job_id])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO imported_row (
                    row_id, job_id, dataset_key, row_index, payload_json, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    row.row_id,
                    row.job_id,
                    row.dataset_key.map(|k| k.as_key()),
                    row.row_index,
                    serde_json::to_string(&row.payload)?,
                    row.created_at,
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(rows.len())
    }

    async fn rows_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ImportedRow>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM imported_row WHERE job_id = ?1 ORDER BY row_index")?;
        let rows = stmt
            .query_map(params![job_id], imported_row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn insert_legacy_alias(&self, legacy_id: i64, job_id: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO legacy_job_alias (legacy_id, job_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![legacy_id, job_id, Utc::now()],
        )?;
        Ok(())
    }

    async fn resolve_legacy_alias(&self, legacy_id: i64) -> RepositoryResult<Option<String>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT job_id FROM legacy_job_alias WHERE legacy_id = ?1",
            params![legacy_id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(job_id) => Ok(Some(job_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
