// ==========================================
// 报表数据导入平台 - 事实表 Repository
// ==========================================
// 职责: 事实记录写入/归档/读取（看板与归档任务共用的表契约）
// 红线: 不含投影与校验逻辑，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::facts::{
    FactRow, FunnelFact, MarketShareFact, OrgUnitFact, ProductionFact,
};
use crate::domain::types::{DatasetKind, RecordStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// FactRepository Trait
// ==========================================
// 用途: 落库引擎与外部读方（看板/归档任务）的数据访问
// 实现者: SqliteFactRepository
#[async_trait]
pub trait FactRepository: Send + Sync {
    /// 插入一条事实记录（append 与 replace 的插入步骤共用）
    async fn insert_fact(&self, fact: &FactRow) -> RepositoryResult<()>;

    /// 归档与给定记录业务键相同的全部活动记录
    ///
    /// # 返回
    /// - Ok(usize): 被归档的记录数
    async fn archive_active_matching(&self, fact: &FactRow) -> RepositoryResult<usize>;

    /// 按记录状态统计某数据集的事实记录数
    async fn count_by_status(
        &self,
        kind: DatasetKind,
        status: RecordStatus,
    ) -> RepositoryResult<i64>;

    /// 列出某数据集的活动记录（看板读取契约）
    async fn list_active(&self, kind: DatasetKind, limit: usize) -> RepositoryResult<Vec<FactRow>>;
}

// ==========================================
// SqliteFactRepository
// ==========================================
pub struct SqliteFactRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFactRepository {
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

/// 数据集 → 事实表名（Generic 无事实表）
fn fact_table(kind: DatasetKind) -> Option<&'static str> {
    match kind {
        DatasetKind::Production => Some("fact_production"),
        DatasetKind::Marketing => Some("fact_market_share"),
        DatasetKind::Funnel => Some("fact_funnel"),
        DatasetKind::OrgUnits => Some("fact_org_unit"),
        DatasetKind::Generic => None,
    }
}

fn production_from_row(row: &Row<'_>) -> rusqlite::Result<FactRow> {
    let status: String = row.get("record_status")?;
    Ok(FactRow::Production(ProductionFact {
        fact_id: row.get("fact_id")?,
        org_unit: row.get("org_unit")?,
        period_date: row.get("period_date")?,
        metric: row.get("metric")?,
        value: row.get("value")?,
        source_system: row.get("source_system")?,
        import_job_id: row.get("import_job_id")?,
        created_at: row.get("created_at")?,
        record_status: RecordStatus::from_str(&status).unwrap_or(RecordStatus::Active),
        archived_at: row.get("archived_at")?,
    }))
}

fn market_share_from_row(row: &Row<'_>) -> rusqlite::Result<FactRow> {
    let status: String = row.get("record_status")?;
    Ok(FactRow::Marketing(MarketShareFact {
        fact_id: row.get("fact_id")?,
        zip_code: row.get("zip_code")?,
        category: row.get("category")?,
        share: row.get("share")?,
        period_date: row.get("period_date")?,
        source_system: row.get("source_system")?,
        import_job_id: row.get("import_job_id")?,
        created_at: row.get("created_at")?,
        record_status: RecordStatus::from_str(&status).unwrap_or(RecordStatus::Active),
        archived_at: row.get("archived_at")?,
    }))
}

fn funnel_from_row(row: &Row<'_>) -> rusqlite::Result<FactRow> {
    let status: String = row.get("record_status")?;
    Ok(FactRow::Funnel(FunnelFact {
        fact_id: row.get("fact_id")?,
        org_unit: row.get("org_unit")?,
        period_date: row.get("period_date")?,
        stage_from: row.get("stage_from")?,
        stage_to: row.get("stage_to")?,
        count: row.get("stage_count")?,
        source_system: row.get("source_system")?,
        import_job_id: row.get("import_job_id")?,
        created_at: row.get("created_at")?,
        record_status: RecordStatus::from_str(&status).unwrap_or(RecordStatus::Active),
        archived_at: row.get("archived_at")?,
    }))
}

fn org_unit_from_row(row: &Row<'_>) -> rusqlite::Result<FactRow> {
    let status: String = row.get("record_status")?;
    Ok(FactRow::OrgUnits(OrgUnitFact {
        fact_id: row.get("fact_id")?,
        org_id: row.get("org_id")?,
        org_type: row.get("org_type")?,
        name: row.get("name")?,
        zip_code: row.get("zip_code")?,
        service: row.get("service")?,
        source_system: row.get("source_system")?,
        import_job_id: row.get("import_job_id")?,
        created_at: row.get("created_at")?,
        record_status: RecordStatus::from_str(&status).unwrap_or(RecordStatus::Active),
        archived_at: row.get("archived_at")?,
    }))
}

#[async_trait]
impl FactRepository for SqliteFactRepository {
    async fn insert_fact(&self, fact: &FactRow) -> RepositoryResult<()> {
        let conn = self.lock()?;
        match fact {
            FactRow::Production(f) => {
                conn.execute(
                    r#"
                    INSERT INTO fact_production (
                        fact_id, org_unit, period_date, metric, value,
                        source_system, import_job_id, created_at, record_status, archived_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        f.fact_id,
                        f.org_unit,
                        f.period_date,
                        f.metric,
                        f.value,
                        f.source_system,
                        f.import_job_id,
                        f.created_at,
                        f.record_status.as_str(),
                        f.archived_at,
                    ],
                )?;
            }
            FactRow::Marketing(f) => {
                conn.execute(
                    r#"
                    INSERT INTO fact_market_share (
                        fact_id, zip_code, category, share, period_date,
                        source_system, import_job_id, created_at, record_status, archived_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        f.fact_id,
                        f.zip_code,
                        f.category,
                        f.share,
                        f.period_date,
                        f.source_system,
                        f.import_job_id,
                        f.created_at,
                        f.record_status.as_str(),
                        f.archived_at,
                    ],
                )?;
            }
            FactRow::Funnel(f) => {
                conn.execute(
                    r#"
                    INSERT INTO fact_funnel (
                        fact_id, org_unit, period_date, stage_from, stage_to, stage_count,
                        source_system, import_job_id, created_at, record_status, archived_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        f.fact_id,
                        f.org_unit,
                        f.period_date,
                        f.stage_from,
                        f.stage_to,
                        f.count,
                        f.source_system,
                        f.import_job_id,
                        f.created_at,
                        f.record_status.as_str(),
                        f.archived_at,
                    ],
                )?;
            }
            FactRow::OrgUnits(f) => {
                conn.execute(
                    r#"
                    INSERT INTO fact_org_unit (
                        fact_id, org_id, org_type, name, zip_code, service,
                        source_system, import_job_id, created_at, record_status, archived_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        f.fact_id,
                        f.org_id,
                        f.org_type,
                        f.name,
                        f.zip_code,
                        f.service,
                        f.source_system,
                        f.import_job_id,
                        f.created_at,
                        f.record_status.as_str(),
                        f.archived_at,
                    ],
                )?;
            }
        }
        Ok(())
    }

    async fn archive_active_matching(&self, fact: &FactRow) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let now = Utc::now();
        let archived = match fact {
            FactRow::Production(f) => conn.execute(
                r#"
                UPDATE fact_production
                SET record_status = 'archived', archived_at = ?1
                WHERE org_unit = ?2 AND period_date = ?3 AND metric = ?4
                  AND record_status = 'active'
                "#,
                params![now, f.org_unit, f.period_date, f.metric],
            )?,
            FactRow::Marketing(f) => conn.execute(
                r#"
                UPDATE fact_market_share
                SET record_status = 'archived', archived_at = ?1
                WHERE zip_code = ?2 AND category = ?3 AND period_date IS ?4
                  AND record_status = 'active'
                "#,
                params![now, f.zip_code, f.category, f.period_date],
            )?,
            FactRow::Funnel(f) => conn.execute(
                r#"
                UPDATE fact_funnel
                SET record_status = 'archived', archived_at = ?1
                WHERE org_unit = ?2 AND period_date = ?3
                  AND stage_from = ?4 AND stage_to = ?5
                  AND record_status = 'active'
                "#,
                params![now, f.org_unit, f.period_date, f.stage_from, f.stage_to],
            )?,
            FactRow::OrgUnits(f) => conn.execute(
                r#"
                UPDATE fact_org_unit
                SET record_status = 'archived', archived_at = ?1
                WHERE org_id = ?2 AND record_status = 'active'
                "#,
                params![now, f.org_id],
            )?,
        };
        Ok(archived)
    }

    async fn count_by_status(
        &self,
        kind: DatasetKind,
        status: RecordStatus,
    ) -> RepositoryResult<i64> {
        let table = match fact_table(kind) {
            Some(table) => table,
            None => return Ok(0),
        };

        let conn = self.lock()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE record_status = ?1",
            table
        );
        let count: i64 = conn.query_row(&sql, params![status.as_str()], |row| row.get(0))?;
        Ok(count)
    }

    async fn list_active(&self, kind: DatasetKind, limit: usize) -> RepositoryResult<Vec<FactRow>> {
        let table = match fact_table(kind) {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };

        let conn = self.lock()?;
        let sql = format!(
            "SELECT * FROM {} WHERE record_status = 'active' ORDER BY created_at, rowid LIMIT ?1",
            table
        );
        let mut stmt = conn.prepare(&sql)?;

        let mapper: fn(&Row<'_>) -> rusqlite::Result<FactRow> = match kind {
            DatasetKind::Production => production_from_row,
            DatasetKind::Marketing => market_share_from_row,
            DatasetKind::Funnel => funnel_from_row,
            DatasetKind::OrgUnits => org_unit_from_row,
            DatasetKind::Generic => unreachable!("Generic 已在上方返回"),
        };

        let facts = stmt
            .query_map(params![limit as i64], mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::NaiveDate;

    fn memory_repo() -> SqliteFactRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteFactRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn production_fact(id: &str, org: &str, date: NaiveDate, metric: &str, value: f64) -> FactRow {
        FactRow::Production(ProductionFact {
            fact_id: id.to_string(),
            org_unit: org.to_string(),
            period_date: date,
            metric: metric.to_string(),
            value,
            source_system: Some("erp".to_string()),
            import_job_id: Some("j-1".to_string()),
            created_at: Utc::now(),
            record_status: RecordStatus::Active,
            archived_at: None,
        })
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let repo = memory_repo();
        let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        repo.insert_fact(&production_fact("f-1", "O1", date, "visits", 4.0))
            .await
            .unwrap();
        repo.insert_fact(&production_fact("f-2", "O2", date, "visits", 7.0))
            .await
            .unwrap();

        let active = repo
            .count_by_status(DatasetKind::Production, RecordStatus::Active)
            .await
            .unwrap();
        assert_eq!(active, 2);
        // 其他数据集不受影响
        let marketing = repo
            .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
            .await
            .unwrap();
        assert_eq!(marketing, 0);
    }

    #[tokio::test]
    async fn test_archive_active_matching_only_same_key() {
        let repo = memory_repo();
        let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        repo.insert_fact(&production_fact("f-1", "O1", date, "visits", 4.0))
            .await
            .unwrap();
        repo.insert_fact(&production_fact("f-2", "O2", date, "visits", 7.0))
            .await
            .unwrap();

        let replacement = production_fact("f-3", "O1", date, "visits", 5.0);
        let archived = repo.archive_active_matching(&replacement).await.unwrap();
        assert_eq!(archived, 1);

        let active = repo
            .count_by_status(DatasetKind::Production, RecordStatus::Active)
            .await
            .unwrap();
        let archived_count = repo
            .count_by_status(DatasetKind::Production, RecordStatus::Archived)
            .await
            .unwrap();
        assert_eq!(active, 1);
        assert_eq!(archived_count, 1);
    }

    #[tokio::test]
    async fn test_marketing_null_period_date_key_match() {
        let repo = memory_repo();
        let fact = FactRow::Marketing(MarketShareFact {
            fact_id: "m-1".to_string(),
            zip_code: "10115".to_string(),
            category: "care".to_string(),
            share: 12.5,
            period_date: None,
            source_system: None,
            import_job_id: None,
            created_at: Utc::now(),
            record_status: RecordStatus::Active,
            archived_at: None,
        });
        repo.insert_fact(&fact).await.unwrap();

        // period_date 为 NULL 时业务键仍可匹配（IS 比较）
        let archived = repo.archive_active_matching(&fact).await.unwrap();
        assert_eq!(archived, 1);
    }

    #[tokio::test]
    async fn test_list_active_excludes_archived() {
        let repo = memory_repo();
        let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        repo.insert_fact(&production_fact("f-1", "O1", date, "visits", 4.0))
            .await
            .unwrap();
        repo.archive_active_matching(&production_fact("f-x", "O1", date, "visits", 0.0))
            .await
            .unwrap();
        repo.insert_fact(&production_fact("f-2", "O1", date, "visits", 5.0))
            .await
            .unwrap();

        let active = repo.list_active(DatasetKind::Production, 10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].fact_id(), "f-2");

        assert!(repo
            .list_active(DatasetKind::Generic, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
