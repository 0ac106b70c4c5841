// ==========================================
// 报表数据导入平台 - 落库引擎
// ==========================================
// 职责: 将校验后的预览行投影为事实记录并写入事实表
// 模式: append（新增，不去重，不幂等）
//       replace（按业务键归档旧活动记录后插入，幂等）
// 红线: 单行转换失败只跳过并计数，绝不中断整批；
//       未识别数据集不进任何事实表，仅留存溯源
// ==========================================

use crate::domain::facts::{
    FactRow, FunnelFact, MarketShareFact, OrgUnitFact, ProductionFact,
};
use crate::domain::job::ImportedRow;
use crate::domain::types::{CommitMode, DatasetKind, RecordStatus};
use crate::importer::error::ImportResult;
use crate::importer::validator::{mapped_value, parse_number, parse_period_date};
use crate::repository::fact_repo::FactRepository;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

// ==========================================
// CommitOutcome - 落库结果
// ==========================================
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// 成功落库行数
    pub committed: usize,
    /// 转换失败被跳过的行数
    pub skipped: usize,
}

/// 将单行投影为事实记录
///
/// # 返回
/// - Some(FactRow): 投影成功
/// - None: 必填字段缺失或类型转换失败（调用方跳过并计数）
pub fn project_row(
    kind: DatasetKind,
    mapping: &BTreeMap<String, String>,
    row: &ImportedRow,
    source_system: Option<&str>,
    job_id: &str,
) -> Option<FactRow> {
    let now = Utc::now();
    let source_system = source_system.map(|s| s.to_string());
    let import_job_id = Some(job_id.to_string());

    match kind {
        DatasetKind::Production => {
            let org_unit = mapped_value(row, mapping, "org_unit")?.to_string();
            let period_date = parse_period_date(mapped_value(row, mapping, "period_date")?)?;
            let metric = mapped_value(row, mapping, "metric")?.to_string();
            let value = parse_number(mapped_value(row, mapping, "value")?)?;
            Some(FactRow::Production(ProductionFact {
                fact_id: Uuid::new_v4().to_string(),
                org_unit,
                period_date,
                metric,
                value,
                source_system,
                import_job_id,
                created_at: now,
                record_status: RecordStatus::Active,
                archived_at: None,
            }))
        }
        DatasetKind::Marketing => {
            let zip_code = mapped_value(row, mapping, "zip_code")?.to_string();
            let category = mapped_value(row, mapping, "category")?.to_string();
            let share = parse_number(mapped_value(row, mapping, "share")?)?;
            // 日期可缺失；存在但不可解析时按缺失处理
            let period_date = mapped_value(row, mapping, "period_date").and_then(parse_period_date);
            Some(FactRow::Marketing(MarketShareFact {
                fact_id: Uuid::new_v4().to_string(),
                zip_code,
                category,
                share,
                period_date,
                source_system,
                import_job_id,
                created_at: now,
                record_status: RecordStatus::Active,
                archived_at: None,
            }))
        }
        DatasetKind::Funnel => {
            let org_unit = mapped_value(row, mapping, "org_unit")?.to_string();
            let period_date = parse_period_date(mapped_value(row, mapping, "period_date")?)?;
            let stage_from = mapped_value(row, mapping, "stage_from")?.to_string();
            let stage_to = mapped_value(row, mapping, "stage_to")?.to_string();
            let count = parse_number(mapped_value(row, mapping, "count")?)?;
            Some(FactRow::Funnel(FunnelFact {
                fact_id: Uuid::new_v4().to_string(),
                org_unit,
                period_date,
                stage_from,
                stage_to,
                count,
                source_system,
                import_job_id,
                created_at: now,
                record_status: RecordStatus::Active,
                archived_at: None,
            }))
        }
        DatasetKind::OrgUnits => {
            let org_id = mapped_value(row, mapping, "org_id")?.to_string();
            let org_type = mapped_value(row, mapping, "org_type")?.to_string();
            Some(FactRow::OrgUnits(OrgUnitFact {
                fact_id: Uuid::new_v4().to_string(),
                org_id,
                org_type,
                name: mapped_value(row, mapping, "name").map(|v| v.to_string()),
                zip_code: mapped_value(row, mapping, "zip_code").map(|v| v.to_string()),
                service: mapped_value(row, mapping, "service").map(|v| v.to_string()),
                source_system,
                import_job_id,
                created_at: now,
                record_status: RecordStatus::Active,
                archived_at: None,
            }))
        }
        DatasetKind::Generic => None,
    }
}

// ==========================================
// CommitEngine - 落库引擎
// ==========================================
pub struct CommitEngine<F>
where
    F: FactRepository,
{
    fact_repo: F,
}

impl<F> CommitEngine<F>
where
    F: FactRepository,
{
    pub fn new(fact_repo: F) -> Self {
        Self { fact_repo }
    }

    /// 事实表读访问（看板/归档协作方使用的同一契约）
    pub fn fact_repo(&self) -> &F {
        &self.fact_repo
    }

    /// 将整批预览行投影并写入事实表
    ///
    /// # 参数
    /// - kind: 数据集类型
    /// - mode: append / replace
    /// - mapping: 标准字段 → 源列名
    /// - rows: 预览行（落库重放来源）
    /// - source_system / job_id: 写入事实记录的溯源信息
    pub async fn commit_rows(
        &self,
        kind: DatasetKind,
        mode: CommitMode,
        mapping: &BTreeMap<String, String>,
        rows: &[ImportedRow],
        source_system: Option<&str>,
        job_id: &str,
    ) -> ImportResult<CommitOutcome> {
        // 未识别数据集不进事实表（仅溯源留存），也不计入跳过
        if kind == DatasetKind::Generic {
            info!(job_id = %job_id, rows = rows.len(), "数据集未识别，跳过事实表投影");
            return Ok(CommitOutcome {
                committed: 0,
                skipped: 0,
            });
        }

        let mut committed = 0usize;
        let mut skipped = 0usize;

        for row in rows {
            let fact = match project_row(kind, mapping, row, source_system, job_id) {
                Some(fact) => fact,
                None => {
                    // 单行转换失败：跳过并计数，不中断整批
                    debug!(
                        job_id = %job_id,
                        row_index = row.row_index,
                        "行投影失败，跳过"
                    );
                    skipped += 1;
                    continue;
                }
            };

            match mode {
                CommitMode::Append => {
                    self.fact_repo.insert_fact(&fact).await?;
                }
                CommitMode::Replace => {
                    let archived = self.fact_repo.archive_active_matching(&fact).await?;
                    if archived > 0 {
                        debug!(
                            job_id = %job_id,
                            business_key = %fact.business_key(),
                            archived = archived,
                            "旧活动记录已归档"
                        );
                    }
                    self.fact_repo.insert_fact(&fact).await?;
                }
            }
            committed += 1;
        }

        info!(
            job_id = %job_id,
            dataset = %kind,
            mode = mode.as_str(),
            committed = committed,
            skipped = skipped,
            "落库完成"
        );

        Ok(CommitOutcome { committed, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(index: i64, cells: &[(&str, &str)]) -> ImportedRow {
        ImportedRow {
            row_id: format!("r-{}", index),
            job_id: "j-1".to_string(),
            dataset_key: None,
            row_index: index,
            payload: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn marketing_mapping() -> BTreeMap<String, String> {
        [("zip_code", "ZIP"), ("category", "Category"), ("share", "Share")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_project_marketing_row() {
        let row = row(0, &[("ZIP", "10115"), ("Category", "care"), ("Share", "12.5")]);
        let fact = project_row(
            DatasetKind::Marketing,
            &marketing_mapping(),
            &row,
            Some("crm"),
            "job-1",
        )
        .unwrap();

        match fact {
            FactRow::Marketing(f) => {
                assert_eq!(f.zip_code, "10115");
                assert_eq!(f.category, "care");
                assert!((f.share - 12.5).abs() < 1e-9);
                assert_eq!(f.period_date, None);
                assert_eq!(f.source_system.as_deref(), Some("crm"));
                assert_eq!(f.import_job_id.as_deref(), Some("job-1"));
                assert_eq!(f.record_status, RecordStatus::Active);
            }
            other => panic!("期望 Marketing 事实，实际 {:?}", other.kind()),
        }
    }

    #[test]
    fn test_project_skips_non_numeric_share() {
        let row = row(0, &[("ZIP", "10115"), ("Category", "care"), ("Share", "n/a")]);
        let fact = project_row(
            DatasetKind::Marketing,
            &marketing_mapping(),
            &row,
            None,
            "job-1",
        );
        assert!(fact.is_none());
    }

    #[test]
    fn test_project_production_requires_business_key_fields() {
        let mapping: BTreeMap<String, String> = [
            ("org_unit", "STN"),
            ("period_date", "Date"),
            ("metric", "Service"),
            ("value", "Share"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        // 日期无法解析 → 整行跳过
        let bad = row(
            0,
            &[("STN", "O1"), ("Date", "31.01.2026"), ("Service", "visits"), ("Share", "4")],
        );
        assert!(project_row(DatasetKind::Production, &mapping, &bad, None, "j").is_none());

        let good = row(
            1,
            &[("STN", "O1"), ("Date", "2026-01-31"), ("Service", "visits"), ("Share", "4")],
        );
        let fact = project_row(DatasetKind::Production, &mapping, &good, None, "j").unwrap();
        assert_eq!(fact.business_key(), "O1|2026-01-31|visits");
    }

    #[test]
    fn test_project_generic_never_produces_fact() {
        let row = row(0, &[("a", "1")]);
        assert!(project_row(DatasetKind::Generic, &BTreeMap::new(), &row, None, "j").is_none());
    }

    #[test]
    fn test_fresh_fact_id_per_projection() {
        let r = row(0, &[("ZIP", "10115"), ("Category", "care"), ("Share", "1")]);
        let a = project_row(DatasetKind::Marketing, &marketing_mapping(), &r, None, "j").unwrap();
        let b = project_row(DatasetKind::Marketing, &marketing_mapping(), &r, None, "j").unwrap();
        assert_ne!(a.fact_id(), b.fact_id());
    }
}
