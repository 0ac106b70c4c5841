// ==========================================
// 报表数据导入平台 - 标准事实模型
// ==========================================
// 职责: 按数据集类型定义事实记录与业务键
// 不变式: replace 模式下同一业务键至多一条 active 记录
// ==========================================

use crate::domain::types::{DatasetKind, RecordStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionFact - 业务量事实
// ==========================================
// 业务键: org_unit + period_date + metric
// 对齐: fact_production 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionFact {
    pub fact_id: String,
    pub org_unit: String,        // 机构标识
    pub period_date: NaiveDate,  // 统计日期
    pub metric: String,          // 指标名
    pub value: f64,              // 指标值
    pub source_system: Option<String>,
    pub import_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub record_status: RecordStatus,
    pub archived_at: Option<DateTime<Utc>>,
}

// ==========================================
// MarketShareFact - 市场份额事实
// ==========================================
// 业务键: zip_code + category + period_date
// 对齐: fact_market_share 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketShareFact {
    pub fact_id: String,
    pub zip_code: String,              // 邮编
    pub category: String,              // 品类
    pub share: f64,                    // 份额值
    pub period_date: Option<NaiveDate>, // 统计日期（源数据可缺失）
    pub source_system: Option<String>,
    pub import_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub record_status: RecordStatus,
    pub archived_at: Option<DateTime<Utc>>,
}

// ==========================================
// FunnelFact - 转化漏斗事实
// ==========================================
// 业务键: org_unit + period_date + stage_from + stage_to
// 对齐: fact_funnel 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelFact {
    pub fact_id: String,
    pub org_unit: String,       // 机构标识
    pub period_date: NaiveDate, // 统计日期
    pub stage_from: String,     // 迁移起始阶段
    pub stage_to: String,       // 迁移目标阶段
    pub count: f64,             // 迁移计数
    pub source_system: Option<String>,
    pub import_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub record_status: RecordStatus,
    pub archived_at: Option<DateTime<Utc>>,
}

// ==========================================
// OrgUnitFact - 机构主数据事实
// ==========================================
// 业务键: org_id
// 对齐: fact_org_unit 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgUnitFact {
    pub fact_id: String,
    pub org_id: String,            // 机构 ID
    pub org_type: String,          // 机构类型
    pub name: Option<String>,      // 机构名称
    pub zip_code: Option<String>,  // 邮编
    pub service: Option<String>,   // 提供的服务
    pub source_system: Option<String>,
    pub import_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub record_status: RecordStatus,
    pub archived_at: Option<DateTime<Utc>>,
}

// ==========================================
// FactRow - 事实记录统一封装
// ==========================================
// 用途: 校验/落库按 DatasetKind 分发的强类型载体，
//       避免运行期查询表结构的做法
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FactRow {
    Production(ProductionFact),
    Marketing(MarketShareFact),
    Funnel(FunnelFact),
    OrgUnits(OrgUnitFact),
}

impl FactRow {
    pub fn kind(&self) -> DatasetKind {
        match self {
            FactRow::Production(_) => DatasetKind::Production,
            FactRow::Marketing(_) => DatasetKind::Marketing,
            FactRow::Funnel(_) => DatasetKind::Funnel,
            FactRow::OrgUnits(_) => DatasetKind::OrgUnits,
        }
    }

    pub fn fact_id(&self) -> &str {
        match self {
            FactRow::Production(f) => &f.fact_id,
            FactRow::Marketing(f) => &f.fact_id,
            FactRow::Funnel(f) => &f.fact_id,
            FactRow::OrgUnits(f) => &f.fact_id,
        }
    }

    /// 业务键（replace 模式的归档/插入依据）
    pub fn business_key(&self) -> String {
        match self {
            FactRow::Production(f) => {
                format!("{}|{}|{}", f.org_unit, f.period_date, f.metric)
            }
            FactRow::Marketing(f) => format!(
                "{}|{}|{}",
                f.zip_code,
                f.category,
                f.period_date.map(|d| d.to_string()).unwrap_or_default()
            ),
            FactRow::Funnel(f) => format!(
                "{}|{}|{}|{}",
                f.org_unit, f.period_date, f.stage_from, f.stage_to
            ),
            FactRow::OrgUnits(f) => f.org_id.clone(),
        }
    }
}
