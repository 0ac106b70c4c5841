// ==========================================
// 报表数据导入平台 - 基础类型定义
// ==========================================
// 职责: 导入管道使用的枚举类型与字符串编解码
// 约定: 数据库存储一律使用小写下划线串
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// DatasetKind - 数据集类型
// ==========================================
// 用途: 分类器输出，决定校验规则与事实表投影
// 说明: Generic 为兜底类型，仅留存溯源，不进事实表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Production, // 业务量数据（机构×日期×指标）
    Marketing,  // 市场份额数据（邮编×品类）
    Funnel,     // 转化漏斗数据（阶段迁移计数）
    OrgUnits,   // 机构主数据
    Generic,    // 未识别数据集
}

impl DatasetKind {
    /// 数据库/接口使用的键名
    pub fn as_key(&self) -> &'static str {
        match self {
            DatasetKind::Production => "production",
            DatasetKind::Marketing => "marketing",
            DatasetKind::Funnel => "funnel",
            DatasetKind::OrgUnits => "org_units",
            DatasetKind::Generic => "generic",
        }
    }

    /// 从键名解析（未知键名归入 Generic）
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "production" => DatasetKind::Production,
            "marketing" => DatasetKind::Marketing,
            "funnel" => DatasetKind::Funnel,
            "org_units" | "org_unit" => DatasetKind::OrgUnits,
            _ => DatasetKind::Generic,
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

// ==========================================
// JobStatus - 导入作业状态
// ==========================================
// 状态机: uploaded → parsed → mapped → validated | validated_with_errors
//         → committing → committed
// 说明: committing 为落库过程中的短暂占位状态，用于并发互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Uploaded,
    Parsed,
    Mapped,
    Validated,
    ValidatedWithErrors,
    Committing,
    Committed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Parsed => "parsed",
            JobStatus::Mapped => "mapped",
            JobStatus::Validated => "validated",
            JobStatus::ValidatedWithErrors => "validated_with_errors",
            JobStatus::Committing => "committing",
            JobStatus::Committed => "committed",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim() {
            "uploaded" => Some(JobStatus::Uploaded),
            "parsed" => Some(JobStatus::Parsed),
            "mapped" => Some(JobStatus::Mapped),
            "validated" => Some(JobStatus::Validated),
            "validated_with_errors" => Some(JobStatus::ValidatedWithErrors),
            "committing" => Some(JobStatus::Committing),
            "committed" => Some(JobStatus::Committed),
            _ => None,
        }
    }

    /// 是否允许发起落库（committing 状态本身除外，用于互斥）
    pub fn can_commit(&self) -> bool {
        matches!(
            self,
            JobStatus::Mapped
                | JobStatus::Validated
                | JobStatus::ValidatedWithErrors
                | JobStatus::Committed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// CommitMode - 落库模式
// ==========================================
// append:  每行生成新事实记录，不去重，重复提交会累积
// replace: 按业务键归档旧活动记录后插入新记录，幂等
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitMode {
    Append,
    Replace,
}

impl CommitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitMode::Append => "append",
            CommitMode::Replace => "replace",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "append" => Some(CommitMode::Append),
            "replace" => Some(CommitMode::Replace),
            _ => None,
        }
    }
}

// ==========================================
// RecordStatus - 事实记录状态
// ==========================================
// 不变式: replace 模式下同一业务键至多一条 active 记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Archived => "archived",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim() {
            "active" => Some(RecordStatus::Active),
            "archived" => Some(RecordStatus::Archived),
            _ => None,
        }
    }
}

// ==========================================
// SourceFormat - 上传文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Delimited,   // CSV/TSV 等分隔文本
    Spreadsheet, // Excel 工作簿
    Json,        // 结构化 JSON
    SqlDump,     // SQL 导出文本（仅文本解析）
}

impl SourceFormat {
    /// 按扩展名判定格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(SourceFormat::Delimited),
            "xlsx" | "xls" => Some(SourceFormat::Spreadsheet),
            "json" => Some(SourceFormat::Json),
            "sql" => Some(SourceFormat::SqlDump),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_kind_roundtrip() {
        for kind in [
            DatasetKind::Production,
            DatasetKind::Marketing,
            DatasetKind::Funnel,
            DatasetKind::OrgUnits,
            DatasetKind::Generic,
        ] {
            assert_eq!(DatasetKind::from_key(kind.as_key()), kind);
        }
        // 未知键名归入 Generic
        assert_eq!(DatasetKind::from_key("whatever"), DatasetKind::Generic);
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Uploaded,
            JobStatus::Parsed,
            JobStatus::Mapped,
            JobStatus::Validated,
            JobStatus::ValidatedWithErrors,
            JobStatus::Committing,
            JobStatus::Committed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("failed"), None);
    }

    #[test]
    fn test_can_commit_excludes_early_states() {
        assert!(!JobStatus::Uploaded.can_commit());
        assert!(!JobStatus::Parsed.can_commit());
        assert!(!JobStatus::Committing.can_commit());
        assert!(JobStatus::Mapped.can_commit());
        assert!(JobStatus::Committed.can_commit());
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Delimited));
        assert_eq!(SourceFormat::from_extension("xlsx"), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_extension("sql"), Some(SourceFormat::SqlDump));
        assert_eq!(SourceFormat::from_extension("pdf"), None);
    }
}
