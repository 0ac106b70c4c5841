// ==========================================
// 报表数据导入平台 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格类报表的导入、映射、校验与落库管道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析/分类/映射/校验/落库
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CommitMode, DatasetKind, JobStatus, RecordStatus, SourceFormat};

// 领域实体
pub use domain::{
    ColumnMapping, FactRow, FunnelFact, ImportFileRecord, ImportIssue, ImportJob, ImportedRow,
    MarketShareFact, OrgUnitFact, ProductionFact,
};

// 导入层
pub use importer::{
    ClassifiedDataset, CommitOutcome, DetectedTable, ImportError, ImportPipeline, ParseOptions,
    ParsedTable, UniversalFileParser,
};

// API
pub use api::ImportApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "报表数据导入平台";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
