// ==========================================
// 报表数据导入平台 - 领域层
// ==========================================
// 职责: 实体定义、基础类型、数据集 schema 注册表
// 红线: 领域层不含 I/O，不依赖仓储层
// ==========================================

// 模块声明
pub mod facts;
pub mod job;
pub mod schema;
pub mod types;

// 重导出核心实体
pub use facts::{FactRow, FunnelFact, MarketShareFact, OrgUnitFact, ProductionFact};
pub use job::{ColumnMapping, ImportFileRecord, ImportIssue, ImportJob, ImportedRow};
pub use schema::{schema_for, DatasetSchema, FieldSpec};
