// ==========================================
// 报表数据导入平台 - 数据仓储层
// ==========================================
// 职责: 溯源表与事实表的数据访问
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

// 模块声明
pub mod error;
pub mod fact_repo;
pub mod provenance_repo;
pub mod provenance_repo_impl;

// 重导出核心类型
pub use error::{RepositoryError, RepositoryResult};
pub use fact_repo::{FactRepository, SqliteFactRepository};
pub use provenance_repo::ProvenanceRepository;
pub use provenance_repo_impl::SqliteProvenanceRepository;
