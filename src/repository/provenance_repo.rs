// ==========================================
// 报表数据导入平台 - 溯源 Repository Trait
// ==========================================
// 职责: 定义作业/文件/映射/问题/原始行的数据访问接口（不含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::job::{ColumnMapping, ImportFileRecord, ImportIssue, ImportJob, ImportedRow};
use crate::domain::types::JobStatus;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ProvenanceRepository Trait
// ==========================================
// 用途: 导入管道全部溯源数据访问
// 实现者: SqliteProvenanceRepository（使用 rusqlite）
#[async_trait]
pub trait ProvenanceRepository: Send + Sync {
    // ===== 作业 =====

    /// 插入新作业（审计锚点，只增不删）
    async fn insert_job(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按当前内存状态整体更新作业
    async fn update_job(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按作业 ID 查询
    async fn get_job(&self, job_id: &str) -> RepositoryResult<Option<ImportJob>>;

    /// 按创建时间倒序列出作业
    async fn list_jobs(&self, limit: usize) -> RepositoryResult<Vec<ImportJob>>;

    /// 条件状态转换（原子 CAS）
    ///
    /// # 参数
    /// - from: 允许的源状态集合
    /// - to: 目标状态
    ///
    /// # 返回
    /// - Ok(true): 转换成功（恰好命中一行）
    /// - Ok(false): 当前状态不在允许集合内，未转换
    async fn try_transition_status(
        &self,
        job_id: &str,
        from: &[JobStatus],
        to: JobStatus,
    ) -> RepositoryResult<bool>;

    // ===== 上传文件 =====

    async fn insert_file(&self, file: &ImportFileRecord) -> RepositoryResult<()>;

    /// 最近一次上传的文件（解析时以此为准）
    async fn latest_file(&self, job_id: &str) -> RepositoryResult<Option<ImportFileRecord>>;

    async fn files_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ImportFileRecord>>;

    // ===== 列映射 =====

    async fn insert_mapping(&self, mapping: &ColumnMapping) -> RepositoryResult<()>;

    /// 最近一次提交的映射（最新者生效）
    async fn latest_mapping(&self, job_id: &str) -> RepositoryResult<Option<ColumnMapping>>;

    async fn mappings_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ColumnMapping>>;

    // ===== 校验问题 =====

    /// 替换作业的问题集合（删除旧一轮后批量插入，事务化）
    async fn replace_issues(&self, job_id: &str, issues: &[ImportIssue])
        -> RepositoryResult<usize>;

    async fn issues_for_job(&self, job_id: &str, limit: usize)
        -> RepositoryResult<Vec<ImportIssue>>;

    // ===== 原始行快照 =====

    /// 替换作业的预览行（重新解析时覆盖，事务化）
    async fn replace_rows(&self, job_id: &str, rows: &[ImportedRow]) -> RepositoryResult<usize>;

    /// 读取预览行（落库重放来源）
    async fn rows_for_job(&self, job_id: &str) -> RepositoryResult<Vec<ImportedRow>>;

    // ===== 旧数字作业号桥接 =====

    async fn insert_legacy_alias(&self, legacy_id: i64, job_id: &str) -> RepositoryResult<()>;

    /// 旧数字作业号 → 主作业 ID（commit 的回退解析路径）
    async fn resolve_legacy_alias(&self, legacy_id: i64) -> RepositoryResult<Option<String>>;
}
