// ==========================================
// 报表数据导入API
// ==========================================
// 职责: 封装导入管道五个阶段 + 作业查询的对外接口
// 形态: 每次调用独立组装管道（各自持有连接，事务互不共享）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::job::{ImportIssue, ImportJob};
use crate::domain::types::{CommitMode, DatasetKind};
use crate::importer::pipeline::{ImportPipeline, JobDetail, MapRequest, UploadRequest};
use crate::importer::traits::{AllowAllGuard, ScopeGuard};
use crate::importer::{
    DatasetRuleValidator, FingerprintClassifier, SynonymHeaderMapper, UniversalFileParser,
};
use crate::repository::{SqliteFactRepository, SqliteProvenanceRepository};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 上传请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadApiRequest {
    /// 待导入文件路径
    pub file_path: String,
    /// 原始文件名（可选，默认取路径文件名）
    pub original_filename: Option<String>,
    /// 上传人标识
    pub uploaded_by: Option<String>,
    /// 目标数据集提示
    pub dataset_hint: Option<String>,
}

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadApiResponse {
    pub job_id: String,
}

/// 解析请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseApiRequest {
    pub import_job_id: String,
    pub sheet: Option<String>,
    pub max_preview: Option<usize>,
}

/// 解析响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseApiResponse {
    pub columns: Vec<String>,
    pub preview_rows: Vec<BTreeMap<String, String>>,
    pub row_count: usize,
    /// 结构未识别，需手工提供映射
    pub mapping_required: bool,
}

/// 映射请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapApiRequest {
    pub import_job_id: String,
    /// 标准字段 → 源列名（缺省由分类器提案）
    pub mapping: Option<BTreeMap<String, String>>,
    /// 数据集键名（production/marketing/funnel/org_units/generic）
    pub dataset_key: Option<String>,
    pub source_system: Option<String>,
    pub scope: Option<String>,
    pub operator: Option<String>,
}

/// 映射响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapApiResponse {
    pub dataset_key: String,
    pub mapping: BTreeMap<String, String>,
    /// 分类器置信度（显式指定数据集时为 None）
    pub confidence: Option<f64>,
}

/// 校验响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateApiResponse {
    pub error_count: usize,
    pub sample_errors: Vec<ImportIssue>,
}

/// 落库请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitApiRequest {
    /// 作业 ID（支持旧数字作业号）
    pub import_job_id: String,
    /// 落库模式: append / replace
    pub mode: String,
    pub operator: Option<String>,
}

/// 落库响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitApiResponse {
    pub committed_rows: usize,
    pub skipped_rows: usize,
}

/// 共享权限检查的转发包装（管道按调用组装，检查器全局共享）
struct SharedGuard(Arc<dyn ScopeGuard>);

#[async_trait]
impl ScopeGuard for SharedGuard {
    async fn check_scope(
        &self,
        caller: Option<&str>,
        scope: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.0.check_scope(caller, scope).await
    }
}

// ==========================================
// ImportApi - 导入接口
// ==========================================
pub struct ImportApi {
    db_path: String,
    scope_guard: Arc<dyn ScopeGuard>,
}

impl ImportApi {
    /// 创建新的 ImportApi 实例（权限检查默认全放行）
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            scope_guard: Arc::new(AllowAllGuard),
        }
    }

    /// 接入外部权限检查器
    pub fn with_guard(db_path: String, scope_guard: Arc<dyn ScopeGuard>) -> Self {
        Self {
            db_path,
            scope_guard,
        }
    }

    /// 组装一次调用所用的管道（独立连接 + schema 就绪）
    async fn create_pipeline(
        &self,
    ) -> ApiResult<ImportPipeline<SqliteProvenanceRepository, SqliteFactRepository, ConfigManager>>
    {
        // schema 幂等初始化
        crate::db::open_and_init(&self.db_path)
            .map_err(|e| ApiError::DatabaseError(format!("数据库初始化失败: {}", e)))?;

        let provenance = SqliteProvenanceRepository::new(&self.db_path)?;
        let fact_repo = SqliteFactRepository::new(&self.db_path)?;
        let config = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::DatabaseError(format!("创建配置管理器失败: {}", e)))?;

        let cutoff = config
            .get_fuzzy_cutoff()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取模糊阈值失败: {}", e)))?;

        Ok(ImportPipeline::new(
            provenance,
            fact_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(FingerprintClassifier),
            Box::new(SynonymHeaderMapper::new(cutoff)),
            Box::new(DatasetRuleValidator),
            Box::new(SharedGuard(Arc::clone(&self.scope_guard))),
        ))
    }

    /// 上传文件，创建导入作业
    pub async fn upload(&self, request: UploadApiRequest) -> ApiResult<UploadApiResponse> {
        let pipeline = self.create_pipeline().await?;
        let job_id = pipeline
            .upload(UploadRequest {
                source_path: PathBuf::from(&request.file_path),
                original_filename: request.original_filename,
                uploaded_by: request.uploaded_by,
                dataset_hint: request.dataset_hint.as_deref().map(DatasetKind::from_key),
            })
            .await?;
        Ok(UploadApiResponse { job_id })
    }

    /// 解析预览
    pub async fn parse(&self, request: ParseApiRequest) -> ApiResult<ParseApiResponse> {
        let pipeline = self.create_pipeline().await?;
        let summary = pipeline
            .parse(&request.import_job_id, request.sheet, request.max_preview)
            .await?;
        Ok(ParseApiResponse {
            columns: summary.columns,
            preview_rows: summary.preview_rows,
            row_count: summary.row_count,
            mapping_required: summary.mapping_required,
        })
    }

    /// 确定数据集与列映射
    pub async fn map_columns(&self, request: MapApiRequest) -> ApiResult<MapApiResponse> {
        let pipeline = self.create_pipeline().await?;
        let summary = pipeline
            .map(MapRequest {
                job_id: request.import_job_id,
                mapping: request.mapping,
                dataset_key: request.dataset_key.as_deref().map(DatasetKind::from_key),
                source_system: request.source_system,
                scope: request.scope,
                operator: request.operator,
            })
            .await?;
        Ok(MapApiResponse {
            dataset_key: summary.dataset_key.as_key().to_string(),
            mapping: summary.mapping,
            confidence: summary.confidence,
        })
    }

    /// 行级软校验
    pub async fn validate(
        &self,
        import_job_id: &str,
        operator: Option<&str>,
    ) -> ApiResult<ValidateApiResponse> {
        let pipeline = self.create_pipeline().await?;
        let summary = pipeline.validate(import_job_id, operator).await?;
        Ok(ValidateApiResponse {
            error_count: summary.error_count,
            sample_errors: summary.sample_errors,
        })
    }

    /// 落库（append / replace）
    pub async fn commit(&self, request: CommitApiRequest) -> ApiResult<CommitApiResponse> {
        let mode = CommitMode::from_str(&request.mode).ok_or_else(|| {
            ApiError::InvalidInput(format!(
                "无效的落库模式: {}，应为 append/replace",
                request.mode
            ))
        })?;

        let pipeline = self.create_pipeline().await?;
        let outcome = pipeline
            .commit(&request.import_job_id, mode, request.operator.as_deref())
            .await?;
        Ok(CommitApiResponse {
            committed_rows: outcome.committed,
            skipped_rows: outcome.skipped,
        })
    }

    /// 作业全量视图（含文件/映射/问题；支持旧数字作业号）
    pub async fn get_job(&self, job_ref: &str) -> ApiResult<JobDetail> {
        let pipeline = self.create_pipeline().await?;
        Ok(pipeline.get_job_detail(job_ref).await?)
    }

    /// 按创建时间倒序列出作业
    pub async fn list_jobs(&self, limit: usize) -> ApiResult<Vec<ImportJob>> {
        let pipeline = self.create_pipeline().await?;
        // 上限夹在 1-500，避免无界查询
        Ok(pipeline.list_jobs(limit.clamp(1, 500)).await?)
    }

    /// 登记旧数字作业号 → 主作业 ID 的桥接
    pub async fn link_legacy_job(&self, legacy_id: i64, job_id: &str) -> ApiResult<()> {
        let pipeline = self.create_pipeline().await?;
        Ok(pipeline.register_legacy_alias(legacy_id, job_id).await?)
    }
}
