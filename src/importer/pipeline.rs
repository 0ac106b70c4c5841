// ==========================================
// 报表数据导入平台 - 导入管道编排器
// ==========================================
// 职责: 整合导入流程，作业状态机的唯一写入方
// 流程: upload → parse → map → validate → commit
//       各阶段独立调用、幂等、可重复触发
// 红线: 溯源写入（映射/问题/原始行）尽力而为，失败只记日志不反噬主操作；
//       落库经 committing 占位状态做原子互斥，杜绝并发双写
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::job::{ColumnMapping, ImportFileRecord, ImportIssue, ImportJob, ImportedRow};
use crate::domain::types::{CommitMode, DatasetKind, JobStatus};
use crate::importer::committer::{CommitEngine, CommitOutcome};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::ParseOptions;
use crate::importer::traits::{
    AllowAllGuard, DatasetClassifier, FileParser, HeaderMapper, RowValidator, ScopeGuard,
};
use crate::repository::fact_repo::FactRepository;
use crate::repository::provenance_repo::ProvenanceRepository;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 请求/结果结构
// ==========================================

/// 上传请求
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// 待导入文件路径
    pub source_path: PathBuf,
    /// 原始文件名（None 时取路径中的文件名）
    pub original_filename: Option<String>,
    /// 上传人标识
    pub uploaded_by: Option<String>,
    /// 目标数据集提示（可在 map 阶段覆盖）
    pub dataset_hint: Option<DatasetKind>,
}

/// 解析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseSummary {
    pub columns: Vec<String>,
    pub preview_rows: Vec<BTreeMap<String, String>>,
    pub row_count: usize,
    /// 结构无法自动识别，需手工映射
    pub mapping_required: bool,
}

/// 映射请求
#[derive(Debug, Clone, Default)]
pub struct MapRequest {
    pub job_id: String,
    /// 显式映射（None 时由分类器 + 映射器提案）
    pub mapping: Option<BTreeMap<String, String>>,
    /// 显式数据集类型（None 时取上传提示或分类结果）
    pub dataset_key: Option<DatasetKind>,
    pub source_system: Option<String>,
    pub scope: Option<String>,
    pub operator: Option<String>,
}

/// 映射结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSummary {
    pub dataset_key: DatasetKind,
    pub mapping: BTreeMap<String, String>,
    /// 分类器置信度（显式指定数据集时为 None）
    pub confidence: Option<f64>,
}

/// 校验结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub error_count: usize,
    pub sample_errors: Vec<ImportIssue>,
}

/// 作业全量视图（含关联溯源记录）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    pub job: ImportJob,
    pub files: Vec<ImportFileRecord>,
    pub mappings: Vec<ColumnMapping>,
    pub issues: Vec<ImportIssue>,
}

/// 校验结果采样条数
const SAMPLE_ERROR_LIMIT: usize = 10;

/// 按扩展名推断内容类型
fn guess_content_type(path: &Path) -> Option<String> {
    let ext = path.extension().and_then(|e| e.to_str())?.to_lowercase();
    let content_type = match ext.as_str() {
        "csv" | "tsv" | "txt" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "json" => "application/json",
        "sql" => "application/sql",
        _ => return None,
    };
    Some(content_type.to_string())
}

// ==========================================
// ImportPipeline - 导入管道
// ==========================================
pub struct ImportPipeline<P, F, C>
where
    P: ProvenanceRepository,
    F: FactRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    provenance: P,

    // 落库引擎
    commit_engine: CommitEngine<F>,

    // 配置读取器
    config: C,

    // 管道组件
    file_parser: Box<dyn FileParser>,
    classifier: Box<dyn DatasetClassifier>,
    header_mapper: Box<dyn HeaderMapper>,
    validator: Box<dyn RowValidator>,

    // 外部权限检查
    scope_guard: Box<dyn ScopeGuard>,
}

impl<P, F, C> ImportPipeline<P, F, C>
where
    P: ProvenanceRepository,
    F: FactRepository,
    C: ImportConfigReader,
{
    /// 创建管道实例（全组件显式注入）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provenance: P,
        fact_repo: F,
        config: C,
        file_parser: Box<dyn FileParser>,
        classifier: Box<dyn DatasetClassifier>,
        header_mapper: Box<dyn HeaderMapper>,
        validator: Box<dyn RowValidator>,
        scope_guard: Box<dyn ScopeGuard>,
    ) -> Self {
        Self {
            provenance,
            commit_engine: CommitEngine::new(fact_repo),
            config,
            file_parser,
            classifier,
            header_mapper,
            validator,
            scope_guard,
        }
    }

    /// 以默认组件组装（通用解析器 + 指纹分类器 + 同义词映射器 +
    /// 数据集规则校验器 + 全放行权限）
    pub fn with_defaults(provenance: P, fact_repo: F, config: C) -> Self {
        Self::new(
            provenance,
            fact_repo,
            config,
            Box::new(crate::importer::file_parser::UniversalFileParser),
            Box::new(crate::importer::classifier::FingerprintClassifier),
            Box::new(crate::importer::header_mapper::SynonymHeaderMapper::default()),
            Box::new(crate::importer::validator::DatasetRuleValidator),
            Box::new(AllowAllGuard),
        )
    }

    // ==========================================
    // 阶段 0: 上传
    // ==========================================

    /// 上传文件并创建作业
    ///
    /// # 返回
    /// - Ok(String): 作业 ID
    #[instrument(skip(self, request), fields(job_id))]
    pub async fn upload(&self, request: UploadRequest) -> ImportResult<String> {
        let source = request.source_path.as_path();
        if !source.exists() {
            return Err(ImportError::FileNotFound(source.display().to_string()));
        }

        let bytes = fs::read(source)?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        let job_id = Uuid::new_v4().to_string();
        let filename = request
            .original_filename
            .clone()
            .or_else(|| {
                source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_string())
            })
            .unwrap_or_else(|| "upload.dat".to_string());

        // 落盘到受管存储目录: <storage_dir>/<job_id>/<filename>
        let storage_dir = self
            .config
            .get_storage_dir()
            .await
            .map_err(|e| ImportError::InternalError(format!("读取存储目录配置失败: {}", e)))?;
        let job_dir = Path::new(&storage_dir).join(&job_id);
        fs::create_dir_all(&job_dir)
            .map_err(|e| ImportError::StorageError(format!("{}: {}", job_dir.display(), e)))?;
        let stored_path = job_dir.join(&filename);
        fs::copy(source, &stored_path)
            .map_err(|e| ImportError::StorageError(format!("{}: {}", stored_path.display(), e)))?;

        let mut job = ImportJob::new_uploaded(
            job_id.clone(),
            Some(filename.clone()),
            Some(content_hash),
            request.dataset_hint,
        );
        if let Some(uploader) = &request.uploaded_by {
            job.notes = Some(format!("uploaded_by={}", uploader));
        }

        self.provenance.insert_job(&job).await?;
        self.provenance
            .insert_file(&ImportFileRecord {
                file_id: Uuid::new_v4().to_string(),
                job_id: job_id.clone(),
                stored_path: stored_path.display().to_string(),
                content_type: guess_content_type(source),
                size_bytes: bytes.len() as i64,
                uploaded_at: Utc::now(),
            })
            .await?;

        info!(
            job_id = %job_id,
            filename = %filename,
            size = bytes.len(),
            "文件上传完成，作业已创建"
        );
        Ok(job_id)
    }

    /// 为既有作业追加上传文件（重新上传），最近文件为解析依据
    #[instrument(skip(self, source_path))]
    pub async fn attach_file(&self, job_id: &str, source_path: &Path) -> ImportResult<()> {
        let mut job = self.require_job(job_id).await?;

        if !source_path.exists() {
            return Err(ImportError::FileNotFound(source_path.display().to_string()));
        }
        let bytes = fs::read(source_path)?;
        let filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.dat")
            .to_string();

        let storage_dir = self
            .config
            .get_storage_dir()
            .await
            .map_err(|e| ImportError::InternalError(format!("读取存储目录配置失败: {}", e)))?;
        let job_dir = Path::new(&storage_dir).join(job_id);
        fs::create_dir_all(&job_dir)
            .map_err(|e| ImportError::StorageError(format!("{}: {}", job_dir.display(), e)))?;
        let stored_path = job_dir.join(&filename);
        fs::copy(source_path, &stored_path)
            .map_err(|e| ImportError::StorageError(format!("{}: {}", stored_path.display(), e)))?;

        self.provenance
            .insert_file(&ImportFileRecord {
                file_id: Uuid::new_v4().to_string(),
                job_id: job_id.to_string(),
                stored_path: stored_path.display().to_string(),
                content_type: guess_content_type(source_path),
                size_bytes: bytes.len() as i64,
                uploaded_at: Utc::now(),
            })
            .await?;

        // 新文件使既有解析/校验结果失效，作业回到上传态
        job.content_hash = Some(format!("{:x}", Sha256::digest(&bytes)));
        job.original_filename = Some(filename);
        job.status = JobStatus::Uploaded;
        self.provenance.update_job(&job).await?;

        info!(job_id = %job_id, "重新上传完成，作业回到 uploaded");
        Ok(())
    }

    // ==========================================
    // 阶段 1: 解析
    // ==========================================

    /// 解析最近上传的文件，留存预览行
    #[instrument(skip(self))]
    pub async fn parse(
        &self,
        job_id: &str,
        sheet: Option<String>,
        max_preview: Option<usize>,
    ) -> ImportResult<ParseSummary> {
        let mut job = self.require_job(job_id).await?;

        let file = self
            .provenance
            .latest_file(job_id)
            .await?
            .ok_or_else(|| ImportError::MissingUploadedFile(job_id.to_string()))?;

        let options = ParseOptions {
            sheet,
            max_preview: match max_preview {
                Some(cap) if cap > 0 => cap,
                _ => self
                    .config
                    .get_preview_cap()
                    .await
                    .map_err(|e| ImportError::InternalError(format!("读取预览上限失败: {}", e)))?,
            },
            scan_limit: self
                .config
                .get_scan_limit()
                .await
                .map_err(|e| ImportError::InternalError(format!("读取扫描上限失败: {}", e)))?,
        };

        debug!(job_id = %job_id, path = %file.stored_path, "开始解析文件");
        let parsed = match self
            .file_parser
            .parse_preview(Path::new(&file.stored_path), &options)
        {
            Ok(parsed) => parsed,
            Err(e) => {
                // 结构性失败: 标记需手工映射后原样返回错误（唯一阻断层级）
                job.notes = Some(format!("mapping required: {}", e));
                if let Err(update_err) = self.provenance.update_job(&job).await {
                    warn!(job_id = %job_id, error = %update_err, "写入映射标记失败");
                }
                return Err(e);
            }
        };

        // 留存预览行（溯源写入，失败只告警）
        let now = Utc::now();
        let rows: Vec<ImportedRow> = parsed
            .rows
            .iter()
            .enumerate()
            .map(|(idx, payload)| ImportedRow {
                row_id: Uuid::new_v4().to_string(),
                job_id: job_id.to_string(),
                dataset_key: job.dataset_key,
                row_index: idx as i64,
                payload: payload.clone(),
                created_at: now,
            })
            .collect();

        if let Err(e) = self.provenance.replace_rows(job_id, &rows).await {
            warn!(job_id = %job_id, error = %e, "预览行留存失败");
        }

        job.row_count = rows.len() as i64;
        job.parsed_columns = parsed.columns.clone();
        job.status = JobStatus::Parsed;
        if parsed.mapping_required {
            job.notes = Some("mapping required: 结构未识别".to_string());
        }
        self.provenance.update_job(&job).await?;

        info!(
            job_id = %job_id,
            columns = parsed.columns.len(),
            rows = rows.len(),
            mapping_required = parsed.mapping_required,
            "解析完成"
        );

        Ok(ParseSummary {
            columns: parsed.columns,
            preview_rows: parsed.rows,
            row_count: rows.len(),
            mapping_required: parsed.mapping_required,
        })
    }

    // ==========================================
    // 阶段 2: 映射
    // ==========================================

    /// 确定数据集类型与列映射（显式优先，缺省走分类器提案）
    #[instrument(skip(self, request), fields(job_id = %request.job_id))]
    pub async fn map(&self, request: MapRequest) -> ImportResult<MapSummary> {
        let mut job = self.require_job(&request.job_id).await?;

        let target_scope = request.scope.clone().or_else(|| job.scope_id.clone());
        self.ensure_scope(request.operator.as_deref(), target_scope.as_deref())
            .await?;

        // 数据集判定: 显式 > 上传提示 > 分类器
        let mut confidence = None;
        let kind = match request.dataset_key.or(job.dataset_key) {
            Some(kind) => kind,
            None => {
                if job.parsed_columns.is_empty() {
                    return Err(ImportError::MappingRequired(job.job_id.clone()));
                }
                let classified = self.classifier.classify(&job.parsed_columns);
                confidence = Some(classified.confidence);
                classified.kind
            }
        };

        // 映射确定: 显式 > 映射器提案（提案需要解析出的列清单）
        let mapping = match request.mapping {
            Some(mapping) => mapping,
            None => {
                if job.parsed_columns.is_empty() {
                    return Err(ImportError::MappingRequired(job.job_id.clone()));
                }
                self.header_mapper.propose_mapping(kind, &job.parsed_columns)
            }
        };

        // 映射留存（溯源写入，失败只告警）
        let record = ColumnMapping {
            mapping_id: Uuid::new_v4().to_string(),
            job_id: job.job_id.clone(),
            mapping: mapping.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.provenance.insert_mapping(&record).await {
            warn!(job_id = %job.job_id, error = %e, "映射留存失败");
        }

        job.dataset_key = Some(kind);
        if request.source_system.is_some() {
            job.source_system = request.source_system;
        }
        if request.scope.is_some() {
            job.scope_id = request.scope;
        }
        job.status = JobStatus::Mapped;
        self.provenance.update_job(&job).await?;

        info!(
            job_id = %job.job_id,
            dataset = %kind,
            mapped_fields = mapping.len(),
            "映射完成"
        );

        Ok(MapSummary {
            dataset_key: kind,
            mapping,
            confidence,
        })
    }

    // ==========================================
    // 阶段 3: 校验
    // ==========================================

    /// 对留存的预览行执行软校验，问题只记录不阻断
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        job_id: &str,
        operator: Option<&str>,
    ) -> ImportResult<ValidationSummary> {
        let mut job = self.require_job(job_id).await?;

        if !matches!(
            job.status,
            JobStatus::Mapped
                | JobStatus::Validated
                | JobStatus::ValidatedWithErrors
                | JobStatus::Committed
        ) {
            return Err(ImportError::InvalidStateTransition {
                from: job.status.to_string(),
                to: "validated".to_string(),
            });
        }

        self.ensure_scope(operator, job.scope_id.as_deref()).await?;

        let kind = job.dataset_key.unwrap_or(DatasetKind::Generic);
        let mapping = self
            .provenance
            .latest_mapping(job_id)
            .await?
            .map(|m| m.mapping)
            .unwrap_or_default();
        let rows = self.provenance.rows_for_job(job_id).await?;

        let row_issues = self.validator.validate_rows(kind, &mapping, &rows);
        let now = Utc::now();
        let issues: Vec<ImportIssue> = row_issues
            .into_iter()
            .map(|issue| ImportIssue {
                issue_id: Uuid::new_v4().to_string(),
                job_id: job_id.to_string(),
                row_index: issue.row_index,
                field: issue.field,
                message: issue.message,
                created_at: now,
            })
            .collect();

        // 问题留存（溯源写入，失败只告警，计数仍按本轮结果）
        if let Err(e) = self.provenance.replace_issues(job_id, &issues).await {
            warn!(job_id = %job_id, error = %e, "校验问题留存失败");
        }

        job.error_count = issues.len() as i64;
        job.status = if issues.is_empty() {
            JobStatus::Validated
        } else {
            JobStatus::ValidatedWithErrors
        };
        self.provenance.update_job(&job).await?;

        info!(
            job_id = %job_id,
            dataset = %kind,
            error_count = issues.len(),
            "校验完成"
        );

        Ok(ValidationSummary {
            error_count: issues.len(),
            sample_errors: issues.into_iter().take(SAMPLE_ERROR_LIMIT).collect(),
        })
    }

    // ==========================================
    // 阶段 4: 落库
    // ==========================================

    /// 将预览行投影进事实表
    ///
    /// 说明:
    /// - 允许跳过校验直接从 mapped 落库（刻意的宽松语义）
    /// - 作业号先按主存储解析，失败时回退旧数字作业号桥接
    /// - 经 committing 占位状态做原子互斥，并发提交返回 CommitInProgress
    #[instrument(skip(self))]
    pub async fn commit(
        &self,
        job_ref: &str,
        mode: CommitMode,
        operator: Option<&str>,
    ) -> ImportResult<CommitOutcome> {
        let job = self.resolve_job(job_ref).await?;
        let job_id = job.job_id.clone();

        self.ensure_scope(operator, job.scope_id.as_deref()).await?;

        if job.status == JobStatus::Committing {
            return Err(ImportError::CommitInProgress(job_id));
        }
        if !job.status.can_commit() {
            return Err(ImportError::InvalidStateTransition {
                from: job.status.to_string(),
                to: JobStatus::Committing.to_string(),
            });
        }

        // 原子占位: 两个并发 commit 只有一个能完成该转换
        let acquired = self
            .provenance
            .try_transition_status(
                &job_id,
                &[
                    JobStatus::Mapped,
                    JobStatus::Validated,
                    JobStatus::ValidatedWithErrors,
                    JobStatus::Committed,
                ],
                JobStatus::Committing,
            )
            .await?;
        if !acquired {
            return Err(ImportError::CommitInProgress(job_id));
        }

        let previous_status = job.status;
        let outcome = self.run_commit(&job, mode).await;

        match outcome {
            Ok(outcome) => {
                let mut fresh = self.require_job(&job_id).await?;
                fresh.row_count_committed = outcome.committed as i64;
                fresh.status = JobStatus::Committed;
                self.provenance.update_job(&fresh).await?;
                Ok(outcome)
            }
            Err(e) => {
                // 失败回滚占位状态，保持可重试
                if let Ok(false) | Err(_) = self
                    .provenance
                    .try_transition_status(&job_id, &[JobStatus::Committing], previous_status)
                    .await
                {
                    warn!(job_id = %job_id, "落库失败后状态回退未生效");
                }
                Err(e)
            }
        }
    }

    /// 落库主体（状态占位之后执行）
    async fn run_commit(&self, job: &ImportJob, mode: CommitMode) -> ImportResult<CommitOutcome> {
        let kind = job.dataset_key.unwrap_or(DatasetKind::Generic);
        let mapping = self
            .provenance
            .latest_mapping(&job.job_id)
            .await?
            .map(|m| m.mapping)
            .unwrap_or_default();
        let rows = self.provenance.rows_for_job(&job.job_id).await?;

        self.commit_engine
            .commit_rows(
                kind,
                mode,
                &mapping,
                &rows,
                job.source_system.as_deref(),
                &job.job_id,
            )
            .await
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 作业全量视图（含文件/映射/问题）
    pub async fn get_job_detail(&self, job_ref: &str) -> ImportResult<JobDetail> {
        let job = self.resolve_job(job_ref).await?;
        let files = self.provenance.files_for_job(&job.job_id).await?;
        let mappings = self.provenance.mappings_for_job(&job.job_id).await?;
        let issues = self
            .provenance
            .issues_for_job(&job.job_id, 10_000)
            .await?;
        Ok(JobDetail {
            job,
            files,
            mappings,
            issues,
        })
    }

    /// 按创建时间倒序列出作业
    pub async fn list_jobs(&self, limit: usize) -> ImportResult<Vec<ImportJob>> {
        Ok(self.provenance.list_jobs(limit).await?)
    }

    /// 登记旧数字作业号桥接（旧系统迁移期使用）
    pub async fn register_legacy_alias(&self, legacy_id: i64, job_id: &str) -> ImportResult<()> {
        // 目标作业必须存在于主存储
        self.require_job(job_id).await?;
        self.provenance.insert_legacy_alias(legacy_id, job_id).await?;
        Ok(())
    }

    /// 事实表读访问（看板/归档协作方契约）
    pub fn fact_repo(&self) -> &F {
        self.commit_engine.fact_repo()
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 仅按主存储解析作业
    async fn require_job(&self, job_id: &str) -> ImportResult<ImportJob> {
        self.provenance
            .get_job(job_id)
            .await?
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()))
    }

    /// 主存储优先，回退旧数字作业号桥接
    async fn resolve_job(&self, job_ref: &str) -> ImportResult<ImportJob> {
        if let Some(job) = self.provenance.get_job(job_ref).await? {
            return Ok(job);
        }

        if let Ok(legacy_id) = job_ref.trim().parse::<i64>() {
            if let Some(job_id) = self.provenance.resolve_legacy_alias(legacy_id).await? {
                debug!(legacy_id = legacy_id, job_id = %job_id, "旧数字作业号命中");
                if let Some(job) = self.provenance.get_job(&job_id).await? {
                    return Ok(job);
                }
            }
        }

        Err(ImportError::JobNotFound(job_ref.to_string()))
    }

    /// 权限检查（作业无归属范围时直接放行）
    async fn ensure_scope(
        &self,
        operator: Option<&str>,
        scope: Option<&str>,
    ) -> ImportResult<()> {
        let scope = match scope {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(()),
        };
        let caller = operator.unwrap_or("anonymous").to_string();

        match self.scope_guard.check_scope(operator, scope).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ImportError::PermissionDenied {
                caller,
                scope: scope.to_string(),
            }),
            Err(e) => {
                // 检查本身失败视同拒绝
                warn!(scope = %scope, error = %e, "权限检查失败");
                Err(ImportError::PermissionDenied {
                    caller,
                    scope: scope.to_string(),
                })
            }
        }
    }
}
