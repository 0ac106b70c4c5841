// ==========================================
// 报表数据导入平台 - 导入作业领域模型
// ==========================================
// 职责: 导入作业及其溯源实体（文件/映射/问题/原始行）
// 红线: import_job 为审计锚点，只增改不删除
// ==========================================

use crate::domain::types::{DatasetKind, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ImportJob - 导入作业
// ==========================================
// 用途: 管道每个阶段读写的作业主记录
// 对齐: import_job 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    // ===== 主键 =====
    pub job_id: String, // 作业 ID（UUID）

    // ===== 数据集信息 =====
    pub dataset_key: Option<DatasetKind>, // 数据集类型（map 阶段确定）
    pub source_system: Option<String>,    // 来源系统标识

    // ===== 上传文件信息 =====
    pub original_filename: Option<String>, // 原始文件名
    pub content_hash: Option<String>,      // 文件内容 SHA-256（十六进制）

    // ===== 状态与计数 =====
    pub status: JobStatus,        // 作业状态（见状态机）
    pub row_count: i64,           // 预览行数（parse 阶段写入）
    pub row_count_committed: i64, // 落库行数（commit 阶段写入）
    pub error_count: i64,         // 校验问题数（validate 阶段写入）

    // ===== 权限与备注 =====
    pub scope_id: Option<String>, // 归属范围标识（权限检查用）
    pub notes: Option<String>,    // 备注（含“需手工映射”标记）

    // ===== 解析快照 =====
    pub parsed_columns: Vec<String>, // 解析出的列名（保留原始从左到右顺序）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// 创建新的上传态作业
    pub fn new_uploaded(
        job_id: String,
        original_filename: Option<String>,
        content_hash: Option<String>,
        dataset_hint: Option<DatasetKind>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            dataset_key: dataset_hint,
            source_system: None,
            original_filename,
            content_hash,
            status: JobStatus::Uploaded,
            row_count: 0,
            row_count_committed: 0,
            error_count: 0,
            scope_id: None,
            notes: None,
            parsed_columns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// ImportFileRecord - 上传文件记录
// ==========================================
// 用途: 一个作业可累积多个文件（重新上传），最近一个为准
// 对齐: import_file 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFileRecord {
    pub file_id: String,              // 文件记录 ID（UUID）
    pub job_id: String,               // 关联作业
    pub stored_path: String,          // 落盘路径（受管存储目录内）
    pub content_type: Option<String>, // 内容类型
    pub size_bytes: i64,              // 文件大小
    pub uploaded_at: DateTime<Utc>,   // 上传时间
}

// ==========================================
// ColumnMapping - 列映射记录
// ==========================================
// 用途: 标准字段 → 源列名；一个作业可多次映射，最近一次生效
// 对齐: column_mapping 表（mapping 以 JSON 存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub mapping_id: String,               // 映射记录 ID（UUID）
    pub job_id: String,                   // 关联作业
    pub mapping: BTreeMap<String, String>, // 标准字段名 → 源列名
    pub created_at: DateTime<Utc>,
}

// ==========================================
// ImportIssue - 校验问题记录
// ==========================================
// 用途: 软校验产物，只记录不阻断
// 对齐: import_issue 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    pub issue_id: String,      // 问题记录 ID（UUID）
    pub job_id: String,        // 关联作业
    pub row_index: i64,        // 预览行下标（0 起）
    pub field: Option<String>, // 涉及标准字段（整行问题为 None）
    pub message: String,       // 问题描述
    pub created_at: DateTime<Utc>,
}

// ==========================================
// ImportedRow - 原始行快照
// ==========================================
// 用途: 预览行留存，落库阶段的重放来源
// 对齐: imported_row 表（payload 以 JSON 存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedRow {
    pub row_id: String,                    // 行记录 ID（UUID）
    pub job_id: String,                    // 关联作业
    pub dataset_key: Option<DatasetKind>,  // 数据集类型（留存当时的判定）
    pub row_index: i64,                    // 预览行下标（0 起）
    pub payload: BTreeMap<String, String>, // 列名 → 单元格值
    pub created_at: DateTime<Utc>,
}

impl ImportedRow {
    /// 整行是否为空（所有单元格去空白后为空）
    pub fn is_blank(&self) -> bool {
        self.payload.values().all(|v| v.trim().is_empty())
    }
}
