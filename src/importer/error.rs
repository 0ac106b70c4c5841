// ==========================================
// 报表数据导入平台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: 结构性失败（阻断）/ 校验问题（软记录）/ 落库跳过（计数）
//       仅结构性失败以错误形式返回
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.tsv/.txt/.xlsx/.xls/.json/.sql）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("文件存储失败: {0}")]
    StorageError(String),

    // ===== 解析错误 =====
    #[error("分隔文本解析失败: {0}")]
    DelimitedParseError(String),

    #[error("Excel 解析失败: {0}")]
    SpreadsheetParseError(String),

    #[error("JSON 解析失败: {0}")]
    JsonParseError(String),

    #[error("未检测到数据表（所有候选行得分为 0）")]
    NoTableDetected,

    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    // ===== 作业状态错误 =====
    #[error("作业不存在: {0}")]
    JobNotFound(String),

    #[error("作业无已上传文件: {0}")]
    MissingUploadedFile(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("作业正在落库中，拒绝并发提交: {0}")]
    CommitInProgress(String),

    #[error("缺少列映射，需手工提供映射后重试: {0}")]
    MappingRequired(String),

    // ===== 权限错误 =====
    #[error("权限不足: caller={caller} scope={scope}")]
    PermissionDenied { caller: String, scope: String },

    // ===== 数据库错误 =====
    #[error("数据库操作失败: {0}")]
    DatabaseError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::DelimitedParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::SpreadsheetParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::JsonParseError(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<crate::repository::error::RepositoryError> for ImportError {
    fn from(err: crate::repository::error::RepositoryError) -> Self {
        ImportError::DatabaseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
