// ==========================================
// 报表数据导入平台 - API 层
// ==========================================
// 职责: 对外业务接口（导入五阶段 + 作业查询）
// ==========================================

// 模块声明
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{
    CommitApiRequest, CommitApiResponse, ImportApi, MapApiRequest, MapApiResponse,
    ParseApiRequest, ParseApiResponse, UploadApiRequest, UploadApiResponse, ValidateApiResponse,
};
