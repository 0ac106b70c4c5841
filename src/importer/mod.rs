// ==========================================
// 报表数据导入平台 - 导入层
// ==========================================
// 职责: 外部报表的结构推断、映射、校验与落库
// 支持: 分隔文本 / Excel / JSON / SQL 导出文本
// ==========================================

// 模块声明
pub mod classifier;
pub mod committer;
pub mod error;
pub mod file_parser;
pub mod header_mapper;
pub mod pipeline;
pub mod sql_dump;
pub mod table_detector;
pub mod traits;
pub mod validator;

// 重导出核心类型
pub use classifier::{ClassifiedDataset, FingerprintClassifier};
pub use committer::{project_row, CommitEngine, CommitOutcome};
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    DelimitedParser, JsonParser, ParseOptions, ParsedTable, SpreadsheetParser, UniversalFileParser,
};
pub use header_mapper::SynonymHeaderMapper;
pub use pipeline::{
    ImportPipeline, JobDetail, MapRequest, MapSummary, ParseSummary, UploadRequest,
    ValidationSummary,
};
pub use sql_dump::SqlDumpParser;
pub use table_detector::{
    detect_table, normalize_header, score_header_row, DetectedTable, SheetGrid,
};
pub use validator::{DatasetRuleValidator, RowIssue};

// 重导出 Trait 接口
pub use traits::{
    AllowAllGuard, DatasetClassifier, FileParser, HeaderMapper, RowValidator, ScopeGuard,
};
