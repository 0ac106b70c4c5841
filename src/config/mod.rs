// ==========================================
// 报表数据导入平台 - 配置层
// ==========================================
// 职责: 导入管道配置读取（预览上限/扫描上限/模糊阈值/存储目录）
// 存储: config_kv 表（scope_id='global'），无覆盖时取默认值
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

pub use config_manager::ConfigManager;
pub use import_config_trait::ImportConfigReader;

/// 默认预览行数上限
pub const DEFAULT_PREVIEW_CAP: usize = 200;

/// 默认表头扫描行数上限
pub const DEFAULT_SCAN_LIMIT: usize = 60;

/// 默认表头模糊匹配相似度阈值
pub const DEFAULT_FUZZY_CUTOFF: f64 = 0.8;

/// 默认上传文件存储目录
pub const DEFAULT_STORAGE_DIR: &str = "import_store";
