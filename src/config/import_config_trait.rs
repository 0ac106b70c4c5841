// ==========================================
// 报表数据导入平台 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取预览行数上限
    ///
    /// # 默认值
    /// - 200
    ///
    /// # 用途
    /// - parse 阶段截断预览行，限制内存占用
    async fn get_preview_cap(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取表头扫描行数上限
    ///
    /// # 默认值
    /// - 60
    ///
    /// # 用途
    /// - TableDetector 对每个工作表扫描的候选行数
    async fn get_scan_limit(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取表头模糊匹配相似度阈值
    ///
    /// # 默认值
    /// - 0.8
    ///
    /// # 用途
    /// - HeaderMapper 第二轮近似匹配的最低相似度
    async fn get_fuzzy_cutoff(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取上传文件存储目录
    ///
    /// # 默认值
    /// - "import_store"
    async fn get_storage_dir(&self) -> Result<String, Box<dyn Error>>;
}
