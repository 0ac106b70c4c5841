// ==========================================
// 报表数据导入平台 - 导入管道组件 Trait
// ==========================================
// 职责: 定义管道各阶段的组件接口（不包含实现）
// 说明: 组件以显式注入方式组装，不使用模块级全局状态
// ==========================================

use crate::domain::job::ImportedRow;
use crate::domain::types::DatasetKind;
use crate::importer::classifier::ClassifiedDataset;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{ParseOptions, ParsedTable};
use crate::importer::validator::RowIssue;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 格式解析接口（按文件种类多态）
// 实现者: DelimitedParser / SpreadsheetParser / JsonParser / SqlDumpParser
//         / UniversalFileParser（按扩展名分发）
pub trait FileParser: Send + Sync {
    /// 解析文件为限量预览表
    ///
    /// # 参数
    /// - file_path: 文件路径
    /// - options: 工作表选择、预览上限、扫描上限
    ///
    /// # 返回
    /// - Ok(ParsedTable): 列名 + 预览行（mapping_required 表示结构不可识别）
    /// - Err: 文件缺失、格式不支持、结构性解析失败
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable>;
}

// ==========================================
// DatasetClassifier Trait
// ==========================================
// 用途: 表头指纹 → 数据集类型
// 实现者: FingerprintClassifier
pub trait DatasetClassifier: Send + Sync {
    /// 对表头集合做数据集判定，返回类型与置信度
    fn classify(&self, headers: &[String]) -> ClassifiedDataset;
}

// ==========================================
// HeaderMapper Trait
// ==========================================
// 用途: 标准字段 → 源列名解析
// 实现者: SynonymHeaderMapper
pub trait HeaderMapper: Send + Sync {
    /// 为数据集的每个标准字段解析至多一个源列；
    /// 无法解析的字段不出现在结果中，由下游容忍
    fn propose_mapping(&self, kind: DatasetKind, columns: &[String]) -> BTreeMap<String, String>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 按数据集类型执行行级软校验
// 实现者: DatasetRuleValidator
pub trait RowValidator: Send + Sync {
    /// 校验预览行，返回问题列表（软校验，永不中断）
    ///
    /// # 参数
    /// - kind: 数据集类型
    /// - mapping: 标准字段 → 源列名
    /// - rows: 待校验的原始行快照
    fn validate_rows(
        &self,
        kind: DatasetKind,
        mapping: &BTreeMap<String, String>,
        rows: &[ImportedRow],
    ) -> Vec<RowIssue>;
}

// ==========================================
// ScopeGuard Trait
// ==========================================
// 用途: 外部权限检查（allow/deny），map/validate/commit 前消费
// 说明: 实现由外部协作方提供，本仓库只消费不实现业务语义
#[async_trait]
pub trait ScopeGuard: Send + Sync {
    /// 判定调用方是否可操作目标范围
    ///
    /// # 返回
    /// - Ok(true): 放行
    /// - Ok(false): 拒绝
    /// - Err: 检查本身失败（视同拒绝由调用方处置）
    async fn check_scope(
        &self,
        caller: Option<&str>,
        scope: &str,
    ) -> Result<bool, Box<dyn Error + Send + Sync>>;
}

// ==========================================
// AllowAllGuard - 默认放行实现
// ==========================================
// 用途: 未接入权限系统的部署形态（CLI/测试）
pub struct AllowAllGuard;

#[async_trait]
impl ScopeGuard for AllowAllGuard {
    async fn check_scope(
        &self,
        _caller: Option<&str>,
        _scope: &str,
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(true)
    }
}
