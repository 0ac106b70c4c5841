// ==========================================
// 报表数据导入平台 - 行级校验器实现
// ==========================================
// 职责: 按数据集类型执行软校验，产出问题记录
// 红线: 校验永不中断管道，问题只记录不阻断落库
// ==========================================

use crate::domain::job::ImportedRow;
use crate::domain::types::DatasetKind;
use crate::importer::traits::RowValidator;
use chrono::NaiveDate;
use std::collections::BTreeMap;

// ==========================================
// RowIssue - 单行校验问题
// ==========================================
// 用途: 校验器产物，由管道补全 issue_id/job_id 后落溯源表
#[derive(Debug, Clone)]
pub struct RowIssue {
    pub row_index: i64,
    pub field: Option<String>,
    pub message: String,
}

impl RowIssue {
    fn for_field(row_index: i64, field: &str, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    fn for_row(row_index: i64, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: None,
            message: message.into(),
        }
    }
}

/// 按映射取标准字段的值（未映射/空值均为 None）
pub fn mapped_value<'a>(
    row: &'a ImportedRow,
    mapping: &BTreeMap<String, String>,
    field: &str,
) -> Option<&'a str> {
    let column = mapping.get(field)?;
    let value = row.payload.get(column)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// 日期解析: 取前 10 个字符按 YYYY-MM-DD 解析
pub fn parse_period_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head: String = trimmed.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

/// 数值判定
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

// ==========================================
// DatasetRuleValidator - 数据集规则校验器
// ==========================================
pub struct DatasetRuleValidator;

impl DatasetRuleValidator {
    /// 业务量数据: 机构必填 + 日期可解析 + 指标值为数值
    fn validate_production(
        row: &ImportedRow,
        mapping: &BTreeMap<String, String>,
        issues: &mut Vec<RowIssue>,
    ) {
        if mapped_value(row, mapping, "org_unit").is_none() {
            issues.push(RowIssue::for_field(row.row_index, "org_unit", "机构标识缺失"));
        }

        match mapped_value(row, mapping, "period_date") {
            None => issues.push(RowIssue::for_field(
                row.row_index,
                "period_date",
                "统计日期缺失",
            )),
            Some(raw) if parse_period_date(raw).is_none() => issues.push(RowIssue::for_field(
                row.row_index,
                "period_date",
                format!("统计日期无法解析（期望 YYYY-MM-DD）: {}", raw),
            )),
            Some(_) => {}
        }

        match mapped_value(row, mapping, "value") {
            None => issues.push(RowIssue::for_field(row.row_index, "value", "指标值缺失")),
            Some(raw) if parse_number(raw).is_none() => issues.push(RowIssue::for_field(
                row.row_index,
                "value",
                format!("指标值非数值: {}", raw),
            )),
            Some(_) => {}
        }
    }

    /// 市场份额数据: 日期字段存在即可
    fn validate_marketing(
        row: &ImportedRow,
        mapping: &BTreeMap<String, String>,
        issues: &mut Vec<RowIssue>,
    ) {
        if mapped_value(row, mapping, "period_date").is_none() {
            issues.push(RowIssue::for_field(
                row.row_index,
                "period_date",
                "统计日期缺失",
            ));
        }
    }

    /// 漏斗数据: 机构必填 + 日期可解析 + 计数为数值
    fn validate_funnel(
        row: &ImportedRow,
        mapping: &BTreeMap<String, String>,
        issues: &mut Vec<RowIssue>,
    ) {
        if mapped_value(row, mapping, "org_unit").is_none() {
            issues.push(RowIssue::for_field(row.row_index, "org_unit", "机构标识缺失"));
        }

        match mapped_value(row, mapping, "period_date") {
            None => issues.push(RowIssue::for_field(
                row.row_index,
                "period_date",
                "统计日期缺失",
            )),
            Some(raw) if parse_period_date(raw).is_none() => issues.push(RowIssue::for_field(
                row.row_index,
                "period_date",
                format!("统计日期无法解析（期望 YYYY-MM-DD）: {}", raw),
            )),
            Some(_) => {}
        }

        match mapped_value(row, mapping, "count") {
            None => issues.push(RowIssue::for_field(row.row_index, "count", "迁移计数缺失")),
            Some(raw) if parse_number(raw).is_none() => issues.push(RowIssue::for_field(
                row.row_index,
                "count",
                format!("迁移计数非数值: {}", raw),
            )),
            Some(_) => {}
        }
    }

    /// 机构主数据: id 与类型均必填
    fn validate_org_units(
        row: &ImportedRow,
        mapping: &BTreeMap<String, String>,
        issues: &mut Vec<RowIssue>,
    ) {
        if mapped_value(row, mapping, "org_id").is_none() {
            issues.push(RowIssue::for_field(row.row_index, "org_id", "机构 ID 缺失"));
        }
        if mapped_value(row, mapping, "org_type").is_none() {
            issues.push(RowIssue::for_field(
                row.row_index,
                "org_type",
                "机构类型缺失",
            ));
        }
    }

    /// 未识别数据集: 仅拒绝整行为空
    fn validate_generic(row: &ImportedRow, issues: &mut Vec<RowIssue>) {
        if row.is_blank() {
            issues.push(RowIssue::for_row(row.row_index, "空行"));
        }
    }
}

impl RowValidator for DatasetRuleValidator {
    fn validate_rows(
        &self,
        kind: DatasetKind,
        mapping: &BTreeMap<String, String>,
        rows: &[ImportedRow],
    ) -> Vec<RowIssue> {
        let mut issues = Vec::new();

        for row in rows {
            match kind {
                DatasetKind::Production => Self::validate_production(row, mapping, &mut issues),
                DatasetKind::Marketing => Self::validate_marketing(row, mapping, &mut issues),
                DatasetKind::Funnel => Self::validate_funnel(row, mapping, &mut issues),
                DatasetKind::OrgUnits => Self::validate_org_units(row, mapping, &mut issues),
                DatasetKind::Generic => Self::validate_generic(row, &mut issues),
            }
        }

        issues
    }
}
