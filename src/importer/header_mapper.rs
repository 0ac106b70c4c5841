// ==========================================
// 报表数据导入平台 - 表头映射器
// ==========================================
// 职责: 标准字段 → 源列名解析
// 算法: 第一轮按归一化口径（忽略下划线）做精确匹配，按源列从左到右
//       顺序首个命中即止；精确无果才进入第二轮近似匹配（相似度阈值
//       0.8，单个最佳候选）。两轮皆无果的字段保持未映射，由下游容忍
// ==========================================

use crate::domain::schema::{schema_for, FieldSpec};
use crate::domain::types::DatasetKind;
use crate::importer::table_detector::normalize_header;
use crate::importer::traits::HeaderMapper;
use std::collections::BTreeMap;
use strsim::jaro_winkler;

// ==========================================
// SynonymHeaderMapper - 同义词映射器
// ==========================================
pub struct SynonymHeaderMapper {
    /// 近似匹配最低相似度
    cutoff: f64,
}

impl SynonymHeaderMapper {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }
}

impl Default for SynonymHeaderMapper {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FUZZY_CUTOFF)
    }
}

/// 精确匹配口径: 归一化后去掉下划线
fn exact_key(raw: &str) -> String {
    normalize_header(raw).replace('_', "")
}

/// 第一轮: 精确匹配（列名等于字段名本身或任一同义词，忽略大小写与下划线）
fn exact_match(field: &FieldSpec, columns: &[String]) -> Option<String> {
    for column in columns {
        let key = exact_key(column);
        if key.is_empty() {
            continue;
        }
        if key == exact_key(field.name)
            || field.synonyms.iter().any(|syn| key == exact_key(syn))
        {
            return Some(column.clone());
        }
    }
    None
}

/// 第二轮: 近似匹配（对每列取同义词表中的最佳相似度，首个达标列命中）
fn fuzzy_match(field: &FieldSpec, columns: &[String], cutoff: f64) -> Option<String> {
    for column in columns {
        let normalized = normalize_header(column);
        if normalized.is_empty() {
            continue;
        }

        let best = field
            .synonyms
            .iter()
            .chain(std::iter::once(&field.name))
            .map(|candidate| jaro_winkler(&normalized, &normalize_header(candidate)))
            .fold(0.0_f64, f64::max);

        if best >= cutoff {
            return Some(column.clone());
        }
    }
    None
}

impl HeaderMapper for SynonymHeaderMapper {
    /// 为数据集的每个标准字段解析至多一个源列
    fn propose_mapping(&self, kind: DatasetKind, columns: &[String]) -> BTreeMap<String, String> {
        let schema = schema_for(kind);
        let mut mapping = BTreeMap::new();

        for field in schema.fields {
            // 精确命中即止，近似轮不再参与该字段
            if let Some(column) = exact_match(field, columns) {
                mapping.insert(field.name.to_string(), column);
                continue;
            }
            if let Some(column) = fuzzy_match(field, columns, self.cutoff) {
                mapping.insert(field.name.to_string(), column);
            }
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_exact_match_ignores_case_and_underscores() {
        let mapper = SynonymHeaderMapper::default();
        let mapping = mapper.propose_mapping(
            DatasetKind::Marketing,
            &columns(&["ZIP", "Category", "Share"]),
        );
        assert_eq!(mapping.get("zip_code"), Some(&"ZIP".to_string()));
        assert_eq!(mapping.get("category"), Some(&"Category".to_string()));
        assert_eq!(mapping.get("share"), Some(&"Share".to_string()));
    }

    #[test]
    fn test_exact_match_short_circuits_fuzzy_pass() {
        // 阈值设为 2.0 使近似匹配永不达标；精确命中不受影响，
        // 证明精确命中的字段不会进入近似轮
        let mapper = SynonymHeaderMapper::new(2.0);
        let mapping = mapper.propose_mapping(
            DatasetKind::Marketing,
            &columns(&["zip", "categoryy", "share"]),
        );
        assert_eq!(mapping.get("zip_code"), Some(&"zip".to_string()));
        assert_eq!(mapping.get("share"), Some(&"share".to_string()));
        // 近拼写列只能走近似轮，在该阈值下应保持未映射
        assert_eq!(mapping.get("category"), None);
    }

    #[test]
    fn test_fuzzy_match_close_spelling() {
        let mapper = SynonymHeaderMapper::default();
        let mapping = mapper.propose_mapping(
            DatasetKind::Marketing,
            &columns(&["zipp", "categorie", "share"]),
        );
        // 近拼写在 0.8 阈值下应命中
        assert_eq!(mapping.get("zip_code"), Some(&"zipp".to_string()));
        assert_eq!(mapping.get("category"), Some(&"categorie".to_string()));
    }

    #[test]
    fn test_first_column_wins_on_exact_tie()
    {
        // 两列归一化后同为 value 同义词时，靠左的列生效
        let mapper = SynonymHeaderMapper::default();
        let mapping = mapper.propose_mapping(
            DatasetKind::Production,
            &columns(&["STN", "Date", "Service", "Value", "VALUE "]),
        );
        assert_eq!(mapping.get("value"), Some(&"Value".to_string()));
    }

    #[test]
    fn test_unmatched_field_stays_unmapped() {
        let mapper = SynonymHeaderMapper::default();
        let mapping = mapper.propose_mapping(
            DatasetKind::Production,
            &columns(&["STN", "Service", "Share"]),
        );
        // 无日期列，period_date 保持未映射
        assert_eq!(mapping.get("period_date"), None);
        assert_eq!(mapping.get("org_unit"), Some(&"STN".to_string()));
    }

    #[test]
    fn test_generic_kind_produces_empty_mapping() {
        let mapper = SynonymHeaderMapper::default();
        let mapping = mapper.propose_mapping(DatasetKind::Generic, &columns(&["a", "b"]));
        assert!(mapping.is_empty());
    }
}
