// ==========================================
// 报表数据导入平台 - SQL 导出文本解析器
// ==========================================
// 红线: 上传的 SQL 永不执行，只做文本匹配提取
// 流程: INSERT INTO <表>(<列>) VALUES (...) 模式优先；
//       退化为仅 VALUES 元组（合成列名）；
//       两者皆无时返回“需手工映射”信号而非报错
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{ParseOptions, ParsedTable};
use crate::importer::traits::FileParser;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// INSERT INTO <表>(<列...>) VALUES 头部
static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)insert\s+into\s+[`"\[]?([A-Za-z0-9_.]+)[`"\]]?\s*\(([^)]*)\)\s*values"#)
        .expect("INSERT 模式应能编译")
});

/// 裸 VALUES 关键字（退化路径）
static VALUES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvalues\b").expect("VALUES 模式应能编译"));

// ==========================================
// SqlDumpParser - SQL 导出解析器
// ==========================================
pub struct SqlDumpParser;

/// 清洗列名（去引号/反引号/方括号）
fn clean_column(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']' || c == '\'')
        .trim()
        .to_string()
}

/// 清洗元组值（去外层引号、还原双写引号、NULL → 空）
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return String::new();
    }
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            let inner = &trimmed[1..trimmed.len() - 1];
            let doubled: String = std::iter::repeat(quote).take(2).collect();
            return inner.replace(&doubled, &quote.to_string());
        }
    }
    trimmed.to_string()
}

/// 自 VALUES 之后扫描括号元组，直至语句结束（分号）或文本结尾
///
/// 逐字符状态机：跟踪括号深度与字符串字面量，字符串内的逗号/括号不分隔
fn scan_tuples(text: &str, cap: usize) -> Vec<Vec<String>> {
    let mut tuples: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut depth: usize = 0;
    let mut in_string: Option<char> = None;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            buf.push(c);
            if c == quote {
                // SQL 双写引号为转义，保持字符串状态
                if chars.peek() == Some(&quote) {
                    buf.push(chars.next().expect("peek 已确认"));
                } else {
                    in_string = None;
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                in_string = Some(c);
                buf.push(c);
            }
            '(' => {
                if depth == 0 {
                    current.clear();
                    buf.clear();
                } else {
                    buf.push(c);
                }
                depth += 1;
            }
            ')' => {
                if depth == 1 {
                    current.push(clean_value(&buf));
                    buf.clear();
                    tuples.push(std::mem::take(&mut current));
                    if tuples.len() >= cap {
                        return tuples;
                    }
                    depth = 0;
                } else if depth > 1 {
                    depth -= 1;
                    buf.push(c);
                }
            }
            ',' => {
                if depth == 1 {
                    current.push(clean_value(&buf));
                    buf.clear();
                } else if depth > 1 {
                    buf.push(c);
                }
                // depth == 0: 元组之间的逗号，忽略
            }
            ';' => {
                if depth == 0 {
                    break;
                }
                buf.push(c);
            }
            _ => {
                if depth >= 1 {
                    buf.push(c);
                }
            }
        }
    }

    tuples
}

/// 将元组按列名映射为预览行
fn tuples_to_rows(
    columns: &[String],
    tuples: &[Vec<String>],
    cap: usize,
) -> Vec<BTreeMap<String, String>> {
    let mut rows = Vec::new();
    for tuple in tuples.iter().take(cap) {
        let mut row_map = BTreeMap::new();
        for (idx, value) in tuple.iter().enumerate() {
            if let Some(column) = columns.get(idx) {
                row_map.insert(column.clone(), value.clone());
            }
        }
        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row_map);
    }
    rows
}

impl FileParser for SqlDumpParser {
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let bytes = fs::read(file_path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        // 路径 1: 带列清单的 INSERT 语句，首个匹配的列清单即为 schema
        let insert_matches: Vec<_> = INSERT_RE.captures_iter(&text).collect();
        if let Some(first) = insert_matches.first() {
            let columns: Vec<String> = first
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or("")
                .split(',')
                .map(clean_column)
                .filter(|c| !c.is_empty())
                .collect();

            let mut tuples = Vec::new();
            for capture in &insert_matches {
                let whole = capture.get(0).expect("捕获 0 必然存在");
                let remaining = options.max_preview.saturating_sub(tuples.len());
                if remaining == 0 {
                    break;
                }
                tuples.extend(scan_tuples(&text[whole.end()..], remaining));
            }

            if !columns.is_empty() && !tuples.is_empty() {
                let rows = tuples_to_rows(&columns, &tuples, options.max_preview);
                return Ok(ParsedTable {
                    sheet: None,
                    header_row: 0,
                    columns,
                    rows,
                    mapping_required: false,
                });
            }
        }

        // 路径 2: 仅 VALUES 元组，合成 col_N 列名
        let mut tuples = Vec::new();
        for m in VALUES_RE.find_iter(&text) {
            let remaining = options.max_preview.saturating_sub(tuples.len());
            if remaining == 0 {
                break;
            }
            tuples.extend(scan_tuples(&text[m.end()..], remaining));
        }

        if let Some(first_tuple) = tuples.first() {
            let columns: Vec<String> = (1..=first_tuple.len())
                .map(|n| format!("col_{}", n))
                .collect();
            let rows = tuples_to_rows(&columns, &tuples, options.max_preview);
            return Ok(ParsedTable {
                sheet: None,
                header_row: 0,
                columns,
                rows,
                mapping_required: false,
            });
        }

        // 路径 3: 什么都没解析出来，非致命，交回调用方手工映射
        Ok(ParsedTable::mapping_required())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_sql(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".sql").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_insert_with_column_list() {
        let file = temp_sql(
            "INSERT INTO fact_share (zip, category, share) VALUES \
             (10115, 'care', 12.5), (10117, 'care', NULL);",
        );
        let parsed = SqlDumpParser
            .parse_preview(file.path(), &ParseOptions::default())
            .unwrap();

        assert!(!parsed.mapping_required);
        assert_eq!(parsed.columns, vec!["zip", "category", "share"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].get("category"), Some(&"care".to_string()));
        // NULL 渲染为空串
        assert_eq!(parsed.rows[1].get("share"), Some(&"".to_string()));
    }

    #[test]
    fn test_multiple_insert_statements_share_first_schema() {
        let file = temp_sql(
            "INSERT INTO t (a, b) VALUES (1, 'x');\nINSERT INTO t (a, b) VALUES (2, 'y');",
        );
        let parsed = SqlDumpParser
            .parse_preview(file.path(), &ParseOptions::default())
            .unwrap();
        assert_eq!(parsed.columns, vec!["a", "b"]);
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_quoted_values_keep_commas_and_escapes() {
        let file = temp_sql("INSERT INTO t (name, note) VALUES ('Org, North', 'it''s fine');");
        let parsed = SqlDumpParser
            .parse_preview(file.path(), &ParseOptions::default())
            .unwrap();
        assert_eq!(parsed.rows[0].get("name"), Some(&"Org, North".to_string()));
        assert_eq!(parsed.rows[0].get("note"), Some(&"it's fine".to_string()));
    }

    #[test]
    fn test_values_only_fallback_synthesizes_columns() {
        let file = temp_sql("VALUES (1, 'a'), (2, 'b');");
        let parsed = SqlDumpParser
            .parse_preview(file.path(), &ParseOptions::default())
            .unwrap();
        assert_eq!(parsed.columns, vec!["col_1", "col_2"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].get("col_2"), Some(&"b".to_string()));
    }

    #[test]
    fn test_unparseable_sql_signals_mapping_required() {
        let file = temp_sql("CREATE TABLE t (a INT);\n-- 没有任何 INSERT/VALUES\n");
        let parsed = SqlDumpParser
            .parse_preview(file.path(), &ParseOptions::default())
            .unwrap();
        assert!(parsed.mapping_required);
        assert!(parsed.columns.is_empty());
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_preview_cap_bounds_tuples() {
        let tuples: Vec<String> = (0..50).map(|i| format!("({}, 'x')", i)).collect();
        let file = temp_sql(&format!(
            "INSERT INTO t (n, tag) VALUES {};",
            tuples.join(", ")
        ));
        let options = ParseOptions {
            max_preview: 10,
            ..ParseOptions::default()
        };
        let parsed = SqlDumpParser.parse_preview(file.path(), &options).unwrap();
        assert_eq!(parsed.rows.len(), 10);
    }

    #[test]
    fn test_scan_stops_at_statement_end() {
        // 分号之后的元组属于下一条语句，不应归入当前扫描
        let tuples = scan_tuples("(1, 'a'); (2, 'b')", 100);
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0], vec!["1", "a"]);
    }
}
