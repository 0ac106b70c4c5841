// ==========================================
// 报表数据导入平台 - 文件解析器实现
// ==========================================
// 支持: 分隔文本 (.csv/.tsv/.txt) / Excel (.xlsx/.xls) / JSON (.json)
//       / SQL 导出文本 (.sql，见 sql_dump 模块)
// 产出: 统一的 ParsedTable（列名 + 限量预览行）
// ==========================================

use crate::domain::types::SourceFormat;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::sql_dump::SqlDumpParser;
use crate::importer::table_detector::{detect_table, DetectedTable, SheetGrid};
use crate::importer::traits::FileParser;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ==========================================
// ParseOptions - 解析选项
// ==========================================
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// 指定工作表名（仅 Excel 生效；None 时在全部工作表中探测）
    pub sheet: Option<String>,
    /// 预览行数上限
    pub max_preview: usize,
    /// 表头扫描行数上限
    pub scan_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            max_preview: crate::config::DEFAULT_PREVIEW_CAP,
            scan_limit: crate::config::DEFAULT_SCAN_LIMIT,
        }
    }
}

// ==========================================
// ParsedTable - 解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// 选中的工作表名（非工作簿格式为 None）
    pub sheet: Option<String>,
    /// 表头行下标（0 起）
    pub header_row: usize,
    /// 列名（保留源文件从左到右顺序）
    pub columns: Vec<String>,
    /// 预览行（列名 → 单元格值，已截断至上限）
    pub rows: Vec<BTreeMap<String, String>>,
    /// 结构无法自动识别，需调用方手工提供映射
    pub mapping_required: bool,
}

impl ParsedTable {
    /// 空结果 + 手工映射标记（SQL 文本完全无法解析时使用）
    pub fn mapping_required() -> Self {
        Self {
            sheet: None,
            header_row: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            mapping_required: true,
        }
    }
}

/// 将探测结果的数据行转为列名 → 值的映射，跳过全空行并截断
fn rows_to_maps(detected: &DetectedTable, cap: usize) -> Vec<BTreeMap<String, String>> {
    let mut records = Vec::new();
    for cells in &detected.rows {
        let mut row_map = BTreeMap::new();
        for (col_idx, value) in cells.iter().enumerate() {
            if let Some(header) = detected.headers.get(col_idx) {
                row_map.insert(header.clone(), value.trim().to_string());
            }
        }

        // 跳过完全空白的行
        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }

        records.push(row_map);
        if records.len() >= cap {
            break;
        }
    }
    records
}

// ==========================================
// DelimitedParser - 分隔文本解析器
// ==========================================
pub struct DelimitedParser;

/// 嗅探分隔符（候选: 逗号/分号/制表符/竖线，取前 10 个非空行计数最高者）
fn sniff_delimiter(text: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
    let mut counts = [0usize; 4];

    for line in text.lines().filter(|l| !l.trim().is_empty()).take(10) {
        for (idx, delim) in CANDIDATES.iter().enumerate() {
            counts[idx] += line.bytes().filter(|b| b == delim).count();
        }
    }

    let mut best = 0;
    for idx in 1..CANDIDATES.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    CANDIDATES[best]
}

impl FileParser for DelimitedParser {
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let bytes = fs::read(file_path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let delimiter = sniff_delimiter(&text);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let mut grid: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            let record = result?;
            grid.push(record.iter().map(|c| c.trim().to_string()).collect());
        }

        let stem = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("default")
            .to_string();

        let detected = detect_table(
            &[SheetGrid {
                name: stem,
                rows: grid,
            }],
            options.scan_limit,
        )?;

        let rows = rows_to_maps(&detected, options.max_preview);
        Ok(ParsedTable {
            sheet: None,
            header_row: detected.header_row,
            columns: detected.headers,
            rows,
            mapping_required: false,
        })
    }
}

// ==========================================
// SpreadsheetParser - Excel 解析器
// ==========================================
pub struct SpreadsheetParser;

impl FileParser for SpreadsheetParser {
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let mut workbook = open_workbook_auto(file_path)
            .map_err(|e| ImportError::SpreadsheetParseError(e.to_string()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(ImportError::SpreadsheetParseError(
                "Excel 文件无工作表".to_string(),
            ));
        }

        // 指定工作表时只在该表内探测，否则在全部工作表中探测
        let selected: Vec<String> = match &options.sheet {
            Some(name) => {
                if !sheet_names.iter().any(|s| s == name) {
                    return Err(ImportError::SheetNotFound(name.clone()));
                }
                vec![name.clone()]
            }
            None => sheet_names,
        };

        let mut grids = Vec::new();
        for name in &selected {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| ImportError::SpreadsheetParseError(e.to_string()))?;

            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.to_string().trim().to_string())
                        .collect()
                })
                .collect();

            grids.push(SheetGrid {
                name: name.clone(),
                rows,
            });
        }

        let detected = detect_table(&grids, options.scan_limit)?;
        let rows = rows_to_maps(&detected, options.max_preview);
        Ok(ParsedTable {
            sheet: Some(detected.sheet.clone()),
            header_row: detected.header_row,
            columns: detected.headers,
            rows,
            mapping_required: false,
        })
    }
}

// ==========================================
// JsonParser - JSON 解析器
// ==========================================
// 顶层数组: 直接截断为预览行
// 顶层对象: 展平为点号路径键的单行预览
pub struct JsonParser;

/// 标量值渲染为单元格文本
fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // 嵌套结构保留 JSON 文本
        other => other.to_string(),
    }
}

/// 对象展平为点号路径键
fn flatten_object(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_object(&path, nested, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), value_to_cell(other));
        }
    }
}

impl FileParser for JsonParser {
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let text = fs::read_to_string(file_path)?;
        let value: Value = serde_json::from_str(&text)?;

        match &value {
            Value::Array(elements) => {
                let mut columns: Vec<String> = Vec::new();
                let mut rows = Vec::new();

                for element in elements.iter().take(options.max_preview) {
                    let mut row_map = BTreeMap::new();
                    match element {
                        Value::Object(map) => {
                            for (key, nested) in map {
                                row_map.insert(key.clone(), value_to_cell(nested));
                            }
                        }
                        // 非对象元素放入合成列
                        other => {
                            row_map.insert("value".to_string(), value_to_cell(other));
                        }
                    }

                    for key in row_map.keys() {
                        if !columns.iter().any(|c| c == key) {
                            columns.push(key.clone());
                        }
                    }
                    rows.push(row_map);
                }

                Ok(ParsedTable {
                    sheet: None,
                    header_row: 0,
                    columns,
                    rows,
                    mapping_required: false,
                })
            }
            Value::Object(_) => {
                let mut row_map = BTreeMap::new();
                flatten_object("", &value, &mut row_map);
                let columns: Vec<String> = row_map.keys().cloned().collect();
                Ok(ParsedTable {
                    sheet: None,
                    header_row: 0,
                    columns,
                    rows: vec![row_map],
                    mapping_required: false,
                })
            }
            _ => Err(ImportError::JsonParseError(
                "顶层必须为数组或对象".to_string(),
            )),
        }
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_preview(&self, file_path: &Path, options: &ParseOptions) -> ImportResult<ParsedTable> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match SourceFormat::from_extension(&ext) {
            Some(SourceFormat::Delimited) => DelimitedParser.parse_preview(file_path, options),
            Some(SourceFormat::Spreadsheet) => SpreadsheetParser.parse_preview(file_path, options),
            Some(SourceFormat::Json) => JsonParser.parse_preview(file_path, options),
            Some(SourceFormat::SqlDump) => SqlDumpParser.parse_preview(file_path, options),
            None => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
