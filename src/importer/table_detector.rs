// ==========================================
// 报表数据导入平台 - 表头探测器
// ==========================================
// 职责: 在工作表网格中定位最可能的表头行 + 表头归一化
// 算法: 逐行打分 score = non_empty*0.4 + fraction_strings*0.3 + uniqueness*0.3
//       全部工作表扫描范围内取最高分，平分时先见者胜
// 说明: non_empty 为未归一化的单元格计数，宽表天然占优，
//       该口径为既有行为，未经产品确认不得调整
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashSet;

// ==========================================
// SheetGrid - 工作表网格
// ==========================================
// 用途: 格式解析器产出的统一中间形态（行 × 单元格文本）
#[derive(Debug, Clone)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

// ==========================================
// DetectedTable - 探测结果
// ==========================================
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// 选中的工作表名
    pub sheet: String,
    /// 表头行下标（在工作表内，0 起）
    pub header_row: usize,
    /// 表头值（空白列合成 col_N）
    pub headers: Vec<String>,
    /// 表头之下的数据行
    pub rows: Vec<Vec<String>>,
}

/// 归一化表头文本
///
/// 规则: 去首尾空白 → 内部空白/控制字符折叠 → 非字母数字连续段替换为单个
/// 下划线 → 去首尾下划线 → 转小写。对已归一化的输入再执行一次结果不变。
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_underscore = false;

    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_underscore && !out.is_empty() {
                out.push('_');
            }
            pending_underscore = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            // 空白、控制字符与其他符号统一视为分隔段
            pending_underscore = true;
        }
    }

    out
}

/// 单元格是否可解析为数值
fn is_numeric_cell(cell: &str) -> bool {
    cell.trim().parse::<f64>().is_ok()
}

/// 计算候选表头行得分
///
/// 全空行得 0 分；其余按非空格数、字符串占比、唯一值占比加权
pub fn score_header_row(cells: &[String]) -> f64 {
    let non_empty: Vec<&String> = cells.iter().filter(|c| !c.trim().is_empty()).collect();
    if non_empty.is_empty() {
        return 0.0;
    }

    let total = non_empty.len() as f64;
    let string_cells = non_empty.iter().filter(|c| !is_numeric_cell(c)).count() as f64;
    let distinct: HashSet<&str> = non_empty.iter().map(|c| c.trim()).collect();

    let fraction_strings = string_cells / total;
    let uniqueness = distinct.len() as f64 / total;

    total * 0.4 + fraction_strings * 0.3 + uniqueness * 0.3
}

/// 为表头行合成列名（空白单元格 → col_N，N 为 1 起的列号）
pub fn synthesize_headers(cells: &[String]) -> Vec<String> {
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                format!("col_{}", idx + 1)
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

/// 在所有工作表中定位表头行
///
/// # 参数
/// - sheets: 工作表网格列表
/// - scan_limit: 每个工作表的候选行扫描上限
///
/// # 返回
/// - Ok(DetectedTable): 最高分行作为表头，其下为数据行
/// - Err(NoTableDetected): 扫描范围内所有行得分为 0（如空文件）
pub fn detect_table(sheets: &[SheetGrid], scan_limit: usize) -> ImportResult<DetectedTable> {
    let mut best: Option<(usize, usize, f64)> = None; // (sheet_idx, row_idx, score)

    for (sheet_idx, sheet) in sheets.iter().enumerate() {
        for (row_idx, row) in sheet.rows.iter().take(scan_limit).enumerate() {
            let score = score_header_row(row);
            if score <= 0.0 {
                continue;
            }
            // 平分时保留先见者
            let better = match best {
                Some((_, _, best_score)) => score > best_score,
                None => true,
            };
            if better {
                best = Some((sheet_idx, row_idx, score));
            }
        }
    }

    let (sheet_idx, header_row, _) = best.ok_or(ImportError::NoTableDetected)?;
    let sheet = &sheets[sheet_idx];
    let headers = synthesize_headers(&sheet.rows[header_row]);
    let rows = sheet.rows[header_row + 1..].to_vec();

    Ok(DetectedTable {
        sheet: sheet.name.clone(),
        header_row,
        headers,
        rows,
    })
}
