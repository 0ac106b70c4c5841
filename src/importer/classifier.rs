// ==========================================
// 报表数据导入平台 - 数据集分类器
// ==========================================
// 职责: 依据表头指纹识别数据集类型
// 算法: 有序规则表，大写化表头后做子串包含判定，首个命中即返回
// 说明: funnel 类型不做自动识别，只能由调用方在 map 阶段显式指定
// ==========================================

use crate::domain::types::DatasetKind;
use crate::importer::traits::DatasetClassifier;

// ==========================================
// ClassifiedDataset - 分类结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedDataset {
    pub kind: DatasetKind,
    pub confidence: f64,
}

/// 指纹规则: (需全部出现的特征词, 数据集类型, 置信度)
/// 规则顺序即判定顺序，不可随意调整
const FINGERPRINT_RULES: &[(&[&str], DatasetKind, f64)] = &[
    (&["ZIP", "CATEGORY", "SHARE"], DatasetKind::Marketing, 0.95),
    (
        &["SERVICE", "STN", "CONTRACT", "SHARE"],
        DatasetKind::Production,
        0.95,
    ),
    (
        &["ORG", "STN", "ZIP", "SERVICE"],
        DatasetKind::OrgUnits,
        0.9,
    ),
];

/// 未命中任何规则时的兜底结果
const FALLBACK: ClassifiedDataset = ClassifiedDataset {
    kind: DatasetKind::Generic,
    confidence: 0.2,
};

// ==========================================
// FingerprintClassifier - 指纹分类器
// ==========================================
pub struct FingerprintClassifier;

impl DatasetClassifier for FingerprintClassifier {
    fn classify(&self, headers: &[String]) -> ClassifiedDataset {
        let upper: Vec<String> = headers.iter().map(|h| h.trim().to_uppercase()).collect();

        for (tokens, kind, confidence) in FINGERPRINT_RULES {
            let all_present = tokens
                .iter()
                .all(|token| upper.iter().any(|header| header.contains(token)));
            if all_present {
                return ClassifiedDataset {
                    kind: *kind,
                    confidence: *confidence,
                };
            }
        }

        FALLBACK
    }
}
