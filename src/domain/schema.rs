// ==========================================
// 报表数据导入平台 - 数据集 Schema 注册表
// ==========================================
// 职责: 每种数据集的标准字段、同义词与业务键定义
// 红线: 列结构在编译期固定，运行期不查询存储引擎的列目录
// ==========================================

use crate::domain::types::DatasetKind;

/// 标准字段定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// 标准字段名
    pub name: &'static str,
    /// 源列名同义词（已归一化口径，匹配时忽略大小写与下划线）
    pub synonyms: &'static [&'static str],
    /// 落库时是否必须可取值/可转换（缺失则该行跳过）
    pub required_at_commit: bool,
}

/// 数据集 schema（带版本号，结构演进时递增）
#[derive(Debug, Clone, Copy)]
pub struct DatasetSchema {
    pub kind: DatasetKind,
    pub version: u32,
    pub fields: &'static [FieldSpec],
    /// 业务键字段（replace 模式归档依据）
    pub business_key: &'static [&'static str],
}

// ==========================================
// 各数据集字段表
// ==========================================

const PRODUCTION_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "org_unit",
        synonyms: &["stn", "station", "org", "site", "unit", "org_unit"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "period_date",
        synonyms: &["date", "period", "month", "report_date", "period_date"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "metric",
        synonyms: &["service", "service_type", "metric", "kpi", "measure"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "value",
        synonyms: &["share", "value", "amount", "volume", "qty", "quantity"],
        required_at_commit: true,
    },
];

const MARKETING_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "zip_code",
        synonyms: &["zip", "zip_code", "postal_code", "plz"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "category",
        synonyms: &["category", "cat", "segment"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "share",
        synonyms: &["share", "market_share", "value", "pct", "percent"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "period_date",
        synonyms: &["date", "period", "month", "report_date"],
        required_at_commit: false,
    },
];

const FUNNEL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "org_unit",
        synonyms: &["org", "org_unit", "stn", "station", "site"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "period_date",
        synonyms: &["date", "period", "month", "report_date"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "stage_from",
        synonyms: &["from", "stage_from", "from_stage", "source_stage"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "stage_to",
        synonyms: &["to", "stage_to", "to_stage", "target_stage"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "count",
        synonyms: &["count", "n", "total", "transitions"],
        required_at_commit: true,
    },
];

const ORG_UNIT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "org_id",
        synonyms: &["org", "org_id", "org_code", "id"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "org_type",
        synonyms: &["type", "org_type", "kind"],
        required_at_commit: true,
    },
    FieldSpec {
        name: "name",
        synonyms: &["name", "org_name", "title"],
        required_at_commit: false,
    },
    FieldSpec {
        name: "zip_code",
        synonyms: &["zip", "zip_code", "postal_code"],
        required_at_commit: false,
    },
    FieldSpec {
        name: "service",
        synonyms: &["service", "services", "service_type"],
        required_at_commit: false,
    },
];

const GENERIC_FIELDS: &[FieldSpec] = &[];

const PRODUCTION_SCHEMA: DatasetSchema = DatasetSchema {
    kind: DatasetKind::Production,
    version: 1,
    fields: PRODUCTION_FIELDS,
    business_key: &["org_unit", "period_date", "metric"],
};

const MARKETING_SCHEMA: DatasetSchema = DatasetSchema {
    kind: DatasetKind::Marketing,
    version: 1,
    fields: MARKETING_FIELDS,
    business_key: &["zip_code", "category", "period_date"],
};

const FUNNEL_SCHEMA: DatasetSchema = DatasetSchema {
    kind: DatasetKind::Funnel,
    version: 1,
    fields: FUNNEL_FIELDS,
    business_key: &["org_unit", "period_date", "stage_from", "stage_to"],
};

const ORG_UNIT_SCHEMA: DatasetSchema = DatasetSchema {
    kind: DatasetKind::OrgUnits,
    version: 1,
    fields: ORG_UNIT_FIELDS,
    business_key: &["org_id"],
};

const GENERIC_SCHEMA: DatasetSchema = DatasetSchema {
    kind: DatasetKind::Generic,
    version: 1,
    fields: GENERIC_FIELDS,
    business_key: &[],
};

/// 按数据集类型取 schema 定义
pub fn schema_for(kind: DatasetKind) -> &'static DatasetSchema {
    match kind {
        DatasetKind::Production => &PRODUCTION_SCHEMA,
        DatasetKind::Marketing => &MARKETING_SCHEMA,
        DatasetKind::Funnel => &FUNNEL_SCHEMA,
        DatasetKind::OrgUnits => &ORG_UNIT_SCHEMA,
        DatasetKind::Generic => &GENERIC_SCHEMA,
    }
}
