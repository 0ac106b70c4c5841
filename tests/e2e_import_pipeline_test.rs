// ==========================================
// 端到端集成测试 - 导入管道完整流程
// ==========================================
// 测试目标: 验证从上传到落库的五阶段流程
// 覆盖范围: 上传 → 解析（表头探测）→ 映射（分类器提案）→ 校验 → 落库
// ==========================================


use reporting_import::domain::types::{CommitMode, DatasetKind, JobStatus, RecordStatus};
use reporting_import::importer::{ParseOptions, UniversalFileParser};
use reporting_import::importer::traits::FileParser;
use reporting_import::importer::pipeline::{MapRequest, UploadRequest};
use reporting_import::logging;

// ==========================================
// 测试用例 1: 市场份额 CSV 完整流程
// ==========================================

#[tokio::test]
async fn test_e2e_market_share_csv_full_flow() {
    logging::init_test();

    let env = test_helpers::create_test_env().expect("创建测试环境失败");
    let pipeline = env.pipeline();
    let csv_path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    // 步骤 0: 表头探测（两行空行之后的第 2 行为表头，0 起）
    let parsed_direct = UniversalFileParser
        .parse_preview(&csv_path, &ParseOptions::default())
        .expect("直接解析失败");
    assert_eq!(parsed_direct.header_row, 2);
    println!("✓ 步骤 0: 表头行定位在下标 2");

    // 步骤 1: 上传
    let job_id = pipeline
        .upload(UploadRequest {
            source_path: csv_path.clone(),
            original_filename: None,
            uploaded_by: Some("tester".to_string()),
            dataset_hint: None,
        })
        .await
        .expect("上传失败");
    println!("✓ 步骤 1: 作业 {} 已创建", job_id);

    // 步骤 2: 解析
    let parse_summary = pipeline.parse(&job_id, None, None).await.expect("解析失败");
    assert_eq!(parse_summary.columns, vec!["ZIP", "Category", "Share"]);
    assert_eq!(parse_summary.row_count, 3);
    assert!(!parse_summary.mapping_required);
    println!("✓ 步骤 2: 解析出 3 行预览");

    // 步骤 3: 映射（分类器提案）
    let map_summary = pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            source_system: Some("reporting".to_string()),
            ..MapRequest::default()
        })
        .await
        .expect("映射失败");
    assert_eq!(map_summary.dataset_key, DatasetKind::Marketing);
    assert!((map_summary.confidence.unwrap() - 0.95).abs() < 1e-9);
    assert_eq!(map_summary.mapping.get("zip_code"), Some(&"ZIP".to_string()));
    assert_eq!(
        map_summary.mapping.get("category"),
        Some(&"Category".to_string())
    );
    assert_eq!(map_summary.mapping.get("share"), Some(&"Share".to_string()));
    println!("✓ 步骤 3: 识别为市场份额数据集（置信度 0.95）");

    // 步骤 4: 校验（无日期列 → 每行一个软问题，不阻断）
    let validation = pipeline
        .validate(&job_id, Some("tester"))
        .await
        .expect("校验失败");
    assert_eq!(validation.error_count, 3);
    assert!(validation
        .sample_errors
        .iter()
        .all(|i| i.field.as_deref() == Some("period_date")));
    println!("✓ 步骤 4: 记录 3 个软问题");

    // 步骤 5: append 落库 → 3 条事实
    let outcome = pipeline
        .commit(&job_id, CommitMode::Append, Some("tester"))
        .await
        .expect("append 落库失败");
    assert_eq!(outcome.committed, 3);
    assert_eq!(outcome.skipped, 0);

    let fact_repo = env.fact_repo();
    use reporting_import::repository::FactRepository;
    assert_eq!(
        fact_repo
            .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
            .await
            .unwrap(),
        3
    );
    println!("✓ 步骤 5: append 写入 3 条事实");

    // 步骤 6: replace 落库两次 → 活动记录数保持 3
    for round in 1..=2 {
        let outcome = pipeline
            .commit(&job_id, CommitMode::Replace, Some("tester"))
            .await
            .expect("replace 落库失败");
        assert_eq!(outcome.committed, 3);
        assert_eq!(
            fact_repo
                .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
                .await
                .unwrap(),
            3,
            "第 {} 轮 replace 后活动记录数应保持 3",
            round
        );
    }
    // append 的 3 条 + 第一轮 replace 的 3 条先后被归档
    assert_eq!(
        fact_repo
            .count_by_status(DatasetKind::Marketing, RecordStatus::Archived)
            .await
            .unwrap(),
        6
    );
    println!("✓ 步骤 6: replace 两轮后活动记录数仍为 3");

    // 作业终态
    let detail = pipeline.get_job_detail(&job_id).await.unwrap();
    assert_eq!(detail.job.status, JobStatus::Committed);
    assert_eq!(detail.job.row_count_committed, 3);
    assert_eq!(detail.job.error_count, 3);
}

// ==========================================
// 测试用例 2: SQL 导出文本完整流程
// ==========================================

#[tokio::test]
async fn test_e2e_sql_dump_with_explicit_dataset() {
    logging::init_test();

    let env = test_helpers::create_test_env().expect("创建测试环境失败");
    let pipeline = env.pipeline();
    let sql_path = env.write_fixture(
        "prod.sql",
        "INSERT INTO report (stn, date, service, value) VALUES \
         ('O1', '2026-01-31', 'visits', 4), \
         ('O2', '2026-01-31', 'visits', 7);",
    );

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: sql_path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();

    let parse_summary = pipeline.parse(&job_id, None, None).await.unwrap();
    assert_eq!(parse_summary.columns, vec!["stn", "date", "service", "value"]);
    assert_eq!(parse_summary.row_count, 2);

    // 列指纹不含 CONTRACT/SHARE，分类器无法识别 → 显式指定数据集
    let map_summary = pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            dataset_key: Some(DatasetKind::Production),
            ..MapRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(map_summary.dataset_key, DatasetKind::Production);
    assert_eq!(map_summary.confidence, None);
    assert_eq!(map_summary.mapping.get("org_unit"), Some(&"stn".to_string()));
    assert_eq!(map_summary.mapping.get("value"), Some(&"value".to_string()));

    let validation = pipeline.validate(&job_id, None).await.unwrap();
    assert_eq!(validation.error_count, 0);

    let outcome = pipeline
        .commit(&job_id, CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 2);
    assert_eq!(outcome.skipped, 0);

    use reporting_import::repository::FactRepository;
    let facts = env
        .fact_repo()
        .list_active(DatasetKind::Production, 10)
        .await
        .unwrap();
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].business_key(), "O1|2026-01-31|visits");
}

// ==========================================
// 测试用例 3: JSON 数组完整流程
// ==========================================

#[tokio::test]
async fn test_e2e_json_array_org_units() {
    logging::init_test();

    let env = test_helpers::create_test_env().expect("创建测试环境失败");
    let pipeline = env.pipeline();
    let json_path = env.write_fixture(
        "orgs.json",
        r#"[
            {"org": "O1", "type": "station", "zip": "10115", "service": "care"},
            {"org": "O2", "type": "hq", "zip": "10117", "service": "aid"}
        ]"#,
    );

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: json_path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();

    pipeline.parse(&job_id, None, None).await.unwrap();

    let map_summary = pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            dataset_key: Some(DatasetKind::OrgUnits),
            ..MapRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(map_summary.mapping.get("org_id"), Some(&"org".to_string()));
    assert_eq!(map_summary.mapping.get("org_type"), Some(&"type".to_string()));

    let validation = pipeline.validate(&job_id, None).await.unwrap();
    assert_eq!(validation.error_count, 0);

    let outcome = pipeline
        .commit(&job_id, CommitMode::Replace, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 2);

    use reporting_import::repository::FactRepository;
    assert_eq!(
        env.fact_repo()
            .count_by_status(DatasetKind::OrgUnits, RecordStatus::Active)
            .await
            .unwrap(),
        2
    );
}
