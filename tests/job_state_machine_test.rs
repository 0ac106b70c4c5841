// ==========================================
// 集成测试 - 作业状态机
// ==========================================
// 测试目标: 状态转换、结构性失败标记、旧数字作业号回退、并发落库互斥
// ==========================================


use reporting_import::domain::types::{CommitMode, DatasetKind, JobStatus};
use reporting_import::importer::pipeline::{MapRequest, UploadRequest};
use reporting_import::importer::ImportError;
use reporting_import::logging;
use reporting_import::repository::ProvenanceRepository;
use std::collections::BTreeMap;

/// 读取作业当前状态
async fn status_of(env: &test_helpers::TestEnv, job_id: &str) -> JobStatus {
    env.provenance_repo()
        .get_job(job_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_status_progression_through_stages() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();

    assert_eq!(status_of(&env, &job_id).await, JobStatus::Uploaded);

    pipeline.parse(&job_id, None, None).await.unwrap();
    assert_eq!(status_of(&env, &job_id).await, JobStatus::Parsed);

    pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            ..MapRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(status_of(&env, &job_id).await, JobStatus::Mapped);

    // 市场份额数据无日期列 → 带问题的已校验态
    pipeline.validate(&job_id, None).await.unwrap();
    assert_eq!(status_of(&env, &job_id).await, JobStatus::ValidatedWithErrors);

    pipeline
        .commit(&job_id, CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(status_of(&env, &job_id).await, JobStatus::Committed);
}

#[tokio::test]
async fn test_validate_before_map_is_rejected() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();
    pipeline.parse(&job_id, None, None).await.unwrap();

    let result = pipeline.validate(&job_id, None).await;
    assert!(matches!(
        result,
        Err(ImportError::InvalidStateTransition { .. })
    ));
}

#[tokio::test]
async fn test_parse_is_retriggerable() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();

    let first = pipeline.parse(&job_id, None, None).await.unwrap();
    let second = pipeline.parse(&job_id, None, None).await.unwrap();
    assert_eq!(first.row_count, second.row_count);

    // 预览行替换而非累积
    let rows = env.provenance_repo().rows_for_job(&job_id).await.unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_structural_failure_marks_mapping_required() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("blob.pdf", "not really tabular");

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();

    // 不支持的格式: 解析阻断
    let result = pipeline.parse(&job_id, None, None).await;
    assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));

    let job = env
        .provenance_repo()
        .get_job(&job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Uploaded);
    assert!(job.notes.as_deref().unwrap_or("").contains("mapping required"));

    // 调用方显式提供映射与数据集后可继续推进
    let mut mapping = BTreeMap::new();
    mapping.insert("zip_code".to_string(), "col_1".to_string());
    let summary = pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            mapping: Some(mapping),
            dataset_key: Some(DatasetKind::Marketing),
            ..MapRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(summary.dataset_key, DatasetKind::Marketing);

    let job = env
        .provenance_repo()
        .get_job(&job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Mapped);
}

#[tokio::test]
async fn test_commit_resolves_legacy_numeric_job_id() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();
    pipeline.parse(&job_id, None, None).await.unwrap();
    pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            ..MapRequest::default()
        })
        .await
        .unwrap();

    pipeline.register_legacy_alias(1001, &job_id).await.unwrap();

    // 以旧数字作业号提交 → 回退解析命中
    let outcome = pipeline
        .commit("1001", CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 3);

    // 未登记的作业号 → JobNotFound
    let result = pipeline.commit("9999", CommitMode::Append, None).await;
    assert!(matches!(result, Err(ImportError::JobNotFound(_))));
}

#[tokio::test]
async fn test_concurrent_commit_is_mutually_exclusive() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let path = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();
    pipeline.parse(&job_id, None, None).await.unwrap();
    pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            ..MapRequest::default()
        })
        .await
        .unwrap();

    // 模拟另一调用方已占位 committing
    let acquired = env
        .provenance_repo()
        .try_transition_status(&job_id, &[JobStatus::Mapped], JobStatus::Committing)
        .await
        .unwrap();
    assert!(acquired);

    let result = pipeline.commit(&job_id, CommitMode::Append, None).await;
    assert!(matches!(result, Err(ImportError::CommitInProgress(_))));

    // 占位释放后可正常提交
    env.provenance_repo()
        .try_transition_status(&job_id, &[JobStatus::Committing], JobStatus::Mapped)
        .await
        .unwrap();
    let outcome = pipeline
        .commit(&job_id, CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 3);
}

#[tokio::test]
async fn test_reupload_resets_job_to_uploaded() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let pipeline = env.pipeline();
    let first = env.write_fixture("share.csv", test_helpers::market_share_csv());

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: first,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .unwrap();
    pipeline.parse(&job_id, None, None).await.unwrap();

    // 重新上传: 只有一行数据的新文件
    let second = env.write_fixture("share_v2.csv", "ZIP,Category,Share\n10115,care,50.0\n");
    pipeline.attach_file(&job_id, &second).await.unwrap();

    let job = env
        .provenance_repo()
        .get_job(&job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Uploaded);

    // 重新解析以最近文件为准
    let summary = pipeline.parse(&job_id, None, None).await.unwrap();
    assert_eq!(summary.row_count, 1);

    let detail = pipeline.get_job_detail(&job_id).await.unwrap();
    assert_eq!(detail.files.len(), 2);
}
