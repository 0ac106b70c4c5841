// ==========================================
// 集成测试 - 落库语义
// ==========================================
// 测试目标: append 累积 / replace 幂等 / 坏行跳过 / 未识别数据集留存
// ==========================================


use reporting_import::domain::types::{CommitMode, DatasetKind, RecordStatus};
use reporting_import::importer::pipeline::{MapRequest, UploadRequest};
use reporting_import::logging;
use reporting_import::repository::{FactRepository, ProvenanceRepository};

/// 上传 → 解析 → 映射，返回作业 ID（落库语义测试的公共前置）
async fn prepare_job(
    env: &test_helpers::TestEnv,
    filename: &str,
    content: &str,
    dataset_key: Option<DatasetKind>,
) -> String {
    let pipeline = env.pipeline();
    let path = env.write_fixture(filename, content);

    let job_id = pipeline
        .upload(UploadRequest {
            source_path: path,
            original_filename: None,
            uploaded_by: None,
            dataset_hint: None,
        })
        .await
        .expect("上传失败");
    pipeline.parse(&job_id, None, None).await.expect("解析失败");
    pipeline
        .map(MapRequest {
            job_id: job_id.clone(),
            dataset_key,
            ..MapRequest::default()
        })
        .await
        .expect("映射失败");
    job_id
}

#[tokio::test]
async fn test_append_twice_accumulates_duplicates() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let job_id = prepare_job(&env, "share.csv", test_helpers::market_share_csv(), None).await;
    let pipeline = env.pipeline();

    for _ in 0..2 {
        let outcome = pipeline
            .commit(&job_id, CommitMode::Append, None)
            .await
            .unwrap();
        assert_eq!(outcome.committed, 3);
    }

    // append 不去重: 同一输入提交两次 → 每个业务键两条活动记录
    let active = env
        .fact_repo()
        .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
        .await
        .unwrap();
    assert_eq!(active, 6);
}

#[tokio::test]
async fn test_replace_twice_is_idempotent() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let job_id = prepare_job(&env, "share.csv", test_helpers::market_share_csv(), None).await;
    let pipeline = env.pipeline();

    for _ in 0..2 {
        let outcome = pipeline
            .commit(&job_id, CommitMode::Replace, None)
            .await
            .unwrap();
        assert_eq!(outcome.committed, 3);
    }

    // replace 幂等: 每个业务键恰好一条活动记录
    let fact_repo = env.fact_repo();
    let active = fact_repo
        .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
        .await
        .unwrap();
    let archived = fact_repo
        .count_by_status(DatasetKind::Marketing, RecordStatus::Archived)
        .await
        .unwrap();
    assert_eq!(active, 3);
    assert_eq!(archived, 3);
}

#[tokio::test]
async fn test_commit_skips_uncoercible_rows_without_aborting() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    // 第二行指标值非数值；跳过校验直接落库（刻意宽松路径）
    let csv = "STN,Date,Service,Value\n\
               O1,2026-01-31,visits,4\n\
               O2,2026-01-31,visits,not-a-number\n\
               O3,2026-01-31,visits,7\n";
    let job_id = prepare_job(&env, "prod.csv", csv, Some(DatasetKind::Production)).await;
    let pipeline = env.pipeline();

    let outcome = pipeline
        .commit(&job_id, CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 2);
    assert_eq!(outcome.skipped, 1);

    let active = env
        .fact_repo()
        .count_by_status(DatasetKind::Production, RecordStatus::Active)
        .await
        .unwrap();
    assert_eq!(active, 2);
}

#[tokio::test]
async fn test_unrecognized_dataset_commits_nothing_but_keeps_rows() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let csv = "foo,bar\n1,2\n3,4\n";
    // 分类器识别不出指纹 → generic
    let job_id = prepare_job(&env, "misc.csv", csv, None).await;
    let pipeline = env.pipeline();

    let detail = pipeline.get_job_detail(&job_id).await.unwrap();
    assert_eq!(detail.job.dataset_key, Some(DatasetKind::Generic));

    let outcome = pipeline
        .commit(&job_id, CommitMode::Append, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 0);
    assert_eq!(outcome.skipped, 0);

    // 任何事实表都不应有记录
    for kind in [
        DatasetKind::Production,
        DatasetKind::Marketing,
        DatasetKind::Funnel,
        DatasetKind::OrgUnits,
    ] {
        assert_eq!(
            env.fact_repo()
                .count_by_status(kind, RecordStatus::Active)
                .await
                .unwrap(),
            0
        );
    }

    // 原始行仍留存在溯源表中（审计可回放）
    let rows = env.provenance_repo().rows_for_job(&job_id).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_replace_within_batch_duplicate_keys_keep_last() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    // 同批次内两行同业务键（zip+category，无日期列）
    let csv = "ZIP,Category,Share\n10115,care,12.5\n10115,care,99.9\n";
    let job_id = prepare_job(&env, "dup.csv", csv, None).await;
    let pipeline = env.pipeline();

    let outcome = pipeline
        .commit(&job_id, CommitMode::Replace, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 2);

    // 后写的行归档先写的行 → 活动记录仅 1 条，且取后值
    let fact_repo = env.fact_repo();
    let active = fact_repo
        .count_by_status(DatasetKind::Marketing, RecordStatus::Active)
        .await
        .unwrap();
    assert_eq!(active, 1);

    let facts = fact_repo.list_active(DatasetKind::Marketing, 10).await.unwrap();
    match &facts[0] {
        reporting_import::domain::FactRow::Marketing(f) => {
            assert!((f.share - 99.9).abs() < 1e-9);
        }
        other => panic!("期望市场份额事实，实际 {:?}", other.kind()),
    }
}

#[tokio::test]
async fn test_funnel_commit_with_explicit_mapping() {
    logging::init_test();
    let env = test_helpers::create_test_env().unwrap();
    let csv = "Org,Date,From,To,N\nO1,2026-01-31,lead,client,5\nO1,2026-01-31,client,churn,2\n";
    let job_id = prepare_job(&env, "funnel.csv", csv, Some(DatasetKind::Funnel)).await;
    let pipeline = env.pipeline();

    let validation = pipeline.validate(&job_id, None).await.unwrap();
    assert_eq!(validation.error_count, 0);

    let outcome = pipeline
        .commit(&job_id, CommitMode::Replace, None)
        .await
        .unwrap();
    assert_eq!(outcome.committed, 2);

    let facts = env
        .fact_repo()
        .list_active(DatasetKind::Funnel, 10)
        .await
        .unwrap();
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].business_key(), "O1|2026-01-31|lead|client");
}
