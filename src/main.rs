// ==========================================
// 报表数据导入平台 - CLI 主入口
// ==========================================
// 用法:
//   reporting-import <db_path> import <file> [dataset_key] [append|replace]
//   reporting-import <db_path> jobs
//   reporting-import <db_path> job <job_id>
// ==========================================

use reporting_import::api::{
    CommitApiRequest, ImportApi, MapApiRequest, ParseApiRequest, UploadApiRequest,
};
use std::env;
use std::process::ExitCode;

fn print_usage() {
    eprintln!("用法:");
    eprintln!("  reporting-import <db_path> import <file> [dataset_key] [append|replace]");
    eprintln!("  reporting-import <db_path> jobs");
    eprintln!("  reporting-import <db_path> job <job_id>");
}

#[tokio::main]
async fn main() -> ExitCode {
    reporting_import::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", reporting_import::APP_NAME);
    tracing::info!("系统版本: {}", reporting_import::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let db_path = args[1].clone();
    let api = ImportApi::new(db_path);

    let result = match args[2].as_str() {
        "import" => run_import(&api, &args[3..]).await,
        "jobs" => run_list_jobs(&api).await,
        "job" => match args.get(3) {
            Some(job_id) => run_show_job(&api, job_id).await,
            None => {
                print_usage();
                return ExitCode::FAILURE;
            }
        },
        other => {
            eprintln!("未知命令: {}", other);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "命令执行失败");
            ExitCode::FAILURE
        }
    }
}

/// 完整执行五阶段管道: upload → parse → map → validate → commit
async fn run_import(api: &ImportApi, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let file_path = args
        .first()
        .ok_or("缺少文件路径参数")?
        .clone();
    let dataset_key = args.get(1).cloned();
    let mode = args.get(2).cloned().unwrap_or_else(|| "append".to_string());

    // 阶段 0: 上传
    let uploaded = api
        .upload(UploadApiRequest {
            file_path: file_path.clone(),
            original_filename: None,
            uploaded_by: Some("cli".to_string()),
            dataset_hint: None,
        })
        .await?;
    println!("作业已创建: {}", uploaded.job_id);

    // 阶段 1: 解析
    let parsed = api
        .parse(ParseApiRequest {
            import_job_id: uploaded.job_id.clone(),
            sheet: None,
            max_preview: None,
        })
        .await?;
    println!(
        "解析完成: {} 列 / {} 行预览{}",
        parsed.columns.len(),
        parsed.row_count,
        if parsed.mapping_required {
            "（结构未识别，需手工映射）"
        } else {
            ""
        }
    );

    // 阶段 2: 映射（缺省走分类器提案）
    let mapped = api
        .map_columns(MapApiRequest {
            import_job_id: uploaded.job_id.clone(),
            mapping: None,
            dataset_key,
            source_system: Some("cli".to_string()),
            scope: None,
            operator: Some("cli".to_string()),
        })
        .await?;
    println!(
        "映射完成: dataset={} 映射字段数={}{}",
        mapped.dataset_key,
        mapped.mapping.len(),
        mapped
            .confidence
            .map(|c| format!(" 置信度={:.2}", c))
            .unwrap_or_default()
    );

    // 阶段 3: 校验
    let validated = api.validate(&uploaded.job_id, Some("cli")).await?;
    println!("校验完成: 问题数={}", validated.error_count);
    for issue in &validated.sample_errors {
        println!(
            "  - 行 {} 字段 {}: {}",
            issue.row_index,
            issue.field.as_deref().unwrap_or("-"),
            issue.message
        );
    }

    // 阶段 4: 落库
    let committed = api
        .commit(CommitApiRequest {
            import_job_id: uploaded.job_id.clone(),
            mode,
            operator: Some("cli".to_string()),
        })
        .await?;
    println!(
        "落库完成: 写入 {} 行, 跳过 {} 行",
        committed.committed_rows, committed.skipped_rows
    );

    Ok(())
}

/// 列出最近作业
async fn run_list_jobs(api: &ImportApi) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = api.list_jobs(50).await?;
    println!("共 {} 个作业:", jobs.len());
    for job in jobs {
        println!(
            "  {} [{}] dataset={} rows={} errors={} file={}",
            job.job_id,
            job.status,
            job.dataset_key.map(|k| k.as_key()).unwrap_or("-"),
            job.row_count,
            job.error_count,
            job.original_filename.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// 展示单个作业详情
async fn run_show_job(api: &ImportApi, job_ref: &str) -> Result<(), Box<dyn std::error::Error>> {
    let detail = api.get_job(job_ref).await?;
    println!("作业 {}", detail.job.job_id);
    println!("  状态: {}", detail.job.status);
    println!(
        "  数据集: {}",
        detail.job.dataset_key.map(|k| k.as_key()).unwrap_or("-")
    );
    println!(
        "  行数: {} / 已落库: {} / 问题: {}",
        detail.job.row_count, detail.job.row_count_committed, detail.job.error_count
    );
    println!("  文件数: {}", detail.files.len());
    for file in &detail.files {
        println!("    - {} ({} 字节)", file.stored_path, file.size_bytes);
    }
    println!("  映射版本数: {}", detail.mappings.len());
    if let Some(mapping) = detail.mappings.last() {
        for (field, column) in &mapping.mapping {
            println!("    {} ← {}", field, column);
        }
    }
    if !detail.issues.is_empty() {
        println!("  问题（前 20 条）:");
        for issue in detail.issues.iter().take(20) {
            println!(
                "    - 行 {} 字段 {}: {}",
                issue.row_index,
                issue.field.as_deref().unwrap_or("-"),
                issue.message
            );
        }
    }
    Ok(())
}
