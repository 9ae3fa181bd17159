use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use yt_downloader::cli::Cli;
use yt_downloader::common::config::AppConfig;
use yt_downloader::common::logger::PrettyLogger;
use yt_downloader::common::process::TokioProcessRunner;
use yt_downloader::deps::{DependencyManager, HttpFetcher};
use yt_downloader::downloader::Orchestrator;
use yt_downloader::downloader::error::DownloadError;
use yt_downloader::downloader::progress::ConsoleProgress;
use yt_downloader::downloader::session::{DownloadSession, PromptFolderPicker};
use yt_downloader::{log_step, log_success};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Ctrl-C 时触发取消
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = AppConfig::new(args.data_dir.clone())
        .with_downloader_url(args.downloader_url.clone())
        .with_muxer_url(args.muxer_url.clone());
    debug!("配置: {:?}", config);

    let runner = Arc::new(TokioProcessRunner);
    let fetcher = Arc::new(HttpFetcher::new(true).context("无法创建 HTTP 客户端")?);
    let deps = Arc::new(DependencyManager::new(
        config.data_dir(),
        config.sources.clone(),
        fetcher,
        runner.clone(),
    ));

    log_step!("准备依赖");
    deps.initialize(&|message: &str| PrettyLogger::info(message))
        .await
        .context("依赖初始化失败")?;

    if args.init_only {
        let (downloader, muxer) = deps.tool_versions().await;
        PrettyLogger::file_info("yt-dlp", downloader.unwrap_or_else(|| "未知版本".to_string()));
        PrettyLogger::file_info("FFmpeg", muxer.unwrap_or_else(|| "未知版本".to_string()));
        return Ok(());
    }

    let url = args.url.clone().context("缺少 --url 参数")?;
    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let orchestrator = Orchestrator::new(deps.clone(), runner);

    if args.list_only {
        let items = orchestrator.fetch_items(&url, args.playlist, &cancel).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&items)?);
        } else {
            PrettyLogger::separator();
            for item in &items {
                println!("{}. {}", item.index, item.title);
            }
            PrettyLogger::separator();
        }
        return Ok(());
    }

    let session = DownloadSession::new(
        orchestrator,
        args.output_dir.clone(),
        args.format_options(),
    );
    if args.choose_dir && session.choose_save_dir(&PromptFolderPicker).await.is_none() {
        PrettyLogger::warning(format!("未选择目录，使用 {}", args.output_dir.display()));
    }

    let save_dir = session.snapshot().await.save_dir;
    tokio::fs::create_dir_all(&save_dir)
        .await
        .with_context(|| format!("无法创建保存目录 {:?}", save_dir))?;
    PrettyLogger::file_info("保存目录", save_dir.display().to_string());

    log_step!("开始下载");
    info!("开始下载: {}", url);
    let progress = Arc::new(ConsoleProgress::new());
    let result = tokio::select! {
        result = session.start(&url, progress.clone(), cancel.clone()) => result,
        _ = cancel.cancelled() => Err(DownloadError::Cancelled),
    };
    progress.finish();

    match result {
        Ok(()) => {
            let state = session.snapshot().await;
            PrettyLogger::completion_summary(&state.items);
            log_success!("{}", "全部完成".green());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            PrettyLogger::warning("下载已取消");
            Ok(())
        }
        Err(e) => {
            PrettyLogger::error(e.to_string());
            Err(e.into())
        }
    }
}
