use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::process::{OutputLine, ProcessHandle, ProcessRunner};
use crate::deps::Dependencies;

use error::DownloadError;
use models::{DownloadItem, DownloadRequest};
use progress::ProgressSink;
use tracker::ProgressTracker;

pub mod args;
pub mod enumerate;
pub mod error;
pub mod models;
pub mod progress;
pub mod session;
pub mod tracker;

/// 错误信息中保留的 stderr 行数
const STDERR_TAIL_LINES: usize = 5;

/// 驱动 yt-dlp 完成枚举和下载
#[derive(Clone)]
pub struct Orchestrator {
    deps: Arc<dyn Dependencies>,
    runner: Arc<dyn ProcessRunner>,
}

impl Orchestrator {
    pub fn new(deps: Arc<dyn Dependencies>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { deps, runner }
    }

    fn ensure_ready(&self) -> Result<(), DownloadError> {
        if self.deps.is_ready() {
            Ok(())
        } else {
            Err(DownloadError::DependenciesNotReady)
        }
    }

    async fn spawn(&self, args: &[String]) -> Result<ProcessHandle, DownloadError> {
        self.runner
            .spawn(self.deps.downloader_path(), args)
            .await
            .map_err(DownloadError::Spawn)
    }

    /// 获取 URL 对应的条目列表，不下载任何内容
    pub async fn fetch_items(
        &self,
        url: &str,
        playlist: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<DownloadItem>, DownloadError> {
        self.ensure_ready()?;
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        info!("获取条目列表: {} (播放列表: {})", url, playlist);
        let mut handle = self.spawn(&args::enumeration_args(url, playlist)).await?;
        let mut parser = enumerate::ItemListParser::new(playlist);
        let mut stderr_tail = StderrTail::default();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("枚举被取消，终止 yt-dlp");
                    handle.kill();
                    return Err(DownloadError::Cancelled);
                }
                line = handle.next_line() => line,
            };

            match line {
                Some(OutputLine::Stdout(text)) => {
                    if !parser.push_line(&text) {
                        break;
                    }
                }
                Some(OutputLine::Stderr(text)) => stderr_tail.push(text),
                None => break,
            }
        }

        let outcome = handle.wait().await?;
        let items = parser.finish();

        if !outcome.success() {
            if items.is_empty() {
                return Err(DownloadError::Enumeration(stderr_tail.message(outcome.code)));
            }
            warn!("yt-dlp 退出码 {:?}，保留已获取的 {} 项", outcome.code, items.len());
        }

        info!("共获取 {} 项", items.len());
        Ok(items)
    }

    /// 执行下载，实时更新 `items` 的状态
    pub async fn download(
        &self,
        request: &DownloadRequest,
        items: &mut Vec<DownloadItem>,
        sink: &dyn ProgressSink,
    ) -> Result<(), DownloadError> {
        self.ensure_ready()?;

        let args = args::download_args(request, self.deps.muxer_path());
        info!("开始下载: {} -> {:?}", request.url, request.save_dir);
        let mut handle = self.spawn(&args).await?;

        let mut tracker = ProgressTracker::new(std::mem::take(items));
        let mut stderr_tail = StderrTail::default();

        while let Some(line) = handle.next_line().await {
            match line {
                OutputLine::Stdout(text) => match args::parse_percent_line(&text) {
                    Some(percent) => {
                        tracker.handle_percent(percent);
                        sink.on_progress(tracker.progress());
                    }
                    None => {
                        debug!("yt-dlp: {}", text);
                        tracker.handle_line(&text);
                        sink.on_status(tracker.status());
                    }
                },
                OutputLine::Stderr(text) => {
                    debug!("yt-dlp stderr: {}", text);
                    tracker.handle_line(&text);
                    sink.on_status(tracker.status());
                    stderr_tail.push(text);
                }
            }
            publish_changes(&mut tracker, sink);
        }

        let outcome = match handle.wait().await {
            Ok(outcome) => outcome,
            Err(e) => {
                *items = tracker.into_items();
                return Err(e.into());
            }
        };

        if !outcome.success() {
            *items = tracker.into_items();
            return Err(DownloadError::Download(stderr_tail.message(outcome.code)));
        }

        tracker.finish();
        publish_changes(&mut tracker, sink);
        sink.on_progress(tracker.progress());
        sink.on_status(tracker.status());
        *items = tracker.into_items();
        info!("下载完成: {}", request.url);
        Ok(())
    }
}

fn publish_changes(tracker: &mut ProgressTracker, sink: &dyn ProgressSink) {
    for i in tracker.take_changes() {
        if let Some(item) = tracker.items().get(i) {
            sink.on_item_changed(item);
        }
    }
}

/// 只保留最后几行 stderr 用于错误提示
#[derive(Debug, Default)]
struct StderrTail {
    lines: Vec<String>,
}

impl StderrTail {
    fn push(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.remove(0);
        }
        self.lines.push(line);
    }

    fn message(&self, code: Option<i32>) -> String {
        match self.lines.last() {
            Some(_) => self.lines.join("\n"),
            None => format!("yt-dlp 退出码: {:?}", code),
        }
    }
}
