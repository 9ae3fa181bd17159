use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use super::Orchestrator;
use super::error::DownloadError;
use super::models::{DownloadItem, DownloadRequest, FormatOptions};
use super::progress::ProgressSink;

/// 目录选择器，返回 None 表示用户取消
#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn pick(&self) -> Option<PathBuf>;
}

/// 从标准输入读取目录
pub struct PromptFolderPicker;

#[async_trait]
impl FolderPicker for PromptFolderPicker {
    async fn pick(&self) -> Option<PathBuf> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all("请输入保存目录 (留空取消): ".as_bytes()).await.ok()?;
        stdout.flush().await.ok()?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await.ok()?;
        let line = line.trim();
        (!line.is_empty()).then(|| PathBuf::from(line))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub url: String,
    pub save_dir: PathBuf,
    pub options: FormatOptions,
    pub progress: f64,
    pub status_message: String,
    pub items: Vec<DownloadItem>,
}

/// 一个下载会话，同时只允许一个任务运行
pub struct DownloadSession {
    orchestrator: Orchestrator,
    state: Mutex<SessionState>,
    busy: AtomicBool,
}

/// 把通知同步写入会话状态，再转发给调用方
struct SessionSink<'a> {
    state: &'a Mutex<SessionState>,
    inner: &'a dyn ProgressSink,
}

impl ProgressSink for SessionSink<'_> {
    fn on_status(&self, message: &str) {
        lock(self.state).status_message = message.to_string();
        self.inner.on_status(message);
    }

    fn on_progress(&self, percent: f64) {
        lock(self.state).progress = percent;
        self.inner.on_progress(percent);
    }

    fn on_items(&self, items: &[DownloadItem]) {
        lock(self.state).items = items.to_vec();
        self.inner.on_items(items);
    }

    fn on_item_changed(&self, item: &DownloadItem) {
        {
            let mut state = lock(self.state);
            if let Some(slot) = state
                .items
                .iter_mut()
                .find(|i| i.index == item.index && i.title == item.title)
            {
                slot.status = item.status;
            }
        }
        self.inner.on_item_changed(item);
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // 状态只是快照数据，中毒后继续使用
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// 离开作用域时清除 busy 标记
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DownloadSession {
    pub fn new(orchestrator: Orchestrator, save_dir: PathBuf, options: FormatOptions) -> Self {
        Self {
            orchestrator,
            state: Mutex::new(SessionState {
                save_dir,
                options,
                ..SessionState::default()
            }),
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    pub async fn set_options(&self, options: FormatOptions) {
        lock(&self.state).options = options;
    }

    /// 通过选择器更换保存目录，未选择时保持不变
    pub async fn choose_save_dir(&self, picker: &dyn FolderPicker) -> Option<PathBuf> {
        let dir = picker.pick().await.filter(|p| !p.as_os_str().is_empty())?;
        info!("保存目录: {:?}", dir);
        lock(&self.state).save_dir = dir.clone();
        Some(dir)
    }

    /// 获取条目并下载
    ///
    /// 失败时会把错误信息写入状态并重置进度，busy 标记总会被清除。
    pub async fn start(
        &self,
        url: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<(), DownloadError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DownloadError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let run_id = Uuid::new_v4();
        let result = self
            .run(url, sink.as_ref(), &cancel)
            .instrument(info_span!("download_run", %run_id))
            .await;

        if let Err(e) = &result {
            if e.is_cancelled() {
                info!("下载已取消");
            } else {
                error!("下载失败: {}", e);
            }
            let session_sink = SessionSink {
                state: &self.state,
                inner: sink.as_ref(),
            };
            session_sink.on_progress(0.0);
            session_sink.on_status(&e.to_string());
        }
        result
    }

    async fn run(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let url = url.trim();
        url::Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;

        let sink = SessionSink {
            state: &self.state,
            inner: sink,
        };

        let request = {
            let mut state = lock(&self.state);
            state.url = url.to_string();
            state.items.clear();
            DownloadRequest {
                url: state.url.clone(),
                save_dir: state.save_dir.clone(),
                options: state.options.clone(),
            }
        };
        sink.on_progress(0.0);
        sink.on_status("正在获取视频信息...");

        let mut items = self
            .orchestrator
            .fetch_items(&request.url, request.options.playlist, cancel)
            .await?;
        sink.on_items(&items);

        let result = self.orchestrator.download(&request, &mut items, &sink).await;

        let mut state = lock(&self.state);
        state.items = items;
        if result.is_ok() {
            state.progress = 100.0;
            state.status_message = super::tracker::FINISHED_MESSAGE.to_string();
        }
        result
    }
}
