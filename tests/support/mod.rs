#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use yt_downloader::common::process::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner};
use yt_downloader::deps::Dependencies;
use yt_downloader::downloader::models::DownloadItem;
use yt_downloader::downloader::progress::ProgressSink;

/// 预先写好的一次进程输出
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<OutputLine>,
    pub code: Option<i32>,
    /// 输出完之后挂起，直到被 kill
    pub hang: bool,
}

impl Script {
    pub fn stdout(lines: &[&str], code: i32) -> Self {
        Self {
            lines: lines.iter().map(|l| OutputLine::Stdout(l.to_string())).collect(),
            code: Some(code),
            hang: false,
        }
    }

    pub fn with_stderr(mut self, line: &str) -> Self {
        self.lines.push(OutputLine::Stderr(line.to_string()));
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// 按顺序回放脚本的进程启动器
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    kills: Mutex<Vec<CancellationToken>>,
}

impl ScriptedRunner {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn killed(&self) -> bool {
        self.kills.lock().unwrap().iter().any(|k| k.is_cancelled())
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ProcessHandle> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "没有更多脚本"))?;

        let (line_tx, line_rx) = mpsc::channel(16);
        let (exit_tx, exit_rx) = oneshot::channel();
        let kill = CancellationToken::new();
        self.kills.lock().unwrap().push(kill.clone());

        let kill_signal = kill.clone();
        tokio::spawn(async move {
            for line in script.lines {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
            let code = if script.hang {
                kill_signal.cancelled().await;
                None
            } else {
                script.code
            };
            drop(line_tx);
            let _ = exit_tx.send(Ok(ExitOutcome { code }));
        });

        Ok(ProcessHandle::new(line_rx, exit_rx, kill))
    }
}

pub struct FakeDeps {
    pub ready: bool,
    pub downloader: PathBuf,
    pub muxer: PathBuf,
}

impl FakeDeps {
    pub fn ready() -> Self {
        Self {
            ready: true,
            downloader: PathBuf::from("/opt/bin/yt-dlp"),
            muxer: PathBuf::from("/opt/bin/ffmpeg"),
        }
    }

    pub fn missing() -> Self {
        Self {
            ready: false,
            ..Self::ready()
        }
    }
}

impl Dependencies for FakeDeps {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn downloader_path(&self) -> &Path {
        &self.downloader
    }

    fn muxer_path(&self) -> &Path {
        &self.muxer
    }
}

/// 记录所有通知
#[derive(Default)]
pub struct RecordingSink {
    pub statuses: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<f64>>,
    pub items: Mutex<Vec<Vec<DownloadItem>>>,
    pub changes: Mutex<Vec<DownloadItem>>,
}

impl RecordingSink {
    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn last_progress(&self) -> Option<f64> {
        self.progress.lock().unwrap().last().copied()
    }
}

impl ProgressSink for RecordingSink {
    fn on_status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn on_progress(&self, percent: f64) {
        self.progress.lock().unwrap().push(percent);
    }

    fn on_items(&self, items: &[DownloadItem]) {
        self.items.lock().unwrap().push(items.to_vec());
    }

    fn on_item_changed(&self, item: &DownloadItem) {
        self.changes.lock().unwrap().push(item.clone());
    }
}
