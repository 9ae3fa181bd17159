//! 把 yt-dlp 的文本输出映射为逐项的下载状态
//!
//! yt-dlp 不提供结构化的进度协议，这里只根据几类标记行和百分比推断：
//!
//! - `Downloading item N of M` / `Downloading video N of M`：明确的序号标记
//! - `Destination: <path>`：开始写入新文件，作为没有序号标记时的后备信号
//! - `has already been downloaded`：文件已存在被跳过
//! - 百分比从 >=99 跳回 <=5：没有任何文本标记时的最后手段
//!
//! 一旦本次运行出现过明确的序号标记，后两种后备信号就不再推进状态。

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::models::{DownloadItem, ItemStatus};

const LOG_PREFIX: &str = "[download]";
const DESTINATION_MARKER: &str = "Destination:";
const ALREADY_DOWNLOADED_MARKER: &str = "has already been downloaded";

/// 判定为“上一项结束”的百分比阈值
const ROLLOVER_HIGH: f64 = 99.0;
/// 判定为“新一项开始”的百分比阈值
const ROLLOVER_LOW: f64 = 5.0;

pub const FINISHED_MESSAGE: &str = "下载完成！";

lazy_static! {
    static ref INDEX_MARKER: Regex =
        Regex::new(r"(?i)downloading\s+(?:video|item)\s+(\d+)\s+of\s+(\d+)").unwrap();
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    items: Vec<DownloadItem>,
    seen_destinations: HashSet<String>,
    explicit_markers: bool,
    last_percent: f64,
    progress: f64,
    status: String,
    changed: Vec<usize>,
}

impl ProgressTracker {
    pub fn new(items: Vec<DownloadItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[DownloadItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<DownloadItem> {
        self.items
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// 取出自上次调用以来状态发生变化的条目下标
    pub fn take_changes(&mut self) -> Vec<usize> {
        let mut changed = std::mem::take(&mut self.changed);
        changed.dedup();
        changed
    }

    /// 处理一行文本输出
    pub fn handle_line(&mut self, line: &str) {
        let message = strip_log_prefix(line);
        if message.is_empty() {
            return;
        }
        self.status = message.to_string();

        if let Some(ordinal) = parse_index_marker(message) {
            self.explicit_markers = true;
            self.start_ordinal(&ordinal);
        } else if let Some(path) = message.strip_prefix(DESTINATION_MARKER) {
            self.on_destination(path.trim());
        } else if message.contains(ALREADY_DOWNLOADED_MARKER) {
            self.on_already_downloaded();
        }
    }

    /// 处理一次百分比上报
    pub fn handle_percent(&mut self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        let previous = self.last_percent;
        self.last_percent = percent;
        self.progress = percent;

        let rolled_over = previous >= ROLLOVER_HIGH && percent <= ROLLOVER_LOW;
        if rolled_over
            && !self.explicit_markers
            && !self.seen_destinations.is_empty()
            && self.next_pending().is_some()
        {
            debug!("百分比从 {} 回落到 {}，视为开始下一项", previous, percent);
            self.advance();
        }
    }

    /// 进程成功退出后的收尾
    pub fn finish(&mut self) {
        for i in 0..self.items.len() {
            if self.items[i].is_downloading() {
                self.set_status(i, ItemStatus::Completed);
            }
        }
        // 单个视频可能从头到尾都没有输出序号标记
        if self.items.len() == 1 && self.items[0].is_pending() {
            self.set_status(0, ItemStatus::Completed);
        }
        self.progress = 100.0;
        self.status = FINISHED_MESSAGE.to_string();
    }

    fn start_ordinal(&mut self, ordinal: &str) {
        let wanted = ordinal.trim_start_matches('0');
        let target = self
            .items
            .iter()
            .position(|item| item.index.trim().trim_start_matches('0') == wanted)
            .or_else(|| {
                let n: usize = ordinal.parse().ok()?;
                n.checked_sub(1).filter(|i| *i < self.items.len())
            });

        match target {
            Some(i) if self.items[i].is_pending() => self.promote(i),
            Some(_) => {}
            None => debug!("序号 {} 没有对应的条目", ordinal),
        }
    }

    fn on_destination(&mut self, path: &str) {
        if path.is_empty() || !self.seen_destinations.insert(path.to_lowercase()) {
            return;
        }
        if self.explicit_markers || self.next_pending().is_none() {
            return;
        }
        self.advance();
    }

    fn on_already_downloaded(&mut self) {
        if let Some(i) = self.current() {
            self.set_status(i, ItemStatus::Completed);
        } else if let Some(i) = self.next_pending() {
            self.set_status(i, ItemStatus::Completed);
        }
    }

    /// 结束当前项并开始下一个等待中的项
    fn advance(&mut self) {
        if let Some(i) = self.next_pending() {
            self.promote(i);
        }
    }

    fn promote(&mut self, target: usize) {
        for i in 0..self.items.len() {
            if i != target && self.items[i].is_downloading() {
                self.set_status(i, ItemStatus::Completed);
            }
        }
        self.set_status(target, ItemStatus::Downloading);
    }

    fn current(&self) -> Option<usize> {
        self.items.iter().position(DownloadItem::is_downloading)
    }

    fn next_pending(&self) -> Option<usize> {
        self.items.iter().position(DownloadItem::is_pending)
    }

    fn set_status(&mut self, i: usize, status: ItemStatus) {
        if self.items[i].status != status {
            debug!("[{}] {} -> {:?}", self.items[i].index, self.items[i].title, status);
            self.items[i].status = status;
            self.changed.push(i);
        }
    }
}

/// 去掉 `[download]` 前缀，得到适合展示的状态文本
pub fn strip_log_prefix(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix(LOG_PREFIX).unwrap_or(line).trim()
}

/// 解析 `Downloading item N of M` 中的 N
fn parse_index_marker(message: &str) -> Option<String> {
    let caps = INDEX_MARKER.captures(message)?;
    caps.get(1).map(|m| m.as_str().to_string())
}
