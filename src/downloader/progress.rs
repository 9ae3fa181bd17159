use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use super::models::{DownloadItem, ItemStatus};

/// 下载过程中的通知出口，可能在后台线程上被调用
pub trait ProgressSink: Send + Sync {
    fn on_status(&self, message: &str);

    /// 当前文件的完成百分比 (0-100)
    fn on_progress(&self, percent: f64);

    fn on_items(&self, _items: &[DownloadItem]) {}

    fn on_item_changed(&self, _item: &DownloadItem) {}
}

/// 终端进度条
pub struct ConsoleProgress {
    pb: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(1000);
        match ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {wide_msg}",
        ) {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("进度条模板无效: {}", e),
        }
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_status(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    fn on_progress(&self, percent: f64) {
        self.pb.set_position((percent.clamp(0.0, 100.0) * 10.0) as u64);
    }

    fn on_items(&self, items: &[DownloadItem]) {
        self.pb.println(format!("{} 共 {} 项", "🎬".magenta().bold(), items.len()));
        for item in items {
            self.pb.println(format!("  {}. {}", item.index, item.title));
        }
    }

    fn on_item_changed(&self, item: &DownloadItem) {
        let line = match item.status {
            ItemStatus::Pending => return,
            ItemStatus::Downloading => {
                format!("{} {}. {}", "⬇".blue().bold(), item.index, item.title)
            }
            ItemStatus::Completed => {
                format!("{} {}. {}", "✓".green().bold(), item.index, item.title)
            }
        };
        self.pb.println(line);
    }
}
