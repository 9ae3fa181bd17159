use colored::*;

use crate::downloader::models::{DownloadItem, ItemStatus};

/// 漂亮的终端输出工具
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示错误消息
    pub fn error(message: impl AsRef<str>) {
        eprintln!("{} {}", "✗".red().bold(), message.as_ref());
    }

    /// 显示步骤开始
    pub fn step_start(step: impl AsRef<str>) {
        println!("\n{} {}", "▶".cyan().bold(), step.as_ref().bold());
    }

    /// 显示文件信息
    pub fn file_info(label: impl AsRef<str>, path: impl AsRef<str>) {
        println!("{} {}: {}", "📁".blue().bold(), label.as_ref().bold(), path.as_ref());
    }

    pub fn separator() {
        println!("{}", "─".repeat(50).bright_black());
    }

    /// 显示下载完成后的条目汇总
    pub fn completion_summary(items: &[DownloadItem]) {
        let done = items.iter().filter(|i| i.is_completed()).count();
        println!("\n{} {}/{}", "🎉 下载完成！".green().bold(), done, items.len());
        for item in items {
            let mark = match item.status {
                ItemStatus::Completed => "✓".green(),
                ItemStatus::Downloading => "⬇".blue(),
                ItemStatus::Pending => "·".bright_black(),
            };
            println!("  {} {}. {}", mark, item.index, item.title);
        }
    }
}

#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::success(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_step {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::step_start(format!($($arg)*))
    };
}
