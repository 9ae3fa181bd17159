use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),
    #[error("下载失败，状态码: {status}，URL: {url}")]
    HttpStatus { url: String, status: reqwest::StatusCode },
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("解压失败: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("压缩包中未找到 {entry}: {archive:?}")]
    EntryNotFound { entry: String, archive: PathBuf },
    #[error("后台任务失败: {0}")]
    Join(#[from] tokio::task::JoinError),
}
