use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("依赖未就绪，请先完成 yt-dlp 和 FFmpeg 的初始化")]
    DependenciesNotReady,
    #[error("操作已取消")]
    Cancelled,
    #[error("获取视频列表失败: {0}")]
    Enumeration(String),
    #[error("下载失败: {0}")]
    Download(String),
    #[error("无法启动 yt-dlp: {0}")]
    Spawn(std::io::Error),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("已有下载任务在进行")]
    Busy,
    #[error("无效的URL: {0}")]
    InvalidUrl(String),
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}
