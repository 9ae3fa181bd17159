use std::path::{Path, PathBuf};

use crate::deps::{DependencySources, paths::archive_kind_for};

/// 应用数据目录名
pub const APP_DIR_NAME: &str = "yt_downloader";

/// 运行配置，显式传递给各个组件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub sources: DependencySources,
}

impl AppConfig {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            sources: DependencySources::default(),
        }
    }

    pub fn with_downloader_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.sources.downloader_url = url;
        }
        self
    }

    /// 替换 FFmpeg 压缩包地址，格式按扩展名推断
    pub fn with_muxer_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.sources.muxer_archive = archive_kind_for(&url);
            self.sources.muxer_archive_url = url;
        }
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// 系统数据目录下的应用目录，取不到时退回当前目录
pub fn default_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join(APP_DIR_NAME),
        None => PathBuf::from(format!(".{}", APP_DIR_NAME)),
    }
}
