use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 单个下载项的状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
}

/// 一个下载单元：单个视频，或播放列表中的一项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadItem {
    pub title: String,
    /// 保留来源格式（例如前导零）
    pub index: String,
    pub status: ItemStatus,
}

impl DownloadItem {
    pub fn new(index: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            index: index.into(),
            status: ItemStatus::Pending,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }

    pub fn is_downloading(&self) -> bool {
        self.status == ItemStatus::Downloading
    }

    pub fn is_pending(&self) -> bool {
        self.status == ItemStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
pub enum VideoFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
}

impl VideoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Webm => "webm",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Opus,
    Flac,
    Wav,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不限制分辨率时使用的标签
pub const BEST_RESOLUTION: &str = "Best";

/// 格式与画质选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatOptions {
    pub video_format: VideoFormat,
    pub audio_format: AudioFormat,
    pub audio_only: bool,
    pub playlist: bool,
    /// 例如 "1080p"，或 "Best"
    pub resolution: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            video_format: VideoFormat::default(),
            audio_format: AudioFormat::default(),
            audio_only: false,
            playlist: false,
            resolution: BEST_RESOLUTION.to_string(),
        }
    }
}

/// 一次下载所需的全部参数
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub save_dir: PathBuf,
    pub options: FormatOptions,
}
