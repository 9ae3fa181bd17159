use clap::Parser;
use std::path::PathBuf;

use crate::downloader::models::{AudioFormat, BEST_RESOLUTION, FormatOptions, VideoFormat};

/// 基于 yt-dlp 的视频下载器
#[derive(Parser, Debug)]
#[command(name = "ytdl")]
#[command(version = "1.0")]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "一个基于 yt-dlp 的视频下载工具", long_about = None)]
pub struct Cli {
    /// 视频或播放列表链接
    #[arg(long, value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    #[arg(required_unless_present = "init_only")]
    pub url: Option<String>,

    /// 视频保存目录
    #[arg(long, value_name = "DIR")]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// 下载前交互式选择保存目录
    #[arg(long)]
    pub choose_dir: bool,

    /// 最高分辨率，如 1080p、720p，Best 表示不限制
    #[arg(long, value_name = "QUALITY")]
    #[arg(default_value = BEST_RESOLUTION)]
    pub quality: String,

    /// 视频封装格式
    #[arg(long, value_enum, default_value_t = VideoFormat::Mp4)]
    pub format: VideoFormat,

    /// 只下载音频
    #[arg(long)]
    pub audio_only: bool,

    /// 音频格式 (配合 --audio-only)
    #[arg(long, value_enum, default_value_t = AudioFormat::Mp3)]
    pub audio_format: AudioFormat,

    /// 按播放列表下载
    #[arg(long)]
    pub playlist: bool,

    /// 存放 yt-dlp 和 FFmpeg 的数据目录
    #[arg(long, value_name = "DIR", env = "YTDL_DATA_DIR")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// 自定义 yt-dlp 下载地址
    #[arg(long, value_name = "URL")]
    pub downloader_url: Option<String>,

    /// 自定义 FFmpeg 压缩包地址 (.zip 或 .gz)
    #[arg(long, value_name = "URL")]
    pub muxer_url: Option<String>,

    /// 只列出条目，不下载
    #[arg(long)]
    pub list_only: bool,

    /// 以 JSON 输出条目列表 (配合 --list-only)
    #[arg(long, requires = "list_only")]
    pub json: bool,

    /// 只初始化依赖后退出
    #[arg(long)]
    pub init_only: bool,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            video_format: self.format,
            audio_format: self.audio_format,
            audio_only: self.audio_only,
            playlist: self.playlist,
            resolution: self.quality.clone(),
        }
    }
}
