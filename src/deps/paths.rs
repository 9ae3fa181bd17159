use std::path::{Path, PathBuf};

/// 外部依赖的存放目录名
pub const BIN_DIR: &str = "bin";

/// 可执行文件名（按平台区分后缀）
pub fn platform_bin(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// 两个外部程序的本地路径，构造时一次性确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPaths {
    pub bin_dir: PathBuf,
    pub downloader: PathBuf,
    pub muxer: PathBuf,
}

impl DependencyPaths {
    pub fn resolve(data_dir: &Path) -> Self {
        let bin_dir = data_dir.join(BIN_DIR);
        Self {
            downloader: bin_dir.join(platform_bin("yt-dlp")),
            muxer: bin_dir.join(platform_bin("ffmpeg")),
            bin_dir,
        }
    }
}

/// 压缩包格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    /// zip 包，解出名称以 `entry` 结尾的那一个文件
    Zip { entry: String },
    /// 单文件 gzip 流
    Gzip,
}

/// 依赖的下载来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySources {
    pub downloader_url: String,
    pub muxer_archive_url: String,
    pub muxer_archive: ArchiveKind,
}

impl Default for DependencySources {
    fn default() -> Self {
        Self {
            downloader_url: default_downloader_url().to_string(),
            muxer_archive_url: default_muxer_url().to_string(),
            muxer_archive: default_muxer_archive(),
        }
    }
}

fn default_downloader_url() -> &'static str {
    if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else if cfg!(target_arch = "aarch64") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_linux_aarch64"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_linux"
    }
}

fn default_muxer_url() -> &'static str {
    if cfg!(target_os = "windows") {
        "https://github.com/BtbN/FFmpeg-Builds/releases/latest/download/ffmpeg-master-latest-win64-gpl.zip"
    } else if cfg!(target_os = "macos") {
        "https://evermeet.cx/ffmpeg/getrelease/zip"
    } else if cfg!(target_arch = "aarch64") {
        "https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffmpeg-linux-arm64.gz"
    } else {
        "https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffmpeg-linux-x64.gz"
    }
}

/// 根据 URL 推断压缩包格式，`.gz` 结尾按 gzip 处理，其余按 zip
pub fn archive_kind_for(url: &str) -> ArchiveKind {
    if url.ends_with(".gz") {
        ArchiveKind::Gzip
    } else {
        ArchiveKind::Zip {
            entry: platform_bin("ffmpeg"),
        }
    }
}

fn default_muxer_archive() -> ArchiveKind {
    archive_kind_for(default_muxer_url())
}
