use std::path::Path;

use super::models::{BEST_RESOLUTION, DownloadRequest};

/// 进度行标记，和 `--progress-template` 对应
pub const PROGRESS_MARKER: &str = "[progress]";

const PLAYLIST_ITEM_TEMPLATE: &str = "%(playlist_index)s|%(title)s";
const SINGLE_ITEM_TEMPLATE: &str = "%(title)s";

const PLAYLIST_OUTPUT_TEMPLATE: &str = "%(playlist_title)s/%(playlist_index)s - %(title)s.%(ext)s";
const SINGLE_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// 从 "1080p" 这类标签中取出高度上限，"Best" 表示不限制
pub fn height_cap(label: &str) -> Option<u32> {
    let label = label.trim();
    if label.eq_ignore_ascii_case(BEST_RESOLUTION) {
        return None;
    }
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// 格式选择表达式
pub fn format_selector(audio_only: bool, cap: Option<u32>) -> String {
    match (audio_only, cap) {
        (true, _) => "bestaudio/best".to_string(),
        (false, None) => "bestvideo+bestaudio/best".to_string(),
        (false, Some(h)) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
    }
}

/// 枚举阶段的参数：只打印条目，不下载
pub fn enumeration_args(url: &str, playlist: bool) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if playlist {
        args.extend(["--flat-playlist", "--yes-playlist"].map(String::from));
    } else {
        args.push("--no-playlist".to_string());
    }
    args.extend(["--skip-download", "--no-warnings", "--print"].map(String::from));
    args.push(if playlist { PLAYLIST_ITEM_TEMPLATE } else { SINGLE_ITEM_TEMPLATE }.to_string());
    args.push(url.to_string());
    args
}

/// 下载阶段的参数
pub fn download_args(request: &DownloadRequest, muxer: &Path) -> Vec<String> {
    let options = &request.options;
    let mut args: Vec<String> = Vec::new();

    args.push("-f".to_string());
    args.push(format_selector(options.audio_only, height_cap(&options.resolution)));

    if options.audio_only {
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push(options.audio_format.to_string());
    } else {
        args.push("--merge-output-format".to_string());
        args.push(options.video_format.to_string());
    }

    args.push("--ffmpeg-location".to_string());
    args.push(muxer.to_string_lossy().into_owned());

    args.push(if options.playlist { "--yes-playlist" } else { "--no-playlist" }.to_string());

    let template = if options.playlist {
        PLAYLIST_OUTPUT_TEMPLATE
    } else {
        SINGLE_OUTPUT_TEMPLATE
    };
    args.push("-o".to_string());
    args.push(request.save_dir.join(template).to_string_lossy().into_owned());

    args.push("--newline".to_string());
    args.push("--progress-template".to_string());
    args.push(format!("download:{PROGRESS_MARKER}%(progress._percent_str)s"));

    args.push(request.url.clone());
    args
}

/// 解析进度行中的百分比，例如 "[progress] 45.2%"
pub fn parse_percent_line(line: &str) -> Option<f64> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    rest.trim().trim_end_matches('%').trim().parse::<f64>().ok()
}
