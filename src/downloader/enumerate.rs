use super::models::DownloadItem;

/// yt-dlp 在字段缺失时输出的占位符
const MISSING_FIELD: &str = "NA";

/// 逐行解析枚举阶段的输出
#[derive(Debug)]
pub struct ItemListParser {
    playlist: bool,
    items: Vec<DownloadItem>,
}

impl ItemListParser {
    pub fn new(playlist: bool) -> Self {
        Self {
            playlist,
            items: Vec::new(),
        }
    }

    /// 处理一行输出；返回 false 表示不需要继续读取
    ///
    /// 以 `[` 开头的行一律视为日志，单视频模式下以 `[` 开头的标题也会被跳过。
    pub fn push_line(&mut self, line: &str) -> bool {
        if !self.playlist && !self.items.is_empty() {
            return false;
        }

        let line = line.trim();
        // 日志行和空行都不是数据
        if line.is_empty() || line.starts_with('[') {
            return true;
        }

        if self.playlist {
            let (index, title) = match line.split_once('|') {
                Some((index, title)) => (index.trim(), title.trim()),
                None => ("", line),
            };
            let index = if index.is_empty() || index == MISSING_FIELD {
                (self.items.len() + 1).to_string()
            } else {
                index.to_string()
            };
            self.items.push(DownloadItem::new(index, title));
            true
        } else {
            self.items.push(DownloadItem::new("1", line));
            false
        }
    }

    pub fn finish(mut self) -> Vec<DownloadItem> {
        if !self.playlist {
            self.items.truncate(1);
        }
        self.items
    }
}

/// 解析完整的枚举输出
pub fn parse_item_list(output: &str, playlist: bool) -> Vec<DownloadItem> {
    let mut parser = ItemListParser::new(playlist);
    for line in output.lines() {
        if !parser.push_line(line) {
            break;
        }
    }
    parser.finish()
}
