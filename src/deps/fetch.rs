use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::error::DependencyError;

/// 把远程文件下载到本地路径
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DependencyError>;
}

/// 基于 reqwest 的流式下载，带进度条
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpFetcher {
    pub fn new(show_progress: bool) -> Result<Self, DependencyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            show_progress,
        })
    }

    fn progress_bar(&self, total_size: u64) -> Option<ProgressBar> {
        if !self.show_progress || total_size == 0 {
            return None;
        }
        let pb = ProgressBar::new(total_size);
        match ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("进度条模板无效: {}", e),
        }
        Some(pb)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DependencyError> {
        debug!("开始下载: {} -> {:?}", url, dest);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("❌ 非成功状态码: {}", status);
            return Err(DependencyError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let pb = self.progress_bar(total_size);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(error) => {
                    if let Some(pb) = &pb {
                        pb.abandon_with_message("下载失败");
                    }
                    return Err(error.into());
                }
            };
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(pb) = &pb {
                pb.set_position(downloaded);
            }
        }
        file.flush().await?;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        debug!("下载完成: {:?} ({} 字节)", dest, downloaded);
        Ok(())
    }
}
