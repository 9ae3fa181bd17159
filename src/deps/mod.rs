//! 外部依赖管理：确保 yt-dlp 和 ffmpeg 在固定路径上可用

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::common::process::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner};

pub mod archive;
pub mod error;
pub mod fetch;
pub mod paths;

pub use error::DependencyError;
pub use fetch::{Fetcher, HttpFetcher};
pub use paths::{ArchiveKind, DependencyPaths, DependencySources};

/// 自更新最长等待时间
const UPDATE_TIMEOUT: Duration = Duration::from_secs(30);
/// 版本探测最长等待时间
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// yt-dlp 以 pip 安装时 `-U` 的退出码
const PIP_MANAGED_EXIT_CODE: i32 = 100;

/// 下载流程对依赖的最小需求
pub trait Dependencies: Send + Sync {
    fn is_ready(&self) -> bool;
    fn downloader_path(&self) -> &Path;
    fn muxer_path(&self) -> &Path;
}

/// 初始化过程中的阶段提示
pub type InitProgress<'a> = &'a (dyn Fn(&str) + Send + Sync);

pub struct DependencyManager {
    paths: DependencyPaths,
    sources: DependencySources,
    fetcher: Arc<dyn Fetcher>,
    runner: Arc<dyn ProcessRunner>,
}

impl DependencyManager {
    pub fn new(
        data_dir: &Path,
        sources: DependencySources,
        fetcher: Arc<dyn Fetcher>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            paths: DependencyPaths::resolve(data_dir),
            sources,
            fetcher,
            runner,
        }
    }

    pub fn paths(&self) -> &DependencyPaths {
        &self.paths
    }

    pub fn downloader_present(&self) -> bool {
        self.paths.downloader.exists()
    }

    pub fn muxer_present(&self) -> bool {
        self.paths.muxer.exists()
    }

    /// 准备好两个外部程序
    ///
    /// 必需文件下载或解压失败会返回错误；yt-dlp 更新失败只记录日志。
    pub async fn initialize(&self, progress: InitProgress<'_>) -> Result<(), DependencyError> {
        tokio::fs::create_dir_all(&self.paths.bin_dir).await?;

        if self.downloader_present() {
            progress("正在检查 yt-dlp 更新...");
            self.try_self_update().await;
        } else {
            progress("正在下载 yt-dlp...");
            self.install_downloader().await?;
        }

        if !self.muxer_present() {
            progress("正在下载 FFmpeg...");
            self.install_muxer(progress).await?;
        }

        progress("依赖已就绪。");
        info!("依赖已就绪: {:?}", self.paths.bin_dir);
        Ok(())
    }

    async fn install_downloader(&self) -> Result<(), DependencyError> {
        let target = &self.paths.downloader;
        let temp_path = target.with_extension("download");

        info!("下载 yt-dlp: {}", self.sources.downloader_url);
        if let Err(e) = self.fetcher.fetch(&self.sources.downloader_url, &temp_path).await {
            remove_quietly(&temp_path).await;
            return Err(e);
        }

        let staged = match make_executable(&temp_path).await {
            Ok(()) => tokio::fs::rename(&temp_path, target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }
        info!("✅ yt-dlp 已安装: {:?}", target);
        Ok(())
    }

    async fn install_muxer(&self, progress: InitProgress<'_>) -> Result<(), DependencyError> {
        let archive_path = self.paths.bin_dir.join("ffmpeg-archive.tmp");

        info!("下载 FFmpeg: {}", self.sources.muxer_archive_url);
        if let Err(e) = self
            .fetcher
            .fetch(&self.sources.muxer_archive_url, &archive_path)
            .await
        {
            remove_quietly(&archive_path).await;
            return Err(e);
        }

        progress("正在解压 FFmpeg...");
        let kind = self.sources.muxer_archive.clone();
        let output = self.paths.muxer.clone();
        let archive = archive_path.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            archive::extract_executable(&archive, &kind, &output)
        })
        .await;
        remove_quietly(&archive_path).await;

        let installed = match extracted {
            Ok(Ok(())) => make_executable(&self.paths.muxer)
                .await
                .map_err(DependencyError::from),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = installed {
            // 不完整的文件会让 is_ready() 误判
            remove_quietly(&self.paths.muxer).await;
            return Err(e);
        }
        info!("✅ FFmpeg 已安装: {:?}", self.paths.muxer);
        Ok(())
    }

    /// 调用 `yt-dlp -U`，任何失败都不影响启动
    async fn try_self_update(&self) {
        let args = vec!["-U".to_string()];
        let handle = match self.runner.spawn(&self.paths.downloader, &args).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("无法执行 yt-dlp 更新: {}，继续使用当前版本", e);
                return;
            }
        };

        let kill = handle.kill_switch();
        match timeout(UPDATE_TIMEOUT, collect_output(handle)).await {
            Ok(Ok((outcome, stdout))) => {
                if outcome.success() {
                    if stdout.contains("up to date") || stdout.contains("up-to-date") {
                        info!("yt-dlp 已是最新版本");
                    } else {
                        info!("yt-dlp 更新检查完成: {}", stdout.trim());
                    }
                } else if outcome.code == Some(PIP_MANAGED_EXIT_CODE) {
                    info!("yt-dlp 由 pip 管理，请使用 pip 更新");
                } else {
                    warn!("yt-dlp 更新失败 (退出码: {:?})", outcome.code);
                }
            }
            Ok(Err(e)) => warn!("yt-dlp 更新过程出错: {}，继续使用当前版本", e),
            Err(_) => {
                kill.cancel();
                warn!("yt-dlp 更新超时，继续使用当前版本");
            }
        }
    }

    /// 查询两个程序的版本号，失败时对应项为 None
    pub async fn tool_versions(&self) -> (Option<String>, Option<String>) {
        let downloader = self.probe_version(&self.paths.downloader, "--version").await;
        let muxer = self.probe_version(&self.paths.muxer, "-version").await;
        (downloader, muxer)
    }

    async fn probe_version(&self, program: &Path, flag: &str) -> Option<String> {
        let handle = self.runner.spawn(program, &[flag.to_string()]).await.ok()?;
        let kill = handle.kill_switch();
        match timeout(VERSION_TIMEOUT, collect_output(handle)).await {
            Ok(Ok((outcome, stdout))) if outcome.success() => {
                let version = stdout.lines().next()?.trim().to_string();
                debug!("{:?} 版本: {}", program, version);
                Some(version)
            }
            Ok(_) => None,
            Err(_) => {
                kill.cancel();
                None
            }
        }
    }
}

impl Dependencies for DependencyManager {
    fn is_ready(&self) -> bool {
        self.downloader_present() && self.muxer_present()
    }

    fn downloader_path(&self) -> &Path {
        &self.paths.downloader
    }

    fn muxer_path(&self) -> &Path {
        &self.paths.muxer
    }
}

async fn collect_output(mut handle: ProcessHandle) -> std::io::Result<(ExitOutcome, String)> {
    let mut stdout = String::new();
    while let Some(line) = handle.next_line().await {
        match line {
            OutputLine::Stdout(text) => {
                stdout.push_str(&text);
                stdout.push('\n');
            }
            OutputLine::Stderr(text) => debug!("stderr: {}", text),
        }
    }
    let outcome = handle.wait().await?;
    Ok((outcome, stdout))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o755);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("清理临时文件失败 {:?}: {}", path, e);
        }
    }
}
