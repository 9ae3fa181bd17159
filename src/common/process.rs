use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 子进程输出的一行，区分来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// 子进程退出结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// 被信号终止时为 None
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 一个正在运行的外部进程
///
/// `lines` 在 stdout 和 stderr 都读完后关闭；`exit` 只会在两路输出都读完之后才返回结果。
///
/// 在拿到退出结果之前丢弃 handle 会终止子进程。
pub struct ProcessHandle {
    lines: mpsc::Receiver<OutputLine>,
    exit: oneshot::Receiver<io::Result<ExitOutcome>>,
    kill: CancellationToken,
    exited: bool,
}

impl ProcessHandle {
    pub fn new(
        lines: mpsc::Receiver<OutputLine>,
        exit: oneshot::Receiver<io::Result<ExitOutcome>>,
        kill: CancellationToken,
    ) -> Self {
        Self {
            lines,
            exit,
            kill,
            exited: false,
        }
    }

    /// 读取下一行输出，输出流结束时返回 None
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    /// 请求终止子进程
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// 可以在 handle 被消费后继续使用的终止开关
    pub fn kill_switch(&self) -> CancellationToken {
        self.kill.clone()
    }

    /// 放弃剩余输出并等待进程退出
    pub async fn wait(mut self) -> io::Result<ExitOutcome> {
        // 关闭接收端后读取任务仍会继续排空管道
        self.lines.close();
        let outcome = (&mut self.exit).await;
        self.exited = true;
        outcome.map_err(|_| io::Error::other("进程等待任务意外结束"))?
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.exited {
            self.kill.cancel();
        }
    }
}

/// 启动外部进程的抽象，测试中可以替换
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ProcessHandle>;
}

const LINE_BUFFER: usize = 256;

/// 基于 tokio::process 的默认实现
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ProcessHandle> {
        debug!("启动进程: {:?} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("无法获取子进程 stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("无法获取子进程 stderr"))?;

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();
        let kill = CancellationToken::new();

        let stdout_task = tokio::spawn(pump_lines(stdout, line_tx.clone(), OutputLine::Stdout));
        let stderr_task = tokio::spawn(pump_lines(stderr, line_tx, OutputLine::Stderr));

        let kill_signal = kill.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_signal.cancelled() => {
                    debug!("收到终止请求，结束子进程");
                    if let Err(e) = child.start_kill() {
                        warn!("终止子进程失败: {}", e);
                    }
                    child.wait().await
                }
            };

            // 两路输出都读完才算进程结束
            for task in [stdout_task, stderr_task] {
                if let Err(e) = task.await {
                    warn!("输出读取任务异常: {}", e);
                }
            }

            let outcome = status.map(|s| ExitOutcome { code: s.code() });
            // 调用方已放弃等待时无需处理
            let _ = exit_tx.send(outcome);
        });

        Ok(ProcessHandle::new(line_rx, exit_rx, kill))
    }
}

async fn pump_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut receiver_alive = true;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // 输出不一定是合法 UTF-8
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if receiver_alive && tx.send(wrap(line)).await.is_err() {
                    // 接收端已关闭，继续读取以免子进程阻塞在管道上
                    receiver_alive = false;
                }
            }
            Err(e) => {
                warn!("读取子进程输出失败: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn run_sh(script: &str) -> ProcessHandle {
        let args = vec!["-c".to_string(), script.to_string()];
        TokioProcessRunner
            .spawn(Path::new("/bin/sh"), &args)
            .await
            .unwrap()
    }

    async fn collect(mut handle: ProcessHandle) -> (Vec<OutputLine>, ExitOutcome) {
        let mut lines = Vec::new();
        while let Some(line) = handle.next_line().await {
            lines.push(line);
        }
        let outcome = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap()
            .unwrap();
        (lines, outcome)
    }

    #[tokio::test]
    async fn both_streams_are_delivered_before_exit() {
        let handle = run_sh("echo out1; echo err1 1>&2; echo out2; echo err2 1>&2; exit 3").await;
        let (lines, outcome) = collect(handle).await;

        let stdout: Vec<_> = lines
            .iter()
            .filter_map(|l| match l {
                OutputLine::Stdout(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        let stderr: Vec<_> = lines
            .iter()
            .filter_map(|l| match l {
                OutputLine::Stderr(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(stdout, vec!["out1", "out2"]);
        assert_eq!(stderr, vec!["err1", "err2"]);
        assert_eq!(outcome.code, Some(3));
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let (lines, outcome) = collect(run_sh("true").await).await;
        assert!(lines.is_empty());
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn invalid_utf8_and_crlf_are_tolerated() {
        let (lines, _) = collect(run_sh(r"printf 'a\377b\r\n'; echo next").await).await;
        assert_eq!(
            lines,
            vec![
                OutputLine::Stdout("a\u{FFFD}b".to_string()),
                OutputLine::Stdout("next".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn large_output_drains_after_receiver_closes() {
        // 两路各约 150 KiB，远超管道缓冲区
        let script = "i=0; while [ $i -lt 5000 ]; do \
                      echo line-$i-xxxxxxxxxxxxxxxxxxxxxxxx; \
                      echo err-$i-xxxxxxxxxxxxxxxxxxxxxxxxx 1>&2; \
                      i=$((i+1)); done; exit 7";
        let mut handle = run_sh(script).await;
        assert!(handle.next_line().await.is_some());

        let outcome = tokio::time::timeout(Duration::from_secs(30), handle.wait())
            .await
            .expect("子进程被管道阻塞")
            .unwrap();
        assert_eq!(outcome.code, Some(7));
    }

    #[tokio::test]
    async fn kill_terminates_process() {
        let handle = run_sh("exec sleep 30").await;
        handle.kill();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.code, None);
    }

    #[tokio::test]
    async fn dropping_handle_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("echo started; sleep 1; touch '{}'", marker.display());

        let mut handle = run_sh(&script).await;
        assert_eq!(
            handle.next_line().await,
            Some(OutputLine::Stdout("started".to_string()))
        );
        drop(handle);

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn waited_handle_does_not_fire_kill_switch() {
        let handle = run_sh("echo done").await;
        let kill = handle.kill_switch();
        let (_, outcome) = collect(handle).await;
        assert!(outcome.success());
        assert!(!kill.is_cancelled());
    }
}
