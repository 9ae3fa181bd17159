mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use yt_downloader::downloader::Orchestrator;
use yt_downloader::downloader::error::DownloadError;
use yt_downloader::downloader::models::{DownloadItem, DownloadRequest, FormatOptions, ItemStatus};
use yt_downloader::downloader::tracker::FINISHED_MESSAGE;

use support::{FakeDeps, RecordingSink, Script, ScriptedRunner};

fn orchestrator(deps: FakeDeps, runner: &Arc<ScriptedRunner>) -> Orchestrator {
    Orchestrator::new(Arc::new(deps), runner.clone())
}

fn request(playlist: bool) -> DownloadRequest {
    DownloadRequest {
        url: "https://example.com/watch?v=abc".to_string(),
        save_dir: "/videos".into(),
        options: FormatOptions {
            playlist,
            ..FormatOptions::default()
        },
    }
}

fn statuses(items: &[DownloadItem]) -> Vec<ItemStatus> {
    items.iter().map(|i| i.status).collect()
}

#[tokio::test]
async fn test_fetch_playlist_items() {
    let runner = Arc::new(ScriptedRunner::new(vec![Script::stdout(
        &["[youtube:tab] Downloading page 1", "1|First", "2|Second", "NA|Third", ""],
        0,
    )]));
    let orch = orchestrator(FakeDeps::ready(), &runner);

    let items = orch
        .fetch_items("https://example.com/list", true, &CancellationToken::new())
        .await
        .unwrap();

    let pairs: Vec<_> = items.iter().map(|i| (i.index.as_str(), i.title.as_str())).collect();
    assert_eq!(pairs, vec![("1", "First"), ("2", "Second"), ("3", "Third")]);
    assert!(items.iter().all(DownloadItem::is_pending));

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, FakeDeps::ready().downloader);
    assert!(calls[0].1.contains(&"--flat-playlist".to_string()));
    assert_eq!(calls[0].1.last().map(String::as_str), Some("https://example.com/list"));
}

#[tokio::test]
async fn test_fetch_single_item_keeps_first_title() {
    let runner = Arc::new(ScriptedRunner::new(vec![Script::stdout(
        &["My Video", "Something else"],
        0,
    )]));
    let orch = orchestrator(FakeDeps::ready(), &runner);

    let items = orch
        .fetch_items("https://example.com/v", false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items, vec![DownloadItem::new("1", "My Video")]);
}

#[tokio::test]
async fn test_fetch_failure_without_items() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        Script::stdout(&[], 1).with_stderr("ERROR: Unsupported URL"),
    ]));
    let orch = orchestrator(FakeDeps::ready(), &runner);

    let err = orch
        .fetch_items("https://example.com/nothing", true, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        DownloadError::Enumeration(message) => assert!(message.contains("Unsupported URL")),
        other => panic!("意外的错误: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_partial_failure_keeps_items() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        Script::stdout(&["1|Only"], 1).with_stderr("ERROR: private video"),
    ]));
    let orch = orchestrator(FakeDeps::ready(), &runner);

    let items = orch
        .fetch_items("https://example.com/list", true, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_not_ready_never_spawns() {
    let runner = Arc::new(ScriptedRunner::default());
    let orch = orchestrator(FakeDeps::missing(), &runner);

    let err = orch
        .fetch_items("https://example.com/v", false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::DependenciesNotReady));

    let mut items = vec![DownloadItem::new("1", "A")];
    let err = orch
        .download(&request(false), &mut items, &RecordingSink::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::DependenciesNotReady));
    assert_eq!(items, vec![DownloadItem::new("1", "A")]);

    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_enumeration_kills_process() {
    let runner = Arc::new(ScriptedRunner::new(vec![Script::stdout(&["1|First"], 0).hanging()]));
    let orch = orchestrator(FakeDeps::ready(), &runner);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orch
        .fetch_items("https://example.com/list", true, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(runner.killed());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let runner = Arc::new(ScriptedRunner::default());
    let orch = orchestrator(FakeDeps::ready(), &runner);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch
        .fetch_items("https://example.com/list", true, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_download_playlist_tracks_items() {
    let runner = Arc::new(ScriptedRunner::new(vec![Script::stdout(
        &[
            "[download] Downloading item 1 of 2",
            "[download] Destination: /videos/List/1 - A.f137.mp4",
            "[progress]  50.0%",
            "[progress] 100.0%",
            "[download] Destination: /videos/List/1 - A.f140.m4a",
            "[progress] 100.0%",
            "[download] Downloading item 2 of 2",
            "[download] Destination: /videos/List/2 - B.mp4",
            "[progress]  42.0%",
        ],
        0,
    )]));
    let orch = orchestrator(FakeDeps::ready(), &runner);
    let sink = RecordingSink::default();
    let mut items = vec![DownloadItem::new("1", "A"), DownloadItem::new("2", "B")];

    orch.download(&request(true), &mut items, &sink).await.unwrap();

    assert_eq!(statuses(&items), vec![ItemStatus::Completed, ItemStatus::Completed]);
    assert_eq!(sink.last_progress(), Some(100.0));
    assert_eq!(sink.last_status().as_deref(), Some(FINISHED_MESSAGE));

    let changes: Vec<_> = sink
        .changes
        .lock()
        .unwrap()
        .iter()
        .map(|i| (i.index.clone(), i.status))
        .collect();
    assert_eq!(
        changes,
        vec![
            ("1".to_string(), ItemStatus::Downloading),
            ("1".to_string(), ItemStatus::Completed),
            ("2".to_string(), ItemStatus::Downloading),
            ("2".to_string(), ItemStatus::Completed),
        ]
    );

    let args = &runner.calls()[0].1;
    let location = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
    assert_eq!(args[location + 1], "/opt/bin/ffmpeg");
    assert!(args.contains(&"--yes-playlist".to_string()));
}

#[tokio::test]
async fn test_download_failure_keeps_item_states() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        Script::stdout(
            &[
                "[download] Downloading item 1 of 2",
                "[progress]  12.5%",
            ],
            1,
        )
        .with_stderr("ERROR: HTTP Error 403: Forbidden"),
    ]));
    let orch = orchestrator(FakeDeps::ready(), &runner);
    let sink = RecordingSink::default();
    let mut items = vec![DownloadItem::new("1", "A"), DownloadItem::new("2", "B")];

    let err = orch
        .download(&request(true), &mut items, &sink)
        .await
        .unwrap_err();

    match err {
        DownloadError::Download(message) => assert!(message.contains("403")),
        other => panic!("意外的错误: {:?}", other),
    }
    assert_eq!(statuses(&items), vec![ItemStatus::Downloading, ItemStatus::Pending]);
}

#[tokio::test]
async fn test_single_video_without_markers_completes() {
    let runner = Arc::new(ScriptedRunner::new(vec![Script::stdout(
        &["[progress]  10.0%", "[progress] 100.0%"],
        0,
    )]));
    let orch = orchestrator(FakeDeps::ready(), &runner);
    let mut items = vec![DownloadItem::new("1", "Solo")];

    orch.download(&request(false), &mut items, &RecordingSink::default())
        .await
        .unwrap();

    assert!(items[0].is_completed());
    assert!(runner.calls()[0].1.contains(&"--no-playlist".to_string()));
}
