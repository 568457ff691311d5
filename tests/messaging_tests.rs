//! コンテキスト間メッセージングの統合テスト
//!
//! リレー・ページスクリプト・チャットフレームを同一プロセスで動かし、
//! 開始時刻の2段中継と通知によるパスの起動を確認する。

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::*;
use yltv::content::{FrameScript, PageScript};
use yltv::engine::{EngineDeps, TriggerKind};
use yltv::messaging::{ContextId, FrameId, MemorySettingsStore, Relay, TabId};
use yltv::models::{SessionWindow, Settings, TimeFormat};
use yltv::overlay::OverlayKind;
use yltv::time::FixedClock;

const TAB: TabId = TabId(1);
const FRAME: FrameId = FrameId(5);

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap()))
}

fn relay() -> Arc<Relay> {
    Relay::new(
        Arc::new(MemorySettingsStore::default()),
        &test_config().messaging,
    )
}

fn ended_window() -> SessionWindow {
    SessionWindow::new(Some(start_time()), Some(end_time()))
}

async fn start_page(relay: &Arc<Relay>, page: &WatchPage, source: Arc<ScriptedSource>) -> yltv::Engine {
    let deps = EngineDeps::new(page.document(), source).with_clock(clock());
    let mut script = PageScript::start(relay, TAB, WATCH_URL, test_config(), deps)
        .await
        .unwrap();
    let startup = script.take_startup().unwrap();
    let engine = script.engine().clone();
    tokio::spawn(script.run());
    startup.wait().await.unwrap();
    engine
}

#[tokio::test]
async fn test_frame_receives_start_time_through_relay() {
    let relay = relay();
    let page = WatchPage::new("0:10", "2:00:00");
    let source = Arc::new(ScriptedSource::new().with_window(WATCH_URL, ended_window()));
    start_page(&relay, &page, source).await;

    let chat = ChatFrame::new();
    let first = chat.push_item("1:00");
    let mut frame = FrameScript::start(
        &relay,
        TAB,
        FRAME,
        CHAT_URL,
        test_config(),
        chat.document(),
        clock(),
    )
    .await
    .unwrap();
    let report = frame.take_startup().unwrap().wait().await.unwrap();
    tokio::spawn(frame.run());

    // フレームは終了時刻を受け取らない
    assert_eq!(report.window, SessionWindow::new(Some(start_time()), None));
    assert!(report.has_watcher(OverlayKind::ChatTimestamp));
    assert_eq!(chat.text(first), "10:01 AM");

    let later = chat.push_item("1:30:00");
    settle().await;
    assert_eq!(chat.text(later), "11:30 AM");
}

#[tokio::test]
async fn test_frame_waits_for_late_page() {
    let relay = relay();
    let chat = ChatFrame::new();
    let item = chat.push_item("5:00");

    let mut frame = FrameScript::start(
        &relay,
        TAB,
        FRAME,
        CHAT_URL,
        test_config(),
        chat.document(),
        clock(),
    )
    .await
    .unwrap();
    let startup = frame.take_startup().unwrap();
    tokio::spawn(frame.run());

    tokio::time::sleep(Duration::from_millis(150)).await;
    let page = WatchPage::new("0:10", "2:00:00");
    let source = Arc::new(ScriptedSource::new().with_window(WATCH_URL, ended_window()));
    start_page(&relay, &page, source).await;

    let report = startup.wait().await.unwrap();
    assert_eq!(report.window.start_time, Some(start_time()));
    assert_eq!(chat.text(item), "10:05 AM");
}

#[tokio::test]
async fn test_frame_gives_up_without_page() {
    let relay = relay();
    let chat = ChatFrame::new();
    let item = chat.push_item("5:00");

    let mut config = test_config();
    config.messaging.start_time_wait_ms = 100;
    let mut frame = FrameScript::start(
        &relay,
        TAB,
        FRAME,
        CHAT_URL,
        config,
        chat.document(),
        clock(),
    )
    .await
    .unwrap();

    let report = frame.take_startup().unwrap().wait().await.unwrap();
    assert_eq!(report.window, SessionWindow::empty());
    assert!(report.watchers.is_empty());
    assert_eq!(chat.text(item), "5:00");
}

#[tokio::test]
async fn test_url_changed_triggers_navigation_pass() {
    let relay = relay();
    let page = WatchPage::new("0:10", "2:00:00");
    let other_start = Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap();
    let source = Arc::new(
        ScriptedSource::new()
            .with_window(WATCH_URL, ended_window())
            .with_window(
                OTHER_WATCH_URL,
                SessionWindow::new(Some(other_start), Some(end_time())),
            ),
    );
    let engine = start_page(&relay, &page, source.clone()).await;

    assert_eq!(relay.url_changed(TAB, OTHER_WATCH_URL), 1);
    assert!(
        eventually(|| async { engine.current_window().start_time == Some(other_start) }).await
    );
    assert!(
        eventually(|| async {
            page.texts(".yltv-start-time") == vec!["(Started at Feb 1, 2024, 6:00 PM)".to_string()]
        })
        .await
    );
    assert_eq!(
        source.calls(),
        vec![WATCH_URL.to_string(), OTHER_WATCH_URL.to_string()]
    );

    // 別タブ宛ての通知は届かない
    assert_eq!(relay.url_changed(TabId(2), WATCH_URL), 0);
}

#[tokio::test]
async fn test_start_time_not_served_from_previous_video() {
    let relay = relay();
    let page = WatchPage::new("0:10", "2:00:00");
    let other_start = Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap();
    let source = Arc::new(
        ScriptedSource::new()
            .with_window(WATCH_URL, ended_window())
            .with_window(
                OTHER_WATCH_URL,
                SessionWindow::new(Some(other_start), Some(end_time())),
            )
            .with_delay(Duration::from_millis(50)),
    );
    start_page(&relay, &page, source).await;
    let frame = relay.connect(ContextId::Frame(TAB, FRAME));
    assert_eq!(
        frame.client().request_start_time().await.unwrap(),
        Some(start_time())
    );

    // 遷移直後の要求は解決が済むまで開始時刻なしで返る
    assert_eq!(relay.url_changed(TAB, OTHER_WATCH_URL), 2);
    assert_eq!(frame.client().request_start_time().await.unwrap(), None);

    let client = frame.client();
    assert!(
        eventually(|| {
            let client = client.clone();
            async move { client.request_start_time().await.ok().flatten() == Some(other_start) }
        })
        .await
    );
}

#[tokio::test]
async fn test_settings_changed_reaches_page_and_frame() {
    let relay = relay();
    let page = WatchPage::new("0:10", "2:00:00");
    let source = Arc::new(ScriptedSource::new().with_window(WATCH_URL, ended_window()));
    let engine = start_page(&relay, &page, source.clone()).await;

    let chat = ChatFrame::new();
    let item = chat.push_item("1:00");
    let mut frame = FrameScript::start(
        &relay,
        TAB,
        FRAME,
        CHAT_URL,
        test_config(),
        chat.document(),
        clock(),
    )
    .await
    .unwrap();
    frame.take_startup().unwrap().wait().await.unwrap();
    let frame_engine = frame.engine().clone();
    tokio::spawn(frame.run());
    assert_eq!(chat.text(item), "10:01 AM");

    let delivered = relay
        .settings_changed(Settings::new(TimeFormat::TwentyFourHour))
        .await;
    assert_eq!(delivered, 2);

    assert!(
        eventually(|| async {
            page.texts(".yltv-start-time") == vec!["(Started at Jan 1, 2024, 10:00)".to_string()]
        })
        .await
    );
    assert!(eventually(|| async { chat.text(item) == "10:01" }).await);

    // 設定変更パスはウィンドウを取り直さない
    assert_eq!(source.calls().len(), 1);
    let report = frame_engine
        .reinit(yltv::engine::Trigger::SettingsChanged(Settings::new(
            TimeFormat::TwentyFourHour,
        )))
        .await
        .unwrap();
    assert_eq!(report.trigger, TriggerKind::SettingsChanged);
    assert_eq!(report.window.start_time, Some(start_time()));
    assert_eq!(engine.current_window(), ended_window());

    // 新しく接続したスクリプトは更新後の設定で起動する
    let late_chat = ChatFrame::new();
    let late_item = late_chat.push_item("2:00");
    let mut late_frame = FrameScript::start(
        &relay,
        TAB,
        FrameId(6),
        CHAT_URL,
        test_config(),
        late_chat.document(),
        clock(),
    )
    .await
    .unwrap();
    late_frame.take_startup().unwrap().wait().await.unwrap();
    assert_eq!(late_chat.text(late_item), "10:02");
}
