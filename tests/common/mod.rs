//! 統合テスト共通のフィクスチャ
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use yltv::config::{ChatPresentation, EngineConfig};
use yltv::dom::{HostDocument, MemoryDocument, NodeId};
use yltv::models::SessionWindow;
use yltv::traits::WindowSource;

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";
pub const OTHER_WATCH_URL: &str = "https://www.youtube.com/watch?v=def456";
pub const CHAT_URL: &str = "https://www.youtube.com/live_chat_replay?continuation=xyz";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

pub fn end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// テスト用の短い待ち時間とUTC固定の表示設定
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.polling.interval_ms = 10;
    config.polling.element_timeout_ms = 100;
    config.polling.watcher_timeout_ms = 100;
    config.display.utc_offset_minutes = Some(0);
    config.display.chat_presentation = ChatPresentation::Replace;
    config.messaging.start_time_poll_ms = 20;
    config.messaging.start_time_wait_ms = 1000;
    config.messaging.forward_timeout_ms = 100;
    config
}

/// URLごとに決まったウィンドウを返す取得元
///
/// 呼び出し履歴と同時実行数を記録する。
pub struct ScriptedSource {
    windows: HashMap<String, SessionWindow>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_window(mut self, url: &str, window: SessionWindow) -> Self {
        self.windows.insert(url.to_string(), window);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowSource for ScriptedSource {
    async fn resolve(&self, page_url: &str) -> SessionWindow {
        self.calls.lock().push(page_url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.windows.get(page_url).copied().unwrap_or_default()
    }
}

/// 動画ページのホスト要素
pub struct WatchPage {
    pub doc: Arc<MemoryDocument>,
    pub info_text: NodeId,
    pub tooltip_container: NodeId,
    pub tooltip_text: NodeId,
    pub current_time: NodeId,
    pub total_duration: NodeId,
    pub live_badge: NodeId,
}

impl WatchPage {
    pub fn new(current: &str, total: &str) -> Self {
        let doc = Arc::new(MemoryDocument::new());
        let root = doc.root();

        let renderer = doc
            .append_element(root, "ytd-video-primary-info-renderer")
            .unwrap();
        let container = doc.append_element(renderer, "div#container").unwrap();
        let info = doc.append_element(container, "div#info").unwrap();
        let info_text = doc.append_element(info, "div#info-text").unwrap();

        let player = doc.append_element(root, "div.html5-video-player").unwrap();
        let tooltip_container = doc.append_element(player, "div.ytp-tooltip").unwrap();
        let wrapper = doc
            .append_element(tooltip_container, "div.ytp-tooltip-text-wrapper")
            .unwrap();
        let tooltip_text = doc.append_element(wrapper, "span.ytp-tooltip-text").unwrap();

        let display = doc.append_element(player, "div.ytp-time-display").unwrap();
        let current_time = doc.append_element(display, "span.ytp-time-current").unwrap();
        doc.append_text(current_time, current);
        let total_duration = doc
            .append_element(display, "span.ytp-time-duration")
            .unwrap();
        doc.append_text(total_duration, total);
        let live_badge = doc.append_element(player, "button.ytp-live-badge").unwrap();

        Self {
            doc,
            info_text,
            tooltip_container,
            tooltip_text,
            current_time,
            total_duration,
            live_badge,
        }
    }

    pub fn document(&self) -> Arc<dyn HostDocument> {
        self.doc.clone()
    }

    pub fn texts(&self, selector: &str) -> Vec<String> {
        text_of_all(&self.doc, selector)
    }
}

/// チャットフレームのホスト要素
pub struct ChatFrame {
    pub doc: Arc<MemoryDocument>,
    pub outer: NodeId,
    pub items: NodeId,
}

impl ChatFrame {
    pub fn new() -> Self {
        Self::within(Arc::new(MemoryDocument::new()))
    }

    /// 既存ドキュメント（動画ページ）にチャット欄を埋め込む
    pub fn within(doc: Arc<MemoryDocument>) -> Self {
        let outer = doc
            .append_element(doc.root(), "div#item-list.yt-live-chat-renderer")
            .unwrap();
        let items = doc
            .append_element(outer, "div#items.yt-live-chat-item-list-renderer")
            .unwrap();
        Self { doc, outer, items }
    }

    pub fn document(&self) -> Arc<dyn HostDocument> {
        self.doc.clone()
    }

    /// チャットアイテムを1件追加し、そのタイムスタンプ要素を返す
    pub fn push_item(&self, relative: &str) -> NodeId {
        let item = self
            .doc
            .create_from_spec("yt-live-chat-text-message-renderer")
            .unwrap();
        let content = self.doc.append_element(item, "div#content").unwrap();
        let timestamp = self.doc.append_element(content, "span#timestamp").unwrap();
        self.doc.append_text(timestamp, relative);
        self.doc.append_child(self.items, item);
        timestamp
    }

    pub fn text(&self, node: NodeId) -> String {
        self.doc.text_content(node).unwrap_or_default()
    }
}

pub fn text_of_all(doc: &MemoryDocument, selector: &str) -> Vec<String> {
    doc.query_selector_all(selector)
        .into_iter()
        .filter_map(|node| doc.text_content(node))
        .collect()
}

/// 非同期のミューテーション処理が落ち着くのを待つ
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// 条件が満たされるまで待つ（最大2秒）
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
