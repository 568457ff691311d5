//! ホストページに挿入するオーバーレイ
//!
//! 各オーバーレイは冪等に描画・除去できる。描画は既存ノードを
//! 再利用して上書きし、除去は専用クラスを持つノードを全て取り除く。

pub mod chat_timestamp;
pub mod live_clock;
pub mod seek_tooltip;
pub mod start_label;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dom::HostDocument;
use crate::models::{SessionWindow, Settings};
use crate::time::{Clock, TimestampFormatter};

pub use chat_timestamp::ChatTimestamps;
pub use live_clock::LiveClock;
pub use seek_tooltip::SeekTooltip;
pub use start_label::StartTimeLabel;

/// オーバーレイの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum OverlayKind {
    #[display("start-label")]
    StartLabel,
    #[display("chat-timestamp")]
    ChatTimestamp,
    #[display("seek-tooltip")]
    SeekTooltip,
    #[display("live-clock")]
    LiveClock,
}

impl OverlayKind {
    /// 挿入したノードに付与するクラス
    pub fn class_name(&self) -> &'static str {
        match self {
            OverlayKind::StartLabel => "yltv-start-time",
            OverlayKind::ChatTimestamp => "yltv-chat-time",
            OverlayKind::SeekTooltip => "yltv-tooltip",
            OverlayKind::LiveClock => "yltv-live-time",
        }
    }

    pub fn selector(&self) -> String {
        format!(".{}", self.class_name())
    }
}

/// 描画に必要な1パス分の状態
pub struct RenderContext {
    pub window: SessionWindow,
    pub formatter: TimestampFormatter,
    pub clock: Arc<dyn Clock>,
}

impl RenderContext {
    pub fn new(
        window: SessionWindow,
        settings: &Settings,
        utc_offset_minutes: Option<i32>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            window,
            formatter: TimestampFormatter::from_settings(settings, utc_offset_minutes),
            clock,
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("window", &self.window)
            .field("formatter", &self.formatter)
            .finish()
    }
}

/// 指定クラスを持つノードをすべて取り外す
pub(crate) fn remove_marked(doc: &dyn HostDocument, kind: OverlayKind) -> usize {
    let nodes = doc.query_selector_all(&kind.selector());
    for node in &nodes {
        doc.remove(*node);
    }
    nodes.len()
}

/// 4種類のオーバーレイ一式
#[derive(Debug, Clone)]
pub struct OverlaySet {
    pub label: Arc<StartTimeLabel>,
    pub chat: Arc<ChatTimestamps>,
    pub tooltip: Arc<SeekTooltip>,
    pub live_clock: Arc<LiveClock>,
}

impl OverlaySet {
    pub fn from_config(config: &EngineConfig) -> Self {
        let selectors = &config.selectors;
        Self {
            label: Arc::new(StartTimeLabel::new(selectors)),
            chat: Arc::new(ChatTimestamps::new(
                selectors,
                config.display.chat_presentation,
            )),
            tooltip: Arc::new(SeekTooltip::new(selectors)),
            live_clock: Arc::new(LiveClock::new(selectors)),
        }
    }

    /// 全オーバーレイを除去
    pub fn remove_all(&self, doc: &dyn HostDocument) {
        self.label.remove(doc);
        self.chat.remove(doc);
        self.tooltip.remove(doc);
        self.live_clock.remove(doc);
    }
}
