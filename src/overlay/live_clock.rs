//! 再生位置に対応する壁時計の時刻表示

use std::sync::Arc;

use crate::config::HostSelectors;
use crate::dom::{ClickListener, HostDocument};
use crate::time::{add_durations, parse_duration, RelativeDuration, TimeStyle};

use super::{remove_marked, OverlayKind, RenderContext};

#[derive(Debug, Clone)]
pub struct LiveClock {
    current: String,
    total: String,
    anchor: String,
    live_badge: String,
}

impl LiveClock {
    pub fn new(selectors: &HostSelectors) -> Self {
        Self {
            current: selectors.current_time.clone(),
            total: selectors.total_duration.clone(),
            anchor: selectors.live_clock_anchor.clone(),
            live_badge: selectors.live_badge.clone(),
        }
    }

    /// ウォッチャーの監視対象（再生位置の表示）
    pub fn current_selector(&self) -> &str {
        &self.current
    }

    /// 開始時刻からの経過時間
    ///
    /// DVR再生中は再生位置が負の値（ライブ端からの差）で表示されるため、
    /// 総再生時間を足して開始からの経過に直す。
    fn elapsed(&self, doc: &dyn HostDocument, current: &str) -> Option<RelativeDuration> {
        let position = parse_duration(current.trim())?;
        if !position.is_negative() {
            return Some(position);
        }
        let total = doc
            .query_selector(&self.total)
            .and_then(|node| doc.text_content(node))
            .and_then(|text| parse_duration(text.trim()))?;
        Some(add_durations(position, total))
    }

    /// 現在の再生位置から時計を描画する。読めない場合は既存の表示を取り除く
    pub fn render(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> bool {
        let rendered = self.try_render(doc, ctx);
        if !rendered {
            self.remove(doc);
        }
        rendered
    }

    fn try_render(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> bool {
        let Some(start) = ctx.window.start_time else {
            return false;
        };
        let Some(current) = doc
            .query_selector(&self.current)
            .and_then(|node| doc.text_content(node))
        else {
            return false;
        };
        let Some(time) = self
            .elapsed(doc, &current)
            .and_then(|elapsed| elapsed.offset_from(start))
        else {
            return false;
        };
        let Some(anchor) = doc.query_selector(&self.anchor) else {
            return false;
        };
        let text = format!("({})", ctx.formatter.format(time, TimeStyle::WithSeconds));

        let selector = OverlayKind::LiveClock.selector();
        let node = match doc.query_selector_within(anchor, &selector) {
            Some(existing) => existing,
            None => {
                let node = doc.create_element("span");
                doc.add_class(node, OverlayKind::LiveClock.class_name());
                doc.append_child(anchor, node);
                if ctx.window.is_ongoing() {
                    doc.add_click_listener(node, self.jump_to_live());
                }
                node
            }
        };
        if doc.text_content(node).as_deref() != Some(text.as_str()) {
            doc.set_text_content(node, &text);
        }
        true
    }

    /// 時計のクリックを「ライブに戻る」ボタンへ転送する
    fn jump_to_live(&self) -> ClickListener {
        let badge = self.live_badge.clone();
        Arc::new(move |doc: &dyn HostDocument| match doc.query_selector(&badge) {
            Some(node) => doc.click(node),
            None => tracing::debug!("🔴 [OVERLAY] Live badge not found: {}", badge),
        })
    }

    pub fn remove(&self, doc: &dyn HostDocument) {
        remove_marked(doc, OverlayKind::LiveClock);
    }
}
