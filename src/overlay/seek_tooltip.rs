//! シークバーのプレビューツールチップ

use crate::config::HostSelectors;
use crate::dom::{HostDocument, NodeId};
use crate::time::{parse_duration, TimeStyle};

use super::{remove_marked, OverlayKind, RenderContext};

#[derive(Debug, Clone)]
pub struct SeekTooltip {
    wrapper: String,
    text: String,
    preview_class: String,
}

impl SeekTooltip {
    pub fn new(selectors: &HostSelectors) -> Self {
        Self {
            wrapper: selectors.tooltip_wrapper.clone(),
            text: selectors.tooltip_text.clone(),
            preview_class: selectors.preview_class.clone(),
        }
    }

    /// ウォッチャーの監視対象（プレビュー時刻のテキスト要素）
    pub fn text_selector(&self) -> String {
        format!("{} {}", self.wrapper, self.text)
    }

    /// プレビュー時刻に対応する絶対時刻の文字列
    ///
    /// 終了済みの配信は開始時刻、配信中は現在時刻を基準にする。
    pub fn tooltip_text(preview: &str, ctx: &RenderContext) -> Option<String> {
        let start = ctx.window.start_time?;
        let offset = parse_duration(preview.trim())?;
        let reference = if ctx.window.end_time.is_some() {
            start
        } else {
            ctx.clock.now()
        };
        let time = offset.offset_from(reference)?;
        Some(format!(
            "({})",
            ctx.formatter.format(time, TimeStyle::WithSeconds)
        ))
    }

    fn wrapper_in_preview(&self, doc: &dyn HostDocument, wrapper: NodeId) -> bool {
        doc.parent(wrapper)
            .is_some_and(|parent| doc.has_class(parent, &self.preview_class))
    }

    /// 現在のプレビュー状態からツールチップを描画する
    ///
    /// プレビュー中でない、または時刻が読めない場合は既存の表示も取り除く。
    pub fn render(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> bool {
        let rendered = self.try_render(doc, ctx);
        if !rendered {
            self.remove(doc);
        }
        rendered
    }

    fn try_render(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> bool {
        let Some(wrapper) = doc.query_selector(&self.wrapper) else {
            return false;
        };
        if !self.wrapper_in_preview(doc, wrapper) {
            return false;
        }
        let Some(preview) = doc
            .query_selector_within(wrapper, &self.text)
            .and_then(|node| doc.text_content(node))
        else {
            return false;
        };
        let Some(text) = Self::tooltip_text(&preview, ctx) else {
            return false;
        };

        let selector = OverlayKind::SeekTooltip.selector();
        let node = match doc.query_selector_within(wrapper, &selector) {
            Some(existing) => existing,
            None => {
                let node = doc.create_element("span");
                doc.add_class(node, OverlayKind::SeekTooltip.class_name());
                doc.append_child(wrapper, node);
                node
            }
        };
        if doc.text_content(node).as_deref() != Some(text.as_str()) {
            doc.set_text_content(node, &text);
        }
        true
    }

    pub fn remove(&self, doc: &dyn HostDocument) {
        remove_marked(doc, OverlayKind::SeekTooltip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::models::{SessionWindow, Settings, TimeFormat};
    use crate::time::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn ctx(window: SessionWindow, now: DateTime<Utc>) -> RenderContext {
        RenderContext::new(
            window,
            &Settings::new(TimeFormat::TwentyFourHour),
            Some(0),
            Arc::new(FixedClock(now)),
        )
    }

    /// (doc, preview container, tooltip text node)
    fn player(preview: &str) -> (MemoryDocument, NodeId, NodeId) {
        let doc = MemoryDocument::new();
        let player = doc
            .append_element(doc.root(), "div.html5-video-player")
            .unwrap();
        let container = doc.append_element(player, "div.ytp-tooltip").unwrap();
        let wrapper = doc
            .append_element(container, "div.ytp-tooltip-text-wrapper")
            .unwrap();
        let text = doc.append_element(wrapper, "span.ytp-tooltip-text").unwrap();
        doc.append_text(text, preview);
        (doc, container, text)
    }

    #[test]
    fn test_ended_stream_uses_start_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let context = ctx(SessionWindow::new(Some(start), Some(end)), now);

        assert_eq!(
            SeekTooltip::tooltip_text("1:02:03", &context).as_deref(),
            Some("(21:02:03)")
        );
    }

    #[test]
    fn test_live_stream_uses_now() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 21, 30, 0).unwrap();
        let context = ctx(SessionWindow::new(Some(start), None), now);

        assert_eq!(
            SeekTooltip::tooltip_text("-10:00", &context).as_deref(),
            Some("(21:20:00)")
        );
    }

    #[test]
    fn test_render_requires_preview_class() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let context = ctx(SessionWindow::new(Some(start), Some(end)), end);
        let (doc, container, _) = player("0:30");
        let tooltip = SeekTooltip::new(&HostSelectors::default());

        assert!(!tooltip.render(&doc, &context));
        assert!(doc.query_selector(".yltv-tooltip").is_none());

        doc.add_class(container, "ytp-preview");
        assert!(tooltip.render(&doc, &context));
        assert!(tooltip.render(&doc, &context));
        let nodes = doc.query_selector_all(".yltv-tooltip");
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.text_content(nodes[0]).as_deref(), Some("(20:00:30)"));
    }

    #[test]
    fn test_unreadable_preview_clears_tooltip() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let context = ctx(SessionWindow::new(Some(start), Some(end)), end);
        let (doc, container, text) = player("0:30");
        doc.add_class(container, "ytp-preview");
        let tooltip = SeekTooltip::new(&HostSelectors::default());

        assert!(tooltip.render(&doc, &context));
        doc.set_text_content(text, "Chapter 1");
        assert!(!tooltip.render(&doc, &context));
        assert!(doc.query_selector(".yltv-tooltip").is_none());
    }
}
