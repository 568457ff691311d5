//! 動画情報欄の開始時刻ラベル

use crate::config::HostSelectors;
use crate::dom::{HostDocument, NodeId};
use crate::time::TimeStyle;

use super::{remove_marked, OverlayKind, RenderContext};

/// `(Started at ...)`ラベル
#[derive(Debug, Clone)]
pub struct StartTimeLabel {
    anchor: String,
}

impl StartTimeLabel {
    pub fn new(selectors: &HostSelectors) -> Self {
        Self {
            anchor: selectors.start_label_anchor.clone(),
        }
    }

    pub fn anchor_selector(&self) -> &str {
        &self.anchor
    }

    pub fn label_text(ctx: &RenderContext) -> Option<String> {
        let start = ctx.window.start_time?;
        Some(format!(
            "(Started at {})",
            ctx.formatter.format(start, TimeStyle::DateTime)
        ))
    }

    /// 挿入先`anchor`にラベルを描画する
    ///
    /// 既にラベルがあればテキストだけを更新する。開始時刻が無ければ何もしない。
    pub fn render_at(&self, doc: &dyn HostDocument, anchor: NodeId, ctx: &RenderContext) -> bool {
        let Some(text) = Self::label_text(ctx) else {
            return false;
        };

        let selector = OverlayKind::StartLabel.selector();
        let label = match doc.query_selector_within(anchor, &selector) {
            Some(existing) => existing,
            None => {
                // 別の場所に残ったラベルは二重表示になるため取り除く
                remove_marked(doc, OverlayKind::StartLabel);
                let node = doc.create_element("yt-formatted-string");
                doc.add_class(node, OverlayKind::StartLabel.class_name());
                doc.append_child(anchor, node);
                node
            }
        };

        if doc.text_content(label).as_deref() != Some(text.as_str()) {
            doc.set_text_content(label, &text);
        }
        tracing::debug!("🏷️ [OVERLAY] Start label rendered: {}", text);
        true
    }

    /// 挿入先を検索して描画する（見つからなければ描画しない）
    pub fn render(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> bool {
        match doc.query_selector(&self.anchor) {
            Some(anchor) => self.render_at(doc, anchor, ctx),
            None => false,
        }
    }

    pub fn remove(&self, doc: &dyn HostDocument) {
        remove_marked(doc, OverlayKind::StartLabel);
    }
}
