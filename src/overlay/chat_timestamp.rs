//! チャットメッセージの絶対時刻表示
//!
//! リプレイのチャットは配信開始からの相対時刻を表示しているため、
//! 開始時刻を足した壁時計の時刻を表示する。

use crate::config::{ChatPresentation, HostSelectors};
use crate::dom::{HostDocument, NodeId};
use crate::time::{parse_duration, TimeStyle};

use super::{OverlayKind, RenderContext};

/// 置き換え前の相対時刻を保持する属性
pub const RELATIVE_ATTR: &str = "data-yltv-relative";

#[derive(Debug, Clone)]
pub struct ChatTimestamps {
    items: String,
    item: String,
    timestamp: String,
    presentation: ChatPresentation,
}

impl ChatTimestamps {
    pub fn new(selectors: &HostSelectors, presentation: ChatPresentation) -> Self {
        Self {
            items: selectors.chat_items.clone(),
            item: selectors.chat_item.clone(),
            timestamp: selectors.chat_timestamp.clone(),
            presentation,
        }
    }

    pub fn presentation(&self) -> ChatPresentation {
        self.presentation
    }

    /// チャットアイテム1件に絶対時刻を付与する
    ///
    /// タイムスタンプが無い、または相対時刻として読めない場合は何もしない。
    pub fn annotate_item(&self, doc: &dyn HostDocument, item: NodeId, ctx: &RenderContext) -> bool {
        let Some(start) = ctx.window.start_time else {
            return false;
        };
        let Some(timestamp) = doc.query_selector_within(item, &self.timestamp) else {
            return false;
        };

        match self.presentation {
            ChatPresentation::Replace => {
                let stored = doc.attribute(timestamp, RELATIVE_ATTR);
                let relative = match &stored {
                    Some(value) => value.clone(),
                    None => doc.text_content(timestamp).unwrap_or_default(),
                };
                let relative = relative.trim();
                let Some(absolute) = parse_duration(relative).and_then(|d| d.offset_from(start))
                else {
                    return false;
                };
                let text = ctx.formatter.format(absolute, TimeStyle::Short);

                if stored.is_none() {
                    doc.set_attribute(timestamp, RELATIVE_ATTR, relative);
                }
                doc.add_class(timestamp, OverlayKind::ChatTimestamp.class_name());
                if doc.text_content(timestamp).as_deref() != Some(text.as_str()) {
                    doc.set_text_content(timestamp, &text);
                }
                true
            }
            ChatPresentation::Supplement => {
                let relative = doc.text_content(timestamp).unwrap_or_default();
                let Some(absolute) =
                    parse_duration(relative.trim()).and_then(|d| d.offset_from(start))
                else {
                    return false;
                };
                let text = format!("({})", ctx.formatter.format(absolute, TimeStyle::Short));

                let selector = OverlayKind::ChatTimestamp.selector();
                let node = match doc.query_selector_within(item, &selector) {
                    Some(existing) => existing,
                    None => {
                        let node = doc.create_element("span");
                        doc.add_class(node, OverlayKind::ChatTimestamp.class_name());
                        doc.insert_after(timestamp, node);
                        node
                    }
                };
                if doc.text_content(node).as_deref() != Some(text.as_str()) {
                    doc.set_text_content(node, &text);
                }
                true
            }
        }
    }

    /// 現在のコンテナ内の全アイテムを処理し、付与できた件数を返す
    pub fn annotate_all(&self, doc: &dyn HostDocument, ctx: &RenderContext) -> usize {
        let Some(container) = doc.query_selector(&self.items) else {
            return 0;
        };
        // コンテナ直下のアイテムのみ（入れ子のレンダラーは二重に処理しない）
        doc.query_selector_all_within(container, &self.item)
            .into_iter()
            .filter(|item| doc.parent(*item) == Some(container))
            .filter(|item| self.annotate_item(doc, *item, ctx))
            .count()
    }

    pub fn items_selector(&self) -> &str {
        &self.items
    }

    /// 付与した時刻を取り除き、置き換えた相対時刻を元に戻す
    pub fn remove(&self, doc: &dyn HostDocument) {
        for node in doc.query_selector_all(&OverlayKind::ChatTimestamp.selector()) {
            match doc.attribute(node, RELATIVE_ATTR) {
                Some(relative) => {
                    doc.set_text_content(node, &relative);
                    doc.remove_attribute(node, RELATIVE_ATTR);
                    doc.remove_class(node, OverlayKind::ChatTimestamp.class_name());
                }
                None => doc.remove(node),
            }
        }
    }
}
