//! ホストドキュメントの抽象化
//!
//! エンジンはブラウザのDOMを直接触らず、このトレイト越しに読み書きする。
//! - CSSセレクタのサブセットによる要素検索
//! - テキスト・属性・クラスの読み書き
//! - 子要素の追加・削除を通知するミューテーション購読
//! - クリックの転送

pub mod memory;
pub mod poll;
pub mod selector;

use std::sync::Arc;
use tokio::sync::broadcast;

pub use memory::MemoryDocument;
pub use poll::{poll_until, wait_for_element, PollSpec};
pub use selector::{Selector, SelectorError};

/// ドキュメント内のノードID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("node#{_0}")]
pub struct NodeId(pub u64);

/// 子要素リストの変更1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// 子リストが変更された要素
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn is_structural(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// 一度の操作で発生したミューテーションのまとまり
///
/// ホストが複数ノードをまとめて挿入した場合も1バッチで通知される。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    /// 指定ノードを対象とするレコードのみを抽出
    pub fn targeting(&self, target: NodeId) -> Vec<MutationRecord> {
        self.records
            .iter()
            .filter(|record| record.target == target && record.is_structural())
            .cloned()
            .collect()
    }
}

/// クリックリスナー（ディスパッチ時にドキュメント自身が渡される）
pub type ClickListener = Arc<dyn Fn(&dyn HostDocument) + Send + Sync>;

/// ホストドキュメントの操作インタフェース
pub trait HostDocument: Send + Sync {
    /// ドキュメント全体から最初に一致する要素を検索
    fn query_selector(&self, selector: &str) -> Option<NodeId>;

    /// ドキュメント全体から一致する要素をすべて検索（文書順）
    fn query_selector_all(&self, selector: &str) -> Vec<NodeId>;

    /// `scope`の子孫から最初に一致する要素を検索
    fn query_selector_within(&self, scope: NodeId, selector: &str) -> Option<NodeId>;

    /// `scope`の子孫から一致する要素をすべて検索
    fn query_selector_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// ノードがドキュメントのルートから到達可能か
    fn is_connected(&self, node: NodeId) -> bool;

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&self, node: NodeId, class: &str);

    fn remove_class(&self, node: NodeId, class: &str);

    /// 子孫テキストノードを連結した文字列
    fn text_content(&self, node: NodeId) -> Option<String>;

    /// 子要素をすべて単一のテキストノードに置き換える
    fn set_text_content(&self, node: NodeId, text: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    /// ドキュメントに未接続の要素を作成
    fn create_element(&self, tag: &str) -> NodeId;

    /// `child`を`parent`の末尾に追加（既存の親からは外される）
    fn append_child(&self, parent: NodeId, child: NodeId);

    /// `child`を`reference`の直後に挿入
    fn insert_after(&self, reference: NodeId, child: NodeId);

    /// ノードを親から取り外す
    fn remove(&self, node: NodeId);

    /// ミューテーション通知を購読
    fn subscribe(&self) -> broadcast::Receiver<MutationBatch>;

    fn add_click_listener(&self, node: NodeId, listener: ClickListener);

    /// クリックを発火（祖先へバブリング）
    fn click(&self, node: NodeId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(42).to_string(), "node#42");
    }

    #[test]
    fn test_batch_targeting() {
        let batch = MutationBatch {
            records: vec![
                MutationRecord {
                    target: NodeId(1),
                    added: vec![NodeId(2)],
                    removed: vec![],
                },
                MutationRecord {
                    target: NodeId(3),
                    added: vec![NodeId(4)],
                    removed: vec![],
                },
                MutationRecord {
                    target: NodeId(1),
                    added: vec![],
                    removed: vec![],
                },
            ],
        };

        let records = batch.targeting(NodeId(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].added, vec![NodeId(2)]);
    }
}
