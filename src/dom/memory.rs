//! メモリ上のホストドキュメント実装
//!
//! ブラウザDOMの子リスト変更・テキストノード・クリックのバブリングを
//! 必要な範囲で再現する。テストや、リモートDOMをミラーする組み込み先で使う。
//!
//! `remove`・`replace_child`・`set_text_content`で取り除かれたノードは
//! 子孫ごと解放される。ノードの移動は`append_child`系で行う。

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;

use super::selector::{Compound, Selector, SelectorError, SelectorTree};
use super::{ClickListener, HostDocument, MutationBatch, MutationRecord, NodeId};

const TEXT_TAG: &str = "#text";
const DOCUMENT_TAG: &str = "#document";

#[derive(Default)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    /// テキストノードの内容
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<ClickListener>,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    fn text(text: &str) -> Self {
        Self {
            tag: TEXT_TAG.to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn is_element(&self) -> bool {
        self.text.is_none() && self.tag != DOCUMENT_TAG
    }
}

struct Tree {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    root: NodeId,
    /// トランザクション中に蓄積されるレコード
    pending: Option<Vec<MutationRecord>>,
}

impl Tree {
    fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::element(DOCUMENT_TAG));
        Self {
            nodes,
            next_id: 1,
            root,
            pending: None,
        }
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn detach(&mut self, node: NodeId) -> Option<MutationRecord> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != node);
        }
        Some(MutationRecord {
            target: parent,
            added: vec![],
            removed: vec![node],
        })
    }

    /// 親のないノードを子孫ごと解放する
    fn release(&mut self, node: NodeId) {
        if node == self.root || self.parent_of(node).is_some() {
            return;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(n) = self.nodes.remove(&current) {
                stack.extend(n.children);
            }
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> bool {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return false;
        }
        // 自分の祖先を子にすることはできない
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return false;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let position = index
                .unwrap_or(parent_node.children.len())
                .min(parent_node.children.len());
            parent_node.children.insert(position, child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        true
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            result.push(node);
            if let Some(n) = self.nodes.get(&node) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        result
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        if let Some(text) = &n.text {
            out.push_str(text);
            return;
        }
        for child in &n.children {
            self.collect_text(*child, out);
        }
    }

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }
}

impl SelectorTree for Tree {
    fn element_tag(&self, node: NodeId) -> Option<&str> {
        self.nodes
            .get(&node)
            .filter(|n| n.is_element())
            .map(|n| n.tag.as_str())
    }

    fn element_id(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).and_then(|n| n.id.as_deref())
    }

    fn element_has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }
}

/// メモリ上のドキュメント
pub struct MemoryDocument {
    tree: Mutex<Tree>,
    sender: broadcast::Sender<MutationBatch>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            tree: Mutex::new(Tree::new()),
            sender,
        }
    }

    /// ドキュメントルート
    pub fn root(&self) -> NodeId {
        self.tree.lock().root
    }

    /// 保持しているノード数（未接続の作成済みノードを含む）
    pub fn node_count(&self) -> usize {
        self.tree.lock().nodes.len()
    }

    /// `tag#id.class`形式の指定から未接続の要素を作成
    pub fn create_from_spec(&self, spec: &str) -> Result<NodeId, SelectorError> {
        let compound = Compound::parse(spec)?;
        let mut node = Node::element(compound.tag.as_deref().unwrap_or("div"));
        node.id = compound.id;
        node.classes = compound.classes;
        Ok(self.tree.lock().insert(node))
    }

    /// 要素を作成して`parent`の末尾に追加
    pub fn append_element(&self, parent: NodeId, spec: &str) -> Result<NodeId, SelectorError> {
        let node = self.create_from_spec(spec)?;
        self.append_child(parent, node);
        Ok(node)
    }

    /// テキストノードを作成して`parent`の末尾に追加
    pub fn append_text(&self, parent: NodeId, text: &str) -> NodeId {
        let node = self.tree.lock().insert(Node::text(text));
        self.append_child(parent, node);
        node
    }

    /// 複数の子を一度に追加（1レコードで通知）
    pub fn append_children(&self, parent: NodeId, children: &[NodeId]) {
        let records = {
            let mut tree = self.tree.lock();
            let mut records = Vec::new();
            let mut added = Vec::new();
            for child in children {
                if let Some(record) = tree.detach(*child) {
                    records.push(record);
                }
                if tree.attach(parent, *child, None) {
                    added.push(*child);
                }
            }
            records.push(MutationRecord {
                target: parent,
                added,
                removed: vec![],
            });
            records
        };
        self.emit(records);
    }

    /// `old`を`new`で置き換える（1レコードで通知）
    pub fn replace_child(&self, old: NodeId, new: NodeId) {
        let records = {
            let mut tree = self.tree.lock();
            let Some(parent) = tree.parent_of(old) else {
                return;
            };
            let mut records = Vec::new();
            if let Some(record) = tree.detach(new) {
                records.push(record);
            }
            let index = tree
                .nodes
                .get(&parent)
                .and_then(|n| n.children.iter().position(|c| *c == old));
            tree.detach(old);
            if !tree.attach(parent, new, index) {
                // 置き換えに失敗したら元に戻す
                tree.attach(parent, old, index);
                return;
            }
            tree.release(old);
            records.push(MutationRecord {
                target: parent,
                added: vec![new],
                removed: vec![old],
            });
            records
        };
        self.emit(records);
    }

    /// クロージャ内の変更を1バッチにまとめて通知する
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let nested = {
            let mut tree = self.tree.lock();
            if tree.pending.is_some() {
                true
            } else {
                tree.pending = Some(Vec::new());
                false
            }
        };

        let result = f(self);

        if !nested {
            let records = self.tree.lock().pending.take().unwrap_or_default();
            self.send(records);
        }
        result
    }

    fn emit(&self, records: Vec<MutationRecord>) {
        let records: Vec<MutationRecord> =
            records.into_iter().filter(|r| r.is_structural()).collect();
        if records.is_empty() {
            return;
        }
        {
            let mut tree = self.tree.lock();
            if let Some(pending) = tree.pending.as_mut() {
                pending.extend(records);
                return;
            }
        }
        self.send(records);
    }

    fn send(&self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        // 購読者がいない場合のエラーは無視する
        let _ = self.sender.send(MutationBatch { records });
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl HostDocument for MemoryDocument {
    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let root = self.root();
        self.query_selector_within(root, selector)
    }

    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let root = self.root();
        self.query_selector_all_within(root, selector)
    }

    fn query_selector_within(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all_within(scope, selector)
            .into_iter()
            .next()
    }

    fn query_selector_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(selector) => self.tree.lock().query_all(scope, &selector),
            Err(e) => {
                tracing::warn!("⚠️ [DOM] Invalid selector '{}': {}", selector, e);
                Vec::new()
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().parent_of(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let tree = self.tree.lock();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == tree.root {
                return true;
            }
            cursor = tree.parent_of(current);
        }
        false
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.tree.lock().element_has_class(node, class)
    }

    fn add_class(&self, node: NodeId, class: &str) {
        if let Some(n) = self.tree.lock().nodes.get_mut(&node) {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        if let Some(n) = self.tree.lock().nodes.get_mut(&node) {
            n.classes.retain(|c| c != class);
        }
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        let tree = self.tree.lock();
        if !tree.nodes.contains_key(&node) {
            return None;
        }
        let mut out = String::new();
        tree.collect_text(node, &mut out);
        Some(out)
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        let record = {
            let mut tree = self.tree.lock();
            let Some(n) = tree.nodes.get_mut(&node) else {
                return;
            };
            if n.text.is_some() {
                // テキストノード自体の書き換えは子リストの変更ではない
                n.text = Some(text.to_string());
                return;
            }
            let removed = std::mem::take(&mut n.children);
            for child in &removed {
                if let Some(c) = tree.nodes.get_mut(child) {
                    c.parent = None;
                }
                tree.release(*child);
            }
            let mut added = Vec::new();
            if !text.is_empty() {
                let text_node = tree.insert(Node::text(text));
                tree.attach(node, text_node, None);
                added.push(text_node);
            }
            MutationRecord {
                target: node,
                added,
                removed,
            }
        };
        self.emit(vec![record]);
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let tree = self.tree.lock();
        let n = tree.nodes.get(&node)?;
        match name {
            "id" => n.id.clone(),
            "class" if !n.classes.is_empty() => Some(n.classes.join(" ")),
            _ => n.attributes.get(name).cloned(),
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.tree.lock().nodes.get_mut(&node) {
            match name {
                "id" => n.id = Some(value.to_string()),
                "class" => {
                    n.classes = value.split_whitespace().map(str::to_string).collect();
                }
                _ => {
                    n.attributes.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(n) = self.tree.lock().nodes.get_mut(&node) {
            match name {
                "id" => n.id = None,
                "class" => n.classes.clear(),
                _ => {
                    n.attributes.remove(name);
                }
            }
        }
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.tree.lock().insert(Node::element(tag))
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        let records = {
            let mut tree = self.tree.lock();
            let mut records = Vec::new();
            if let Some(record) = tree.detach(child) {
                records.push(record);
            }
            if tree.attach(parent, child, None) {
                records.push(MutationRecord {
                    target: parent,
                    added: vec![child],
                    removed: vec![],
                });
            }
            records
        };
        self.emit(records);
    }

    fn insert_after(&self, reference: NodeId, child: NodeId) {
        let records = {
            let mut tree = self.tree.lock();
            let Some(parent) = tree.parent_of(reference) else {
                return;
            };
            let mut records = Vec::new();
            if let Some(record) = tree.detach(child) {
                records.push(record);
            }
            let index = tree
                .nodes
                .get(&parent)
                .and_then(|n| n.children.iter().position(|c| *c == reference))
                .map(|i| i + 1);
            if tree.attach(parent, child, index) {
                records.push(MutationRecord {
                    target: parent,
                    added: vec![child],
                    removed: vec![],
                });
            }
            records
        };
        self.emit(records);
    }

    fn remove(&self, node: NodeId) {
        let record = {
            let mut tree = self.tree.lock();
            let record = tree.detach(node);
            if record.is_some() {
                tree.release(node);
            }
            record
        };
        if let Some(record) = record {
            self.emit(vec![record]);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MutationBatch> {
        self.sender.subscribe()
    }

    fn add_click_listener(&self, node: NodeId, listener: ClickListener) {
        if let Some(n) = self.tree.lock().nodes.get_mut(&node) {
            n.listeners.push(listener);
        }
    }

    fn click(&self, node: NodeId) {
        // リスナーはロックを解放してから呼ぶ（リスナー内でドキュメントを操作するため）
        let listeners: Vec<ClickListener> = {
            let tree = self.tree.lock();
            let mut listeners = Vec::new();
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if let Some(n) = tree.nodes.get(&current) {
                    listeners.extend(n.listeners.iter().cloned());
                }
                cursor = tree.parent_of(current);
            }
            listeners
        };

        for listener in listeners {
            listener(self as &dyn HostDocument);
        }
    }
}
