//! チャット欄の2段ウォッチャー
//!
//! ホストはチャットのアイテムコンテナごと差し替えることがあるため、
//! 外側コンテナを監視し、変化のたびに内側（アイテムコンテナ）の
//! ウォッチャーを新しいコンテナへ付け直す。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dom::{wait_for_element, HostDocument, MutationRecord, PollSpec};
use crate::overlay::{ChatTimestamps, RenderContext};

use super::{MutationHandler, WatcherHandle};

#[derive(Default)]
struct InnerSlot {
    watcher: Option<WatcherHandle>,
    reattach: Option<JoinHandle<()>>,
    /// `clear`のたびに進む。古い再接続タスクの書き込みを弾く
    generation: u64,
}

impl InnerSlot {
    fn clear(&mut self) {
        self.generation += 1;
        if let Some(task) = self.reattach.take() {
            task.abort();
        }
        if let Some(mut watcher) = self.watcher.take() {
            watcher.detach();
        }
    }
}

/// チャット欄のウォッチャー
pub struct ChatWatcher {
    outer: WatcherHandle,
    inner: Arc<Mutex<InnerSlot>>,
    active: Arc<AtomicBool>,
    doc: Arc<dyn HostDocument>,
    overlay: Arc<ChatTimestamps>,
}

struct Shared {
    doc: Arc<dyn HostDocument>,
    overlay: Arc<ChatTimestamps>,
    ctx: Arc<RenderContext>,
    inner: Arc<Mutex<InnerSlot>>,
    active: Arc<AtomicBool>,
    spec: PollSpec,
}

impl Shared {
    /// 新しく追加されたアイテムに時刻を付与する
    fn item_handler(self: &Arc<Self>) -> MutationHandler {
        let shared = self.clone();
        Arc::new(move |doc: &dyn HostDocument, records: &[MutationRecord]| {
            if records.is_empty() {
                shared.overlay.annotate_all(doc, &shared.ctx);
                return;
            }
            for record in records {
                for node in &record.added {
                    shared.overlay.annotate_item(doc, *node, &shared.ctx);
                }
            }
        })
    }

    /// 現在のアイテムコンテナへ内側ウォッチャーを付け直す
    fn reattach_inner(self: &Arc<Self>) {
        let mut slot = self.inner.lock();
        slot.clear();
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let selector = self.overlay.items_selector().to_string();
        if let Some(container) = self.doc.query_selector(&selector) {
            slot.watcher = Some(WatcherHandle::observe(
                "chat-items",
                self.doc.clone(),
                container,
                self.item_handler(),
            ));
            return;
        }

        // コンテナの再描画待ち
        let shared = self.clone();
        let generation = slot.generation;
        slot.reattach = Some(tokio::spawn(async move {
            let Some(container) =
                wait_for_element(shared.doc.as_ref(), &selector, shared.spec).await
            else {
                debug!("⏳ [CHAT] Item container did not reappear");
                return;
            };

            // 待機中に切断・付け直しされていれば何もしない
            let mut slot = shared.inner.lock();
            if slot.generation != generation || !shared.active.load(Ordering::SeqCst) {
                return;
            }
            shared.overlay.annotate_all(shared.doc.as_ref(), &shared.ctx);
            slot.reattach = None;
            slot.watcher = Some(WatcherHandle::observe(
                "chat-items",
                shared.doc.clone(),
                container,
                shared.item_handler(),
            ));
        }));
    }
}

impl ChatWatcher {
    /// 外側コンテナの出現を待って監視を開始する
    ///
    /// 開始時点で既に表示されているアイテムにも時刻を付与する。
    pub async fn attach(
        doc: Arc<dyn HostDocument>,
        outer_selector: &str,
        overlay: Arc<ChatTimestamps>,
        ctx: Arc<RenderContext>,
        spec: PollSpec,
    ) -> Option<Self> {
        let outer = wait_for_element(doc.as_ref(), outer_selector, spec).await?;

        let shared = Arc::new(Shared {
            doc: doc.clone(),
            overlay: overlay.clone(),
            ctx,
            inner: Arc::new(Mutex::new(InnerSlot::default())),
            active: Arc::new(AtomicBool::new(true)),
            spec,
        });

        let annotated = shared.overlay.annotate_all(doc.as_ref(), &shared.ctx);
        shared.reattach_inner();

        let outer_shared = shared.clone();
        let outer_handler: MutationHandler =
            Arc::new(move |doc: &dyn HostDocument, _: &[MutationRecord]| {
                outer_shared.overlay.annotate_all(doc, &outer_shared.ctx);
                outer_shared.reattach_inner();
            });
        let outer = WatcherHandle::observe("chat-outer", doc.clone(), outer, outer_handler);

        info!("💬 [CHAT] Chat watcher attached ({} items annotated)", annotated);

        Some(Self {
            outer,
            inner: shared.inner.clone(),
            active: shared.active.clone(),
            doc,
            overlay,
        })
    }

    pub fn is_attached(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// 内側ウォッチャーが接続中か
    pub fn has_item_watcher(&self) -> bool {
        self.inner.lock().watcher.is_some()
    }

    /// 両方のウォッチャーを止め、付与した時刻を取り除く。何度呼んでもよい
    pub fn detach(&mut self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.outer.detach();
        self.inner.lock().clear();
        self.overlay.remove(self.doc.as_ref());
        debug!("🔌 [CHAT] Chat watcher detached");
    }
}

impl Drop for ChatWatcher {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ChatWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWatcher")
            .field("outer", &self.outer)
            .field("attached", &self.is_attached())
            .finish()
    }
}
