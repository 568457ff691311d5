//! ホスト要素の子リスト変更を監視するウォッチャー
//!
//! ウォッチャーは対象ノードを対象とするミューテーションだけを
//! ハンドラへ渡す。ハンドルを`detach`（またはdrop）すると監視は止まり、
//! 登録済みのクリーンアップ（オーバーレイの除去）が一度だけ実行される。
//!
//! ハンドラは接続状態のロックを保持したまま実行される。`detach`は同じロックを
//! 取ってから状態を落とすため、戻った時点で実行中のハンドラは残っていない。

pub mod chat;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dom::{wait_for_element, HostDocument, MutationRecord, NodeId, PollSpec};

pub use chat::ChatWatcher;

/// ミューテーション通知のハンドラ
///
/// 通知を取りこぼした場合は空スライスで呼ばれるので、
/// ハンドラはホストの現在状態から描画し直す。
pub type MutationHandler = Arc<dyn Fn(&dyn HostDocument, &[MutationRecord]) + Send + Sync>;

type Cleanup = Box<dyn FnOnce() + Send + Sync>;

/// 接続中のウォッチャー
pub struct WatcherHandle {
    name: String,
    target: NodeId,
    active: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
    cleanup: Option<Cleanup>,
}

impl WatcherHandle {
    /// 既知のノードの監視を開始する
    ///
    /// 購読はこの関数内で同期的に行うため、戻った時点以降の変更は取りこぼさない。
    pub fn observe(
        name: impl Into<String>,
        doc: Arc<dyn HostDocument>,
        target: NodeId,
        handler: MutationHandler,
    ) -> Self {
        let name = name.into();
        let active = Arc::new(Mutex::new(true));
        let mut receiver = doc.subscribe();

        let task_active = active.clone();
        let task_name = name.clone();
        let task = tokio::spawn(async move {
            loop {
                let records = match receiver.recv().await {
                    Ok(batch) => {
                        let records = batch.targeting(target);
                        if records.is_empty() {
                            continue;
                        }
                        records
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "⚠️ [WATCHER] {} lagged behind by {} batches, resyncing",
                            task_name, skipped
                        );
                        Vec::new()
                    }
                    Err(RecvError::Closed) => break,
                };

                let attached = task_active.lock();
                if !*attached {
                    break;
                }
                handler(doc.as_ref(), &records);
                drop(attached);
            }
            debug!("👋 [WATCHER] {} task finished", task_name);
        });

        debug!("👀 [WATCHER] {} attached to {}", name, target);

        Self {
            name,
            target,
            active,
            task: Some(task),
            cleanup: None,
        }
    }

    /// 対象要素の出現を待ってから監視を開始する
    ///
    /// 期限内に見つからなければ`None`（このパスでは未接続のまま）。
    pub async fn attach(
        name: impl Into<String>,
        doc: Arc<dyn HostDocument>,
        selector: &str,
        spec: PollSpec,
        handler: MutationHandler,
    ) -> Option<Self> {
        let name = name.into();
        let Some(target) = wait_for_element(doc.as_ref(), selector, spec).await else {
            debug!("⏳ [WATCHER] {} target not found: {}", name, selector);
            return None;
        };
        Some(Self::observe(name, doc, target, handler))
    }

    /// 切断時に実行する処理を登録する
    pub fn with_cleanup(mut self, cleanup: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn is_attached(&self) -> bool {
        *self.active.lock()
    }

    /// 監視を停止する。何度呼んでもよい
    ///
    /// 実行中のハンドラがあれば終わるまで待つ。ハンドラ内から呼んではならない。
    pub fn detach(&mut self) {
        {
            let mut attached = self.active.lock();
            if !*attached {
                return;
            }
            *attached = false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
        debug!("🔌 [WATCHER] {} detached from {}", self.name, self.target);
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// スロット内のウォッチャーを切断する（未接続なら何もしない）
pub fn detach(slot: &mut Option<WatcherHandle>) {
    if let Some(mut handle) = slot.take() {
        handle.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn spec() -> PollSpec {
        PollSpec::new(Duration::from_millis(10), Duration::from_millis(100))
    }

    fn recording_handler(calls: Arc<Mutex<Vec<usize>>>) -> MutationHandler {
        Arc::new(move |_: &dyn HostDocument, records: &[MutationRecord]| {
            calls.lock().push(records.len());
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_only_target_mutations_are_delivered() {
        let doc = Arc::new(MemoryDocument::new());
        let target = doc.append_element(doc.root(), "div#target").unwrap();
        let other = doc.append_element(doc.root(), "div#other").unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let _handle = WatcherHandle::attach(
            "test",
            doc.clone(),
            "#target",
            spec(),
            recording_handler(calls.clone()),
        )
        .await
        .unwrap();

        doc.append_element(other, "span").unwrap();
        doc.append_element(target, "span").unwrap();
        settle().await;

        assert_eq!(*calls.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_missing_target_is_not_attached() {
        let doc: Arc<dyn HostDocument> = Arc::new(MemoryDocument::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handle =
            WatcherHandle::attach("test", doc, "#missing", spec(), recording_handler(calls)).await;
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_detach_stops_delivery_and_runs_cleanup_once() {
        let doc = Arc::new(MemoryDocument::new());
        let target = doc.append_element(doc.root(), "div#target").unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();

        let mut handle = WatcherHandle::observe(
            "test",
            doc.clone(),
            target,
            recording_handler(calls.clone()),
        )
        .with_cleanup(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.detach();
        handle.detach();
        assert!(!handle.is_attached());

        doc.append_element(target, "span").unwrap();
        settle().await;

        assert!(calls.lock().is_empty());
        drop(handle);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let doc = Arc::new(MemoryDocument::new());
        let target = doc.append_element(doc.root(), "div#target").unwrap();
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();

        let mut slot = Some(
            WatcherHandle::observe(
                "test",
                doc.clone(),
                target,
                Arc::new(|_: &dyn HostDocument, _: &[MutationRecord]| {}),
            )
            .with_cleanup(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        detach(&mut slot);
        detach(&mut slot);
        assert!(slot.is_none());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_detach_waits_for_running_handler() {
        let doc = Arc::new(MemoryDocument::new());
        let target = doc.append_element(doc.root(), "div#target").unwrap();
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let (handler_started, handler_finished) = (started.clone(), finished.clone());
        let mut handle = WatcherHandle::observe(
            "slow",
            doc.clone(),
            target,
            Arc::new(move |_: &dyn HostDocument, _: &[MutationRecord]| {
                handler_started.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                handler_finished.store(true, Ordering::SeqCst);
            }),
        );

        doc.append_element(target, "span").unwrap();
        for _ in 0..100 {
            if started.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(started.load(Ordering::SeqCst));

        handle.detach();
        assert!(finished.load(Ordering::SeqCst));
    }
}
