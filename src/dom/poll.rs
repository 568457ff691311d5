//! 要素・値の出現を待つ有界リトライ

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::{HostDocument, NodeId};

/// ポーリング間隔と期限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// `probe`が値を返すまで一定間隔で繰り返す。期限切れなら`None`
///
/// 初回は即座に試行し、以降は`interval`ごとに再試行する。
pub async fn poll_until<T, F, Fut>(spec: PollSpec, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + spec.timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(
            spec.interval
                .min(deadline.saturating_duration_since(Instant::now())),
        )
        .await;
    }
}

/// セレクタに一致する要素が現れるまで待つ
///
/// ホストページは非同期に描画されるため、呼び出し時点で
/// 挿入先が存在しないことがある。
pub async fn wait_for_element(
    doc: &dyn HostDocument,
    selector: &str,
    spec: PollSpec,
) -> Option<NodeId> {
    let found = poll_until(spec, move || async move { doc.query_selector(selector) }).await;
    if found.is_none() {
        tracing::debug!(
            "⏳ [POLL] Element not found within {:?}: {}",
            spec.timeout,
            selector
        );
    }
    found
}
