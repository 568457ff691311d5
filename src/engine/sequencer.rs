//! パスを直列化するFIFOワーカー

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::pass::PassRunner;
use super::{PassReport, Trigger};

/// キューに積まれる1パス分の要求
#[derive(Debug)]
pub struct Job {
    pub trigger: Trigger,
    pub responder: oneshot::Sender<PassReport>,
}

/// ワーカータスクを起動し、投入口を返す
///
/// ワーカーはパスの状態（ウィンドウ・設定・ウォッチャー）を排他的に所有する。
/// 実行中に届いた要求はチャネルに溜まり、到着順に1件ずつ処理される。
pub fn spawn_worker(runner: PassRunner) -> mpsc::UnboundedSender<Job> {
    let (sender, receiver) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(run_worker(runner, receiver));
    sender
}

async fn run_worker(mut runner: PassRunner, mut receiver: mpsc::UnboundedReceiver<Job>) {
    debug!("🔄 [SEQUENCER] Worker started ({})", runner.role());

    while let Some(Job { trigger, responder }) = receiver.recv().await {
        let report = runner.run(trigger).await;
        // 待ち手がいなくてもパスは完了させる
        let _ = responder.send(report);
    }

    runner.shutdown();
    info!("🛑 [SEQUENCER] Worker stopped ({})", runner.role());
}
