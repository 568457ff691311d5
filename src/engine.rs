//! 再初期化エンジン
//!
//! ナビゲーションや設定変更のたびに「ウォッチャー切断 → オーバーレイ除去 →
//! ウィンドウ解決 → 描画 → ウォッチャー接続」のパスを実行する。
//! パスは単一のワーカータスクがFIFO順に1つずつ処理する。

pub mod pass;
pub mod sequencer;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::api::time_source::HttpTimeSource;
use crate::config::EngineConfig;
use crate::dom::HostDocument;
use crate::models::{SessionWindow, Settings};
use crate::overlay::OverlayKind;
use crate::time::{Clock, SystemClock};
use crate::traits::WindowSource;

pub use pass::PassRunner;
pub use sequencer::Job;

/// エンジンが動作するコンテキスト
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EngineRole {
    /// 動画ページ本体（ラベル・ツールチップ・ライブ時計）
    #[display("top-level")]
    TopLevel,
    /// 埋め込みチャットフレーム（チャットタイムスタンプ）
    #[display("chat-frame")]
    ChatFrame,
}

/// パスの起動要因
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// ページ遷移。ウィンドウを必ず取り直す
    Navigation { url: String },
    /// 設定変更。既知のウィンドウを再利用する
    SettingsChanged(Settings),
}

impl Trigger {
    pub fn navigation(url: impl Into<String>) -> Self {
        Trigger::Navigation { url: url.into() }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Navigation { .. } => TriggerKind::Navigation,
            Trigger::SettingsChanged(_) => TriggerKind::SettingsChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum TriggerKind {
    #[display("navigation")]
    Navigation,
    #[display("settings-changed")]
    SettingsChanged,
}

/// 1パスの実行結果
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// 1から始まる通し番号（実行順）
    pub sequence: u64,
    pub trigger: TriggerKind,
    /// 直近のナビゲーションで解決したページ（設定変更パスでも引き継ぐ）
    pub page_url: Option<String>,
    pub window: SessionWindow,
    pub settings: Settings,
    pub rendered: Vec<OverlayKind>,
    pub watchers: Vec<OverlayKind>,
}

impl PassReport {
    pub fn has_rendered(&self, kind: OverlayKind) -> bool {
        self.rendered.contains(&kind)
    }

    pub fn has_watcher(&self, kind: OverlayKind) -> bool {
        self.watchers.contains(&kind)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine worker has stopped")]
    Stopped,
}

/// エンジンの外部依存
#[derive(Clone)]
pub struct EngineDeps {
    pub document: Arc<dyn HostDocument>,
    pub window_source: Arc<dyn WindowSource>,
    pub clock: Arc<dyn Clock>,
}

impl EngineDeps {
    pub fn new(document: Arc<dyn HostDocument>, window_source: Arc<dyn WindowSource>) -> Self {
        Self {
            document,
            window_source,
            clock: Arc::new(SystemClock),
        }
    }

    /// 動画ページをHTTPで取得するトップレベル用の依存
    pub fn for_page(document: Arc<dyn HostDocument>, config: &EngineConfig) -> Self {
        Self::new(document, Arc::new(HttpTimeSource::new(&config.fetch)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// 外部へ公開するウィンドウ
///
/// 未処理のナビゲーションがある間は常に空を公開する。これにより
/// 遷移後の開始時刻要求に前の動画の開始時刻を返すことはない。
#[derive(Debug)]
pub struct WindowBoard {
    sender: watch::Sender<SessionWindow>,
    pending_navigations: Mutex<usize>,
}

impl WindowBoard {
    fn new() -> (Arc<Self>, watch::Receiver<SessionWindow>) {
        let (sender, receiver) = watch::channel(SessionWindow::empty());
        let board = Arc::new(Self {
            sender,
            pending_navigations: Mutex::new(0),
        });
        (board, receiver)
    }

    /// ナビゲーションがキューに積まれた
    fn navigation_queued(&self) {
        let mut pending = self.pending_navigations.lock();
        *pending += 1;
        self.sender.send_replace(SessionWindow::empty());
    }

    /// キューのナビゲーションをワーカーが取り出した
    pub(crate) fn navigation_started(&self) {
        let mut pending = self.pending_navigations.lock();
        *pending = pending.saturating_sub(1);
        self.sender.send_replace(SessionWindow::empty());
    }

    /// 解決したウィンドウを公開する。後続のナビゲーションが待っていれば空のまま
    pub(crate) fn publish(&self, window: SessionWindow) -> bool {
        let pending = self.pending_navigations.lock();
        if *pending > 0 {
            debug!(
                "⏭️ [ENGINE] {} navigation(s) pending, window not published",
                *pending
            );
            return false;
        }
        self.sender.send_replace(window);
        true
    }
}

/// 投入済みパスの完了待ち
#[derive(Debug)]
pub struct PassTicket {
    receiver: oneshot::Receiver<PassReport>,
}

impl PassTicket {
    pub async fn wait(self) -> Result<PassReport, EngineError> {
        self.receiver.await.map_err(|_| EngineError::Stopped)
    }
}

/// エンジンへのハンドル
///
/// クローンは同じワーカーを共有する。最後のハンドルが破棄されると
/// ワーカーはキューを処理し終えてから停止し、ウォッチャーを切断する。
#[derive(Debug, Clone)]
pub struct Engine {
    role: EngineRole,
    jobs: mpsc::UnboundedSender<Job>,
    board: Arc<WindowBoard>,
    window: watch::Receiver<SessionWindow>,
}

impl Engine {
    /// ワーカーを起動する（tokioランタイム内で呼ぶこと）
    pub fn spawn(
        role: EngineRole,
        config: EngineConfig,
        deps: EngineDeps,
        settings: Settings,
    ) -> Self {
        let (board, window) = WindowBoard::new();
        let runner = PassRunner::new(role, config, deps, settings, board.clone());
        let jobs = sequencer::spawn_worker(runner);

        tracing::info!("🚀 [ENGINE] {} engine started", role);

        Self {
            role,
            jobs,
            board,
            window,
        }
    }

    pub fn role(&self) -> EngineRole {
        self.role
    }

    /// パスを投入する
    ///
    /// 順序は呼び出し時点で確定し、実行中のパスがあれば後ろに並ぶ。
    /// ナビゲーションは投入した時点で公開中のウィンドウを空にする。
    pub fn submit(&self, trigger: Trigger) -> PassTicket {
        if matches!(trigger, Trigger::Navigation { .. }) {
            self.board.navigation_queued();
        }
        let (responder, receiver) = oneshot::channel();
        if self.jobs.send(Job { trigger, responder }).is_err() {
            tracing::warn!("⚠️ [ENGINE] Worker stopped, trigger dropped");
        }
        PassTicket { receiver }
    }

    /// パスを投入して完了まで待つ
    pub async fn reinit(&self, trigger: Trigger) -> Result<PassReport, EngineError> {
        self.submit(trigger).wait().await
    }

    /// 直近のパスで解決したウィンドウ（遷移待ちの間は空）
    pub fn current_window(&self) -> SessionWindow {
        *self.window.borrow()
    }

    /// ウィンドウ更新の購読
    pub fn window_updates(&self) -> watch::Receiver<SessionWindow> {
        self.window.clone()
    }
}
