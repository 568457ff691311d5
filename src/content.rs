//! コンテンツスクリプト
//!
//! 各スクリプトはリレーに接続して設定を受け取り、自身のエンジンを起動する。
//! 以降はリレーからの通知をエンジンのパスに変換する。

pub mod frame;
pub mod page;

use tracing::{debug, warn};

use crate::engine::{Engine, Trigger};
use crate::messaging::{Inbound, Notification, Port, Request, Response};

pub use frame::FrameScript;
pub use page::PageScript;

/// 通知をエンジンへ投入する
///
/// 投入は同期的に行い、完了は待たない（順序はキューが保証する）。
pub(crate) fn dispatch_notification(engine: &Engine, notification: Notification) {
    match notification {
        Notification::UrlChanged { url } => {
            debug!("🧭 [CONTENT] url-changed: {}", url);
            engine.submit(Trigger::Navigation { url });
        }
        Notification::SettingsChanged { settings } => {
            debug!(
                "⚙️ [CONTENT] settings-changed: {}",
                settings.time_format.as_str()
            );
            engine.submit(Trigger::SettingsChanged(settings));
        }
    }
}

/// ポートが閉じるまで受信メッセージを処理する
///
/// 要求への応答は`answer`に委ね、応答できない要求は破棄する
/// （要求元はタイムアウトで諦める）。
pub(crate) async fn serve(
    mut port: Port,
    engine: Engine,
    answer: impl Fn(&Engine, Request) -> Option<Response>,
) {
    while let Some(inbound) = port.recv().await {
        match inbound {
            Inbound::Notification(notification) => dispatch_notification(&engine, notification),
            Inbound::Request { request, reply } => match answer(&engine, request) {
                Some(response) => {
                    let _ = reply.send(response);
                }
                None => warn!(
                    "⚠️ [CONTENT] {} cannot answer {:?}",
                    port.id(),
                    request
                ),
            },
        }
    }
    debug!("👋 [CONTENT] {} port closed", port.id());
}
