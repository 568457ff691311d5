//! コンテキスト間メッセージング
//!
//! 特権リレー・トップレベルのページスクリプト・チャットフレームの
//! 3種類のコンテキストが、リレーを中継点として型付きメッセージをやり取りする。
//! メッセージはすべて一度きりで冪等。

pub mod relay;
pub mod settings_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::models::Settings;

pub use relay::{Port, Relay, RelayClient, RelayWindowSource};
pub use settings_store::MemorySettingsStore;

/// ブラウザタブ
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("tab#{_0}")]
pub struct TabId(pub u32);

/// タブ内のフレーム
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("frame#{_0}")]
pub struct FrameId(pub u32);

/// メッセージの送受信元となるスクリプトのコンテキスト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ContextId {
    /// トップレベルのページスクリプト
    #[display("page({_0})")]
    Page(TabId),
    /// 埋め込みフレームのスクリプト
    #[display("frame({_0}, {_1})")]
    Frame(TabId, FrameId),
}

impl ContextId {
    pub fn tab(&self) -> TabId {
        match self {
            ContextId::Page(tab) | ContextId::Frame(tab, _) => *tab,
        }
    }
}

/// リレーからスクリプトへの通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// タブのURLが変わった
    UrlChanged { url: String },
    /// 設定が更新された
    SettingsChanged { settings: Settings },
}

/// 応答を伴う要求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// スクリプト起動時の設定要求（リレーが応答）
    ContentScriptReady,
    /// 開始時刻の要求（フレーム → リレー → トップレベル）
    StartTimeRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    Settings {
        settings: Settings,
    },
    #[serde(rename_all = "camelCase")]
    StartTimeResponse {
        start_time: Option<DateTime<Utc>>,
    },
}

/// スクリプトが受け取るメッセージ
#[derive(Debug)]
pub enum Inbound {
    Notification(Notification),
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Destination disconnected")]
    Disconnected,
    #[error("No route to {0}")]
    NoRoute(ContextId),
    #[error("No response within the forward timeout")]
    Timeout,
    #[error("Request {request:?} is not accepted from {from}")]
    Unsupported { request: Request, from: ContextId },
    #[error("Unexpected response: {0:?}")]
    UnexpectedResponse(Response),
}
