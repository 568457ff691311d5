//! エンジンと外部コラボレーターの境界となるトレイト定義

use async_trait::async_trait;

use crate::models::{SessionWindow, Settings};

/// セッションウィンドウ（開始・終了時刻）の取得元
///
/// トップレベルのページスクリプトはHTTPで動画ページを再取得し、
/// チャットフレームはリレー経由でトップレベルに問い合わせる。
/// どちらも失敗は空のウィンドウとして返す。
#[async_trait]
pub trait WindowSource: Send + Sync {
    async fn resolve(&self, page_url: &str) -> SessionWindow;
}

/// 設定ストアの抽象インタフェース
///
/// 永続化は設定UI側の責務。リレーは現在値の読み出しと更新のみ行う。
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// 現在の設定を取得
    async fn load(&self) -> Settings;

    /// 設定を更新
    async fn save(&self, settings: Settings);
}
