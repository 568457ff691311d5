//! エンジン設定管理モジュール
//!
//! ホストページのセレクタ、ポーリング間隔、表示モードなどを
//! XDGディレクトリ配下の`config.toml`から読み込みます。

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// ホストページとの契約となるセレクタ群
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostSelectors {
    /// 開始時刻ラベルの挿入先
    pub start_label_anchor: String,
    /// シークプレビューのツールチップラッパー
    pub tooltip_wrapper: String,
    /// ラッパー内のプレビュー時刻テキスト
    pub tooltip_text: String,
    /// プレビュー中にラッパーの親要素が持つクラス
    pub preview_class: String,
    /// 再生位置の表示
    pub current_time: String,
    /// 総再生時間の表示
    pub total_duration: String,
    /// ライブ時計の挿入先
    pub live_clock_anchor: String,
    /// 「ライブに戻る」ボタン
    pub live_badge: String,
    /// チャットの外側コンテナ
    pub chat_outer: String,
    /// チャットアイテムのコンテナ
    pub chat_items: String,
    /// コンテナ内のチャットアイテム
    pub chat_item: String,
    /// チャットアイテム内のタイムスタンプ
    pub chat_timestamp: String,
}

impl Default for HostSelectors {
    fn default() -> Self {
        Self {
            start_label_anchor: "ytd-video-primary-info-renderer > #container > #info > #info-text"
                .to_string(),
            tooltip_wrapper: ".html5-video-player > div > .ytp-tooltip-text-wrapper".to_string(),
            tooltip_text: ".ytp-tooltip-text".to_string(),
            preview_class: "ytp-preview".to_string(),
            current_time: ".ytp-time-current".to_string(),
            total_duration: ".ytp-time-duration".to_string(),
            live_clock_anchor: ".ytp-time-display".to_string(),
            live_badge: ".ytp-live-badge".to_string(),
            chat_outer: "#item-list.yt-live-chat-renderer".to_string(),
            chat_items: "#items.yt-live-chat-item-list-renderer".to_string(),
            chat_item: "yt-live-chat-text-message-renderer".to_string(),
            chat_timestamp: "#content > #timestamp".to_string(),
        }
    }
}

/// 要素出現待ちのポーリング設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// ポーリング間隔（ms）
    pub interval_ms: u64,
    /// 挿入先要素の待ち時間上限（ms）
    pub element_timeout_ms: u64,
    /// ウォッチャー接続時の待ち時間上限（ms）
    pub watcher_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            element_timeout_ms: 1000,
            watcher_timeout_ms: 3000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn watcher_timeout(&self) -> Duration {
        Duration::from_millis(self.watcher_timeout_ms)
    }
}

/// チャットタイムスタンプの表示モード
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChatPresentation {
    /// 相対時刻を絶対時刻で置き換える
    #[default]
    Replace,
    /// 相対時刻を残し、隣に絶対時刻を追加する
    Supplement,
}

/// 表示設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DisplayConfig {
    pub chat_presentation: ChatPresentation,
    /// 固定UTCオフセット（分）。Noneの場合はシステムのローカル時刻
    pub utc_offset_minutes: Option<i32>,
}

/// コンテキスト間メッセージング設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MessagingConfig {
    /// フレームが開始時刻を待つ上限（ms）
    pub start_time_wait_ms: u64,
    /// 開始時刻の再問い合わせ間隔（ms）
    pub start_time_poll_ms: u64,
    /// リレーがトップレベルの応答を待つ上限（ms）
    pub forward_timeout_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            start_time_wait_ms: 10_000,
            start_time_poll_ms: 500,
            forward_timeout_ms: 1000,
        }
    }
}

impl MessagingConfig {
    pub fn start_time_wait(&self) -> Duration {
        Duration::from_millis(self.start_time_wait_ms)
    }

    pub fn start_time_poll(&self) -> Duration {
        Duration::from_millis(self.start_time_poll_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

/// ページ取得設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

/// エンジン全体の設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub selectors: HostSelectors,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub messaging: MessagingConfig,
    pub fetch: FetchConfig,
}

impl EngineConfig {
    /// TOML文字列から読み込み（未指定の項目はデフォルト値）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse engine config")
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGディレクトリの設定ファイルを使うマネージャーを作成
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Ok(Self { config_path })
    }

    /// 任意のパスを使うマネージャーを作成
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("dev", "yltv", "yltv").context("Failed to get project directories")?;

        let config_file = project_dirs.config_dir().join("config.toml");

        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<EngineConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(EngineConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config = EngineConfig::from_toml_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &EngineConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());

        Ok(())
    }

    /// 設定ファイルパスを取得
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
