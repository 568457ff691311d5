use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 時刻表示フォーマット
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl TimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::TwelveHour => "12h",
            TimeFormat::TwentyFourHour => "24h",
        }
    }
}

impl std::str::FromStr for TimeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "12h" => Ok(TimeFormat::TwelveHour),
            "24h" => Ok(TimeFormat::TwentyFourHour),
            other => Err(format!("unknown time format: {}", other)),
        }
    }
}

/// ユーザー設定のスナップショット
///
/// 設定ストアが所有し、エンジンはメッセージ経由で受け取った値を読むだけ。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub time_format: TimeFormat,
}

impl Settings {
    pub fn new(time_format: TimeFormat) -> Self {
        Self { time_format }
    }
}

/// 視聴中の動画の開始・終了時刻
///
/// `start_time`がない場合はオーバーレイを一切描画しない。
/// `end_time`がある場合は配信終了済み（アーカイブ）を意味する。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionWindow {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionWindow {
    pub fn new(start_time: Option<DateTime<Utc>>, end_time: Option<DateTime<Utc>>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// 開始・終了ともに不明なウィンドウ
    pub fn empty() -> Self {
        Self::default()
    }

    /// 配信がまだ続いているか（開始済みで終了時刻なし）
    pub fn is_ongoing(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_none()
    }

    pub fn has_start(&self) -> bool {
        self.start_time.is_some()
    }
}
