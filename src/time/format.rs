//! 絶対時刻の表示フォーマット

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use crate::models::{Settings, TimeFormat};

/// 表示スタイル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStyle {
    /// 日付 + 時:分（開始時刻ラベル）
    DateTime,
    /// 時:分（チャット）
    Short,
    /// 時:分:秒（ツールチップ・ライブ時計）
    WithSeconds,
}

/// 設定とタイムゾーンに従って時刻を文字列化する
#[derive(Debug, Clone, Copy)]
pub struct TimestampFormatter {
    time_format: TimeFormat,
    offset: FixedOffset,
}

impl TimestampFormatter {
    pub fn new(time_format: TimeFormat, offset: FixedOffset) -> Self {
        Self {
            time_format,
            offset,
        }
    }

    /// システムのローカルオフセットを使うフォーマッター
    pub fn local(time_format: TimeFormat) -> Self {
        Self::new(time_format, Local::now().offset().fix())
    }

    /// 設定と任意の固定オフセット（分）から作成
    pub fn from_settings(settings: &Settings, utc_offset_minutes: Option<i32>) -> Self {
        match utc_offset_minutes
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt)
        {
            Some(offset) => Self::new(settings.time_format, offset),
            None => Self::local(settings.time_format),
        }
    }

    pub fn time_format(&self) -> TimeFormat {
        self.time_format
    }

    pub fn format(&self, time: DateTime<Utc>, style: TimeStyle) -> String {
        let local = time.with_timezone(&self.offset);
        let pattern = match (style, self.time_format) {
            (TimeStyle::DateTime, TimeFormat::TwelveHour) => "%b %-d, %Y, %-I:%M %p",
            (TimeStyle::DateTime, TimeFormat::TwentyFourHour) => "%b %-d, %Y, %H:%M",
            (TimeStyle::Short, TimeFormat::TwelveHour) => "%-I:%M %p",
            (TimeStyle::Short, TimeFormat::TwentyFourHour) => "%H:%M",
            (TimeStyle::WithSeconds, TimeFormat::TwelveHour) => "%-I:%M:%S %p",
            (TimeStyle::WithSeconds, TimeFormat::TwentyFourHour) => "%H:%M:%S",
        };
        local.format(pattern).to_string()
    }
}
