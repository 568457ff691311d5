//! 再生時間文字列（"H:MM:SS" / "MM:SS"）のパースと加算

use chrono::{DateTime, TimeDelta, Utc};

/// 相対時間
///
/// 3つのフィールドは常に同じ符号を持つ。`"-12:30"`は
/// `{ hours: 0, minutes: -12, seconds: -30 }`として保持される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelativeDuration {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl RelativeDuration {
    /// 正の相対時間を作成
    pub fn new(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// 大きさを指定して負の相対時間を作成
    pub fn negative(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours: -hours.abs(),
            minutes: -minutes.abs(),
            seconds: -seconds.abs(),
        }
    }

    /// 秒数から正規化された相対時間を作成
    pub fn from_total_seconds(total: i64) -> Self {
        let sign = if total < 0 { -1 } else { 1 };
        let magnitude = total.unsigned_abs();
        Self {
            hours: sign * (magnitude / 3600) as i64,
            minutes: sign * (magnitude % 3600 / 60) as i64,
            seconds: sign * (magnitude % 60) as i64,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.hours
            .saturating_mul(3600)
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds)
    }

    pub fn is_negative(&self) -> bool {
        self.hours < 0 || self.minutes < 0 || self.seconds < 0
    }

    /// 表現できない大きさの場合は`None`
    pub fn to_time_delta(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.total_seconds())
    }

    /// 基準時刻にこの相対時間を加算する（符号込み）
    pub fn offset_from(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        reference.checked_add_signed(self.to_time_delta()?)
    }
}

impl std::fmt::Display for RelativeDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(
            f,
            "{}{}:{:02}:{:02}",
            sign,
            self.hours.abs(),
            self.minutes.abs(),
            self.seconds.abs()
        )
    }
}

/// 表示文字列を相対時間にパースする
///
/// 先頭の`-`は全体の符号として扱う。各セグメントは数字のみ。
/// セグメント数が2または3以外、または数値でないセグメントがあれば`None`。
pub fn parse_duration(text: &str) -> Option<RelativeDuration> {
    let text = text.trim();
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text),
    };

    let units = body
        .split(':')
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            segment.parse::<i64>().ok().map(|value| sign * value)
        })
        .collect::<Option<Vec<_>>>()?;

    match units.as_slice() {
        [hours, minutes, seconds] => Some(RelativeDuration::new(*hours, *minutes, *seconds)),
        [minutes, seconds] => Some(RelativeDuration::new(0, *minutes, *seconds)),
        _ => None,
    }
}

/// 2つの相対時間を加算し、秒→分→時へ繰り上げる
pub fn add_durations(a: RelativeDuration, b: RelativeDuration) -> RelativeDuration {
    RelativeDuration::from_total_seconds(a.total_seconds().saturating_add(b.total_seconds()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_three_segments() {
        assert_eq!(
            parse_duration("1:02:03"),
            Some(RelativeDuration::new(1, 2, 3))
        );
    }

    #[test]
    fn test_parse_two_segments() {
        assert_eq!(parse_duration("12:05"), Some(RelativeDuration::new(0, 12, 5)));
    }

    #[test]
    fn test_parse_negative() {
        let duration = parse_duration("-12:30").unwrap();
        assert_eq!(duration, RelativeDuration::negative(0, 12, 30));
        assert!(duration.is_negative());
        assert_eq!(duration.total_seconds(), -750);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(
            parse_duration("\n  3:00 \n"),
            Some(RelativeDuration::new(0, 3, 0))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_duration("12:3x"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("42"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("1:"), None);
        assert_eq!(parse_duration("1:-30"), None);
        assert_eq!(parse_duration("--1:30"), None);
        assert_eq!(parse_duration("10:12 AM"), None);
    }

    #[test]
    fn test_parse_keeps_values_literal() {
        // 繰り上げもクランプもしない
        assert_eq!(parse_duration("0:75"), Some(RelativeDuration::new(0, 0, 75)));
    }

    #[test]
    fn test_add_durations_carries() {
        let sum = add_durations(
            RelativeDuration::new(0, 59, 45),
            RelativeDuration::new(0, 0, 20),
        );
        assert_eq!(sum, RelativeDuration::new(1, 0, 5));
    }

    #[test]
    fn test_add_durations_unwraps_remaining_time() {
        let remaining = parse_duration("-12:30").unwrap();
        let total = parse_duration("1:00:00").unwrap();
        assert_eq!(
            add_durations(remaining, total),
            RelativeDuration::new(0, 47, 30)
        );
    }

    #[test]
    fn test_add_durations_negative_result() {
        let sum = add_durations(
            RelativeDuration::negative(0, 5, 0),
            RelativeDuration::new(0, 1, 30),
        );
        assert_eq!(sum, RelativeDuration::negative(0, 3, 30));
    }

    #[test]
    fn test_offset_from_reference() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let later = RelativeDuration::new(0, 12, 5).offset_from(start).unwrap();
        assert_eq!(later, Utc.with_ymd_and_hms(2024, 1, 1, 10, 12, 5).unwrap());

        let earlier = RelativeDuration::negative(0, 3, 0)
            .offset_from(start)
            .unwrap();
        assert_eq!(earlier, Utc.with_ymd_and_hms(2024, 1, 1, 9, 57, 0).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(RelativeDuration::new(1, 2, 3).to_string(), "1:02:03");
        assert_eq!(RelativeDuration::negative(0, 0, 45).to_string(), "-0:00:45");
    }
}
