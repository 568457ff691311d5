use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// 動画ページのパス
pub const WATCH_PATH: &str = "/watch";

fn meta_patterns(itemprop: &str) -> [Regex; 2] {
    [
        Regex::new(&format!(
            r#"<meta\s[^>]*?itemprop=['"]{}['"][^>]*?content=['"]([^'"]+)['"]"#,
            itemprop
        ))
        .expect("valid meta regex"),
        Regex::new(&format!(
            r#"<meta\s[^>]*?content=['"]([^'"]+)['"][^>]*?itemprop=['"]{}['"]"#,
            itemprop
        ))
        .expect("valid meta regex"),
    ]
}

fn start_date_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| meta_patterns("startDate"))
}

fn end_date_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| meta_patterns("endDate"))
}

fn extract_meta_date(html: &str, patterns: &[Regex; 2]) -> Option<DateTime<Utc>> {
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(html))
        .and_then(|cap| cap.get(1))
        .and_then(|m| DateTime::parse_from_rfc3339(m.as_str().trim()).ok())
        .map(|date| date.with_timezone(&Utc))
}

/// `<meta itemprop="startDate">`から配信開始時刻を抽出
pub fn extract_start_date(html: &str) -> Option<DateTime<Utc>> {
    extract_meta_date(html, start_date_patterns())
}

/// `<meta itemprop="endDate">`から配信終了時刻を抽出
pub fn extract_end_date(html: &str) -> Option<DateTime<Utc>> {
    extract_meta_date(html, end_date_patterns())
}

/// 動画視聴ページのURLか判定
pub fn is_watch_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| parsed.path() == WATCH_PATH)
        .unwrap_or(false)
}
