//! 動画ページを再取得してセッションウィンドウを解決する

use async_trait::async_trait;

use super::youtube::{extract_end_date, extract_start_date};
use crate::config::FetchConfig;
use crate::models::SessionWindow;
use crate::traits::WindowSource;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),
}

/// HTTP経由で動画ページを取得するタイムソース
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    http_client: reqwest::Client,
    user_agent: String,
}

impl HttpTimeSource {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// 動画ページを取得し、メタデータから開始・終了時刻を抽出する
    ///
    /// 現在表示中のドキュメントはSPAルーターで書き換わっている可能性があるため、
    /// 常にURLから取得し直す。
    pub async fn fetch_session_window(&self, page_url: &str) -> Result<SessionWindow, FetchError> {
        tracing::debug!("🌐 [TIME_SOURCE] Fetching page: {}", page_url);

        let response = self
            .http_client
            .get(page_url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let html = response.text().await?;
        tracing::debug!("📄 [TIME_SOURCE] HTML response length: {} chars", html.len());

        Ok(SessionWindow::new(
            extract_start_date(&html),
            extract_end_date(&html),
        ))
    }
}

#[async_trait]
impl WindowSource for HttpTimeSource {
    async fn resolve(&self, page_url: &str) -> SessionWindow {
        match self.fetch_session_window(page_url).await {
            Ok(window) => {
                tracing::info!(
                    start = ?window.start_time,
                    end = ?window.end_time,
                    "🕒 [TIME_SOURCE] Session window resolved"
                );
                window
            }
            Err(e) => {
                tracing::warn!("⚠️ [TIME_SOURCE] Failed to resolve session window: {}", e);
                SessionWindow::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let error = FetchError::Status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(format!("{}", error), "Unexpected HTTP status: 404 Not Found");
    }

    #[tokio::test]
    async fn test_resolve_fails_soft() {
        let source = HttpTimeSource::new(&FetchConfig::default());
        // 接続できないアドレスでも空のウィンドウを返す
        let window = source.resolve("http://127.0.0.1:9/watch?v=none").await;
        assert_eq!(window, SessionWindow::empty());
    }
}
