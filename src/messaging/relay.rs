//! 特権リレー
//!
//! タブ・フレームごとの接続を管理し、通知の配送と
//! フレームからトップレベルへの開始時刻要求の中継を行う。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::MessagingConfig;
use crate::dom::{poll_until, PollSpec};
use crate::models::{SessionWindow, Settings};
use crate::traits::{SettingsStore, WindowSource};

use super::{ContextId, Inbound, MessagingError, Notification, Request, Response, TabId};

struct Route {
    connection: u64,
    sender: mpsc::UnboundedSender<Inbound>,
}

/// 中継役
pub struct Relay {
    store: Arc<dyn SettingsStore>,
    routes: Mutex<HashMap<ContextId, Route>>,
    next_connection: AtomicU64,
    forward_timeout: Duration,
}

impl Relay {
    pub fn new(store: Arc<dyn SettingsStore>, config: &MessagingConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            routes: Mutex::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
            forward_timeout: config.forward_timeout(),
        })
    }

    /// スクリプトを接続する
    ///
    /// 同じコンテキストが再接続した場合（ページの再読み込みなど）は新しい接続が優先される。
    pub fn connect(self: &Arc<Self>, id: ContextId) -> Port {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .routes
            .lock()
            .insert(id, Route { connection, sender })
            .is_some();
        info!(
            "🔗 [RELAY] {} connected{}",
            id,
            if replaced { " (replaced)" } else { "" }
        );

        Port {
            client: RelayClient {
                relay: self.clone(),
                id,
            },
            connection,
            receiver,
        }
    }

    fn disconnect(&self, id: ContextId, connection: u64) {
        let mut routes = self.routes.lock();
        if routes
            .get(&id)
            .is_some_and(|route| route.connection == connection)
        {
            routes.remove(&id);
            debug!("🔌 [RELAY] {} disconnected", id);
        }
    }

    pub fn is_connected(&self, id: ContextId) -> bool {
        self.routes.lock().contains_key(&id)
    }

    fn deliver(&self, targets: impl Fn(&ContextId) -> bool, notification: &Notification) -> usize {
        let routes = self.routes.lock();
        routes
            .iter()
            .filter(|(id, _)| targets(*id))
            .filter(|(_, route)| {
                route
                    .sender
                    .send(Inbound::Notification(notification.clone()))
                    .is_ok()
            })
            .count()
    }

    /// タブのURL変更をそのタブの全スクリプトへ通知する
    pub fn url_changed(&self, tab: TabId, url: &str) -> usize {
        let notification = Notification::UrlChanged {
            url: url.to_string(),
        };
        let delivered = self.deliver(|id| id.tab() == tab, &notification);
        debug!("🧭 [RELAY] url-changed for {} delivered to {}", tab, delivered);
        delivered
    }

    /// 設定を保存し、全タブの全スクリプトへ通知する
    pub async fn settings_changed(&self, settings: Settings) -> usize {
        self.store.save(settings).await;
        let notification = Notification::SettingsChanged { settings };
        let delivered = self.deliver(|_| true, &notification);
        info!(
            "⚙️ [RELAY] settings-changed ({}) delivered to {}",
            settings.time_format.as_str(),
            delivered
        );
        delivered
    }

    /// スクリプトからの要求を処理する
    pub async fn handle_request(
        &self,
        from: ContextId,
        request: Request,
    ) -> Result<Response, MessagingError> {
        match (request, from) {
            (Request::ContentScriptReady, _) => Ok(Response::Settings {
                settings: self.store.load().await,
            }),
            (Request::StartTimeRequest, ContextId::Frame(tab, _)) => {
                self.forward_to_page(tab, request).await
            }
            (Request::StartTimeRequest, ContextId::Page(_)) => {
                Err(MessagingError::Unsupported { request, from })
            }
        }
    }

    async fn forward_to_page(&self, tab: TabId, request: Request) -> Result<Response, MessagingError> {
        let page = ContextId::Page(tab);
        let (reply, response) = oneshot::channel();
        {
            let routes = self.routes.lock();
            let route = routes.get(&page).ok_or(MessagingError::NoRoute(page))?;
            route
                .sender
                .send(Inbound::Request { request, reply })
                .map_err(|_| MessagingError::Disconnected)?;
        }

        match tokio::time::timeout(self.forward_timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(MessagingError::Disconnected),
            Err(_) => {
                warn!("⏱️ [RELAY] {} did not answer {:?}", page, request);
                Err(MessagingError::Timeout)
            }
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut contexts: Vec<String> = self
            .routes
            .lock()
            .keys()
            .map(|id| id.to_string())
            .collect();
        contexts.sort();
        f.debug_struct("Relay")
            .field("contexts", &contexts)
            .field("forward_timeout", &self.forward_timeout)
            .finish()
    }
}

/// リレーへ要求を送る側のハンドル
#[derive(Clone)]
pub struct RelayClient {
    relay: Arc<Relay>,
    id: ContextId,
}

impl RelayClient {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub async fn request(&self, request: Request) -> Result<Response, MessagingError> {
        self.relay.handle_request(self.id, request).await
    }

    /// 起動時の設定取得
    pub async fn request_settings(&self) -> Result<Settings, MessagingError> {
        match self.request(Request::ContentScriptReady).await? {
            Response::Settings { settings } => Ok(settings),
            other => Err(MessagingError::UnexpectedResponse(other)),
        }
    }

    /// トップレベルが解決済みの開始時刻（未解決なら`None`）
    pub async fn request_start_time(&self) -> Result<Option<DateTime<Utc>>, MessagingError> {
        match self.request(Request::StartTimeRequest).await? {
            Response::StartTimeResponse { start_time } => Ok(start_time),
            other => Err(MessagingError::UnexpectedResponse(other)),
        }
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient").field("id", &self.id).finish()
    }
}

/// スクリプト側の接続
///
/// dropするとリレーから切断される。
pub struct Port {
    client: RelayClient,
    connection: u64,
    receiver: mpsc::UnboundedReceiver<Inbound>,
}

impl Port {
    pub fn id(&self) -> ContextId {
        self.client.id
    }

    pub fn client(&self) -> RelayClient {
        self.client.clone()
    }

    /// 次の受信メッセージ。リレーから切り離されると`None`
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.receiver.recv().await
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        self.client.relay.disconnect(self.client.id, self.connection);
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.client.id)
            .field("connection", &self.connection)
            .finish()
    }
}

/// フレーム用のウィンドウ取得元
///
/// トップレベルがまだ開始時刻を解決していない場合があるため、
/// 一定間隔で問い合わせを繰り返し、期限を過ぎたら空のウィンドウを返す。
#[derive(Debug, Clone)]
pub struct RelayWindowSource {
    client: RelayClient,
    spec: PollSpec,
}

impl RelayWindowSource {
    pub fn new(client: RelayClient, config: &MessagingConfig) -> Self {
        Self {
            client,
            spec: PollSpec::new(config.start_time_poll(), config.start_time_wait()),
        }
    }
}

#[async_trait]
impl WindowSource for RelayWindowSource {
    async fn resolve(&self, _page_url: &str) -> SessionWindow {
        let client = &self.client;
        let start_time = poll_until(self.spec, || async move {
            match client.request_start_time().await {
                Ok(start_time) => start_time,
                Err(e) => {
                    debug!("⏳ [RELAY] Start time not available yet: {}", e);
                    None
                }
            }
        })
        .await;

        if start_time.is_none() {
            info!(
                "⏱️ [RELAY] Start time not received within {:?}",
                self.spec.timeout
            );
        }
        SessionWindow::new(start_time, None)
    }
}
