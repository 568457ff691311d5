//! トップレベルのページスクリプト

use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineDeps, EngineRole, PassTicket, Trigger};
use crate::messaging::{ContextId, MessagingError, Port, Relay, Request, Response, TabId};

/// 動画ページ本体で動くスクリプト
///
/// 開始時刻ラベル・シークツールチップ・ライブ時計を担当し、
/// チャットフレームからの開始時刻要求に応答する。
#[derive(Debug)]
pub struct PageScript {
    port: Port,
    engine: Engine,
    startup: Option<PassTicket>,
}

impl PageScript {
    /// リレーに接続し、設定を受け取って初回パスを投入する
    pub async fn start(
        relay: &Arc<Relay>,
        tab: TabId,
        url: &str,
        config: EngineConfig,
        deps: EngineDeps,
    ) -> Result<Self, MessagingError> {
        let port = relay.connect(ContextId::Page(tab));
        let settings = port.client().request_settings().await?;
        info!(
            "📄 [PAGE] Script started on {} ({})",
            tab,
            settings.time_format.as_str()
        );

        let engine = Engine::spawn(EngineRole::TopLevel, config, deps, settings);
        let startup = engine.submit(Trigger::navigation(url));

        Ok(Self {
            port,
            engine,
            startup: Some(startup),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// 初回パスの完了待ち（2回目以降は`None`）
    pub fn take_startup(&mut self) -> Option<PassTicket> {
        self.startup.take()
    }

    /// 開始時刻要求には現在のウィンドウから答える
    fn answer(engine: &Engine, request: Request) -> Option<Response> {
        match request {
            Request::StartTimeRequest => Some(Response::StartTimeResponse {
                start_time: engine.current_window().start_time,
            }),
            Request::ContentScriptReady => None,
        }
    }

    /// リレーから切断されるまでメッセージを処理する
    pub async fn run(self) {
        super::serve(self.port, self.engine, Self::answer).await;
    }
}
