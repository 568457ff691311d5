//! チャットフレームのスクリプト

use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::dom::HostDocument;
use crate::engine::{Engine, EngineDeps, EngineRole, PassTicket, Trigger};
use crate::messaging::{
    ContextId, FrameId, MessagingError, Port, Relay, RelayWindowSource, Request, Response, TabId,
};
use crate::time::Clock;

/// 埋め込みチャットフレームで動くスクリプト
///
/// 開始時刻は自分で取得せず、リレー経由でトップレベルに問い合わせる。
#[derive(Debug)]
pub struct FrameScript {
    port: Port,
    engine: Engine,
    startup: Option<PassTicket>,
}

impl FrameScript {
    pub async fn start(
        relay: &Arc<Relay>,
        tab: TabId,
        frame: FrameId,
        url: &str,
        config: EngineConfig,
        document: Arc<dyn HostDocument>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MessagingError> {
        let port = relay.connect(ContextId::Frame(tab, frame));
        let settings = port.client().request_settings().await?;
        info!("💬 [FRAME] Script started on {} {}", tab, frame);

        let window_source = Arc::new(RelayWindowSource::new(port.client(), &config.messaging));
        let deps = EngineDeps::new(document, window_source).with_clock(clock);
        let engine = Engine::spawn(EngineRole::ChatFrame, config, deps, settings);
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

    pub fn take_startup(&mut self) -> Option<PassTicket> {
        self.startup.take()
    }

    /// フレームは要求に応答しない
    fn answer(_: &Engine, _: Request) -> Option<Response> {
        None
    }

    pub async fn run(self) {
        super::serve(self.port, self.engine, Self::answer).await;
    }
}
