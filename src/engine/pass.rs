//! 1回分の再初期化パス

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::youtube::is_watch_url;
use crate::config::EngineConfig;
use crate::dom::{wait_for_element, HostDocument, MutationRecord, PollSpec};
use crate::models::{SessionWindow, Settings};
use crate::overlay::{OverlayKind, OverlaySet, RenderContext};
use crate::watcher::{self, ChatWatcher, MutationHandler, WatcherHandle};

use super::{EngineDeps, EngineRole, PassReport, Trigger, WindowBoard};

/// 接続中のウォッチャー（種類ごとに高々1つ）
#[derive(Debug, Default)]
struct ActiveWatchers {
    tooltip: Option<WatcherHandle>,
    live_clock: Option<WatcherHandle>,
    chat: Option<ChatWatcher>,
}

impl ActiveWatchers {
    fn detach_all(&mut self) {
        watcher::detach(&mut self.tooltip);
        watcher::detach(&mut self.live_clock);
        if let Some(mut chat) = self.chat.take() {
            chat.detach();
        }
    }

    fn kinds(&self) -> Vec<OverlayKind> {
        let mut kinds = Vec::new();
        if self.tooltip.is_some() {
            kinds.push(OverlayKind::SeekTooltip);
        }
        if self.live_clock.is_some() {
            kinds.push(OverlayKind::LiveClock);
        }
        if self.chat.is_some() {
            kinds.push(OverlayKind::ChatTimestamp);
        }
        kinds
    }
}

/// シーケンサーのワーカーが所有するパスの状態
pub struct PassRunner {
    role: EngineRole,
    config: EngineConfig,
    deps: EngineDeps,
    overlays: OverlaySet,
    settings: Settings,
    window: SessionWindow,
    page_url: Option<String>,
    watchers: ActiveWatchers,
    sequence: u64,
    board: Arc<WindowBoard>,
}

impl PassRunner {
    pub fn new(
        role: EngineRole,
        config: EngineConfig,
        deps: EngineDeps,
        settings: Settings,
        board: Arc<WindowBoard>,
    ) -> Self {
        let overlays = OverlaySet::from_config(&config);
        Self {
            role,
            config,
            deps,
            overlays,
            settings,
            window: SessionWindow::empty(),
            page_url: None,
            watchers: ActiveWatchers::default(),
            sequence: 0,
            board,
        }
    }

    pub fn role(&self) -> EngineRole {
        self.role
    }

    fn document(&self) -> Arc<dyn HostDocument> {
        self.deps.document.clone()
    }

    fn element_spec(&self) -> PollSpec {
        PollSpec::new(
            self.config.polling.interval(),
            self.config.polling.element_timeout(),
        )
    }

    fn watcher_spec(&self) -> PollSpec {
        PollSpec::new(
            self.config.polling.interval(),
            self.config.polling.watcher_timeout(),
        )
    }

    /// パスを1回実行する
    pub async fn run(&mut self, trigger: Trigger) -> PassReport {
        self.sequence += 1;
        let kind = trigger.kind();
        info!(
            "🔄 [SEQUENCER] Pass #{} started ({}, {})",
            self.sequence, self.role, kind
        );

        let doc = self.document();
        self.watchers.detach_all();
        self.overlays.remove_all(doc.as_ref());

        match trigger {
            Trigger::Navigation { url } => {
                self.board.navigation_started();
                self.window = self.resolve_window(&url).await;
                self.board.publish(self.window);
                self.page_url = Some(url);
            }
            Trigger::SettingsChanged(settings) => {
                self.settings = settings;
            }
        }

        let mut rendered = Vec::new();
        if self.window.has_start() {
            let ctx = Arc::new(RenderContext::new(
                self.window,
                &self.settings,
                self.config.display.utc_offset_minutes,
                self.deps.clock.clone(),
            ));
            match self.role {
                EngineRole::TopLevel => self.attach_top_level(&ctx, &mut rendered).await,
                EngineRole::ChatFrame => self.attach_chat(&ctx, self.watcher_spec()).await,
            }
        } else {
            debug!(
                "⏭️ [SEQUENCER] Pass #{}: no start time, overlays skipped",
                self.sequence
            );
        }

        let report = PassReport {
            sequence: self.sequence,
            trigger: kind,
            page_url: self.page_url.clone(),
            window: self.window,
            settings: self.settings,
            rendered,
            watchers: self.watchers.kinds(),
        };
        info!(
            "✅ [SEQUENCER] Pass #{} finished ({:?}): rendered={:?}, watchers={:?}",
            report.sequence, report.page_url, report.rendered, report.watchers
        );
        report
    }

    async fn resolve_window(&self, url: &str) -> SessionWindow {
        if self.role == EngineRole::TopLevel && !is_watch_url(url) {
            debug!("⏭️ [SEQUENCER] Not a watch page: {}", url);
            return SessionWindow::empty();
        }
        self.deps.window_source.resolve(url).await
    }

    async fn attach_top_level(&mut self, ctx: &Arc<RenderContext>, rendered: &mut Vec<OverlayKind>) {
        let doc = self.document();

        let label = self.overlays.label.clone();
        if let Some(anchor) =
            wait_for_element(doc.as_ref(), label.anchor_selector(), self.element_spec()).await
        {
            if label.render_at(doc.as_ref(), anchor, ctx) {
                rendered.push(OverlayKind::StartLabel);
            }
        }

        let (tooltip, live_clock) = tokio::join!(
            self.attach_tooltip(doc.clone(), ctx.clone()),
            self.attach_live_clock(doc.clone(), ctx.clone())
        );
        self.watchers.tooltip = tooltip;
        if let Some(handle) = live_clock {
            if self.overlays.live_clock.render(doc.as_ref(), ctx) {
                rendered.push(OverlayKind::LiveClock);
            }
            self.watchers.live_clock = Some(handle);
        }

        // 動画ページにチャットが直接埋め込まれている場合のみ
        if doc.query_selector(&self.config.selectors.chat_outer).is_some() {
            self.attach_chat(ctx, self.watcher_spec()).await;
        }
    }

    fn attach_tooltip(
        &self,
        doc: Arc<dyn HostDocument>,
        ctx: Arc<RenderContext>,
    ) -> impl std::future::Future<Output = Option<WatcherHandle>> + Send + 'static {
        let tooltip = self.overlays.tooltip.clone();
        let selector = tooltip.text_selector();
        let spec = self.watcher_spec();

        let render_tooltip = tooltip.clone();
        let handler: MutationHandler =
            Arc::new(move |doc: &dyn HostDocument, records: &[MutationRecord]| {
                let removed_only =
                    !records.is_empty() && records.iter().all(|record| record.added.is_empty());
                if removed_only {
                    render_tooltip.remove(doc);
                } else {
                    render_tooltip.render(doc, &ctx);
                }
            });

        async move {
            let cleanup_doc = doc.clone();
            WatcherHandle::attach("seek-tooltip", doc, &selector, spec, handler)
                .await
                .map(|handle| handle.with_cleanup(move || tooltip.remove(cleanup_doc.as_ref())))
        }
    }

    fn attach_live_clock(
        &self,
        doc: Arc<dyn HostDocument>,
        ctx: Arc<RenderContext>,
    ) -> impl std::future::Future<Output = Option<WatcherHandle>> + Send + 'static {
        let live_clock = self.overlays.live_clock.clone();
        let selector = live_clock.current_selector().to_string();
        let spec = self.watcher_spec();

        let render_clock = live_clock.clone();
        let handler: MutationHandler =
            Arc::new(move |doc: &dyn HostDocument, _: &[MutationRecord]| {
                render_clock.render(doc, &ctx);
            });

        async move {
            let cleanup_doc = doc.clone();
            WatcherHandle::attach("live-clock", doc, &selector, spec, handler)
                .await
                .map(|handle| handle.with_cleanup(move || live_clock.remove(cleanup_doc.as_ref())))
        }
    }

    async fn attach_chat(&mut self, ctx: &Arc<RenderContext>, spec: PollSpec) {
        self.watchers.chat = ChatWatcher::attach(
            self.document(),
            &self.config.selectors.chat_outer,
            self.overlays.chat.clone(),
            ctx.clone(),
            spec,
        )
        .await;
    }

    /// ワーカー停止時の後片付け
    pub fn shutdown(&mut self) {
        self.watchers.detach_all();
        self.overlays.remove_all(self.deps.document.as_ref());
        debug!(
            "🧹 [SEQUENCER] Cleaned up after {} passes (last url: {:?})",
            self.sequence, self.page_url
        );
    }
}
