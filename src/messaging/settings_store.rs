//! メモリ上の設定ストア

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::Settings;
use crate::traits::SettingsStore;

/// プロセス内で設定を保持するストア
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Settings {
        *self.settings.read()
    }

    async fn save(&self, settings: Settings) {
        *self.settings.write() = settings;
    }
}
