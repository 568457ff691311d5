pub mod api;
pub mod config;
pub mod content;
pub mod dom;
pub mod engine;
pub mod messaging;
pub mod models;
pub mod overlay;
pub mod time;
pub mod traits;
pub mod utils;
pub mod watcher;

// Re-export the main error types for convenience
pub use api::time_source::FetchError;
pub use dom::SelectorError;
pub use engine::EngineError;
pub use messaging::MessagingError;

// Re-export the engine entry points
pub use config::{ConfigManager, EngineConfig};
pub use content::{FrameScript, PageScript};
pub use engine::{Engine, EngineDeps, EngineRole, PassReport, Trigger};
pub use models::{SessionWindow, Settings, TimeFormat};
