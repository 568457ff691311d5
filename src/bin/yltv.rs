use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::Parser;
use yltv::{
    api::time_source::HttpTimeSource,
    config::{ConfigManager, EngineConfig},
    models::{SessionWindow, Settings, TimeFormat},
    overlay::{RenderContext, SeekTooltip, StartTimeLabel},
    time::{parse_duration, SystemClock, TimeStyle},
    utils::{self, LogLevel},
};

/// YouTubeの配信・アーカイブの相対時刻を壁時計の時刻に変換する
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 設定ファイルのパス（省略時はXDG設定ディレクトリ）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ログレベル（RUST_LOGが優先）
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,

    /// JSONで出力
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// 動画ページから開始・終了時刻を取得する
    Window {
        /// 動画ページのURL
        url: String,

        /// 表示形式（12h / 24h）
        #[arg(long, default_value = "12h")]
        format: TimeFormat,
    },
    /// 相対時刻を絶対時刻に変換する
    Convert {
        /// 開始時刻（RFC 3339）
        #[arg(long, value_parser = parse_rfc3339)]
        start: DateTime<Utc>,

        /// 終了時刻（RFC 3339、配信中なら省略）
        #[arg(long, value_parser = parse_rfc3339)]
        end: Option<DateTime<Utc>>,

        /// 表示形式（12h / 24h）
        #[arg(long, default_value = "12h")]
        format: TimeFormat,

        /// 変換規則
        #[arg(long, value_enum, default_value_t = ConvertMode::Chat)]
        mode: ConvertMode,

        /// 相対時刻（例: 1:02:03, -12:30）
        #[arg(required = true, allow_hyphen_values = true)]
        relative: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ConvertMode {
    /// 開始時刻からの経過（チャット）
    Chat,
    /// 終了済みなら開始時刻、配信中なら現在時刻からの差（シークバー）
    Seek,
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time '{}': {}", value, e))
}

#[tokio::main]
async fn main() {
    if let Err(err) = start().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

async fn start() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.log_level, cli.json)?;

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let config = config_manager.load_config()?;

    match &cli.command {
        Commands::Window { url, format } => {
            show_window(&config, url, *format, cli.json).await?;
        }
        Commands::Convert {
            start,
            end,
            format,
            mode,
            relative,
        } => {
            let window = SessionWindow::new(Some(*start), *end);
            let ctx = render_context(&config, window, *format);
            for text in relative {
                let converted = convert(&ctx, text, *mode);
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({ "relative": text, "absolute": converted })
                    );
                } else {
                    println!("{}\t{}", text, converted.as_deref().unwrap_or("-"));
                }
            }
        }
    }

    Ok(())
}

fn render_context(config: &EngineConfig, window: SessionWindow, format: TimeFormat) -> RenderContext {
    RenderContext::new(
        window,
        &Settings::new(format),
        config.display.utc_offset_minutes,
        Arc::new(SystemClock),
    )
}

fn convert(ctx: &RenderContext, text: &str, mode: ConvertMode) -> Option<String> {
    match mode {
        ConvertMode::Chat => {
            let start = ctx.window.start_time?;
            let time = parse_duration(text)?.offset_from(start)?;
            Some(ctx.formatter.format(time, TimeStyle::Short))
        }
        ConvertMode::Seek => SeekTooltip::tooltip_text(text, ctx),
    }
}

async fn show_window(
    config: &EngineConfig,
    url: &str,
    format: TimeFormat,
    json: bool,
) -> anyhow::Result<()> {
    let source = HttpTimeSource::new(&config.fetch);
    let window = source
        .fetch_session_window(url)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&window)?);
        return Ok(());
    }

    let ctx = render_context(config, window, format);
    match window.start_time {
        Some(start) => {
            println!("start: {}", start.to_rfc3339());
            match window.end_time {
                Some(end) => println!("end:   {}", end.to_rfc3339()),
                None => println!("end:   (ongoing)"),
            }
            if let Some(label) = StartTimeLabel::label_text(&ctx) {
                println!("{}", label);
            }
        }
        None => println!("no start time found"),
    }

    Ok(())
}
