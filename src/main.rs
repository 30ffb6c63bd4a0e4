//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; the interactive flow drives `ExporterApi`.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tg_export::adapters::persistence::ChatListJson;
use tg_export::adapters::telegram::{session, GrammersAuthAdapter, GrammersTgGateway};
use tg_export::adapters::ui::tui::TuiInputPort;
use tg_export::domain::DomainError;
use tg_export::ports::{AuthPort, ChatListPort, ExporterApi, TgGateway};
use tg_export::shared::config::AppConfig;
use tg_export::usecases::{AuthSession, ChatDirectoryService, ExportService, ExporterApp};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    tg_export::adapters::ui::init_ui();

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        AppConfig::default()
    });
    let (api_id, api_hash) = cfg.credentials().map_err(|msg| anyhow::anyhow!(msg))?;

    let exports_dir = cfg.exports_dir_or_default();
    tokio::fs::create_dir_all(&exports_dir)
        .await
        .map_err(|e| anyhow::anyhow!("create exports dir {}: {}", exports_dir.display(), e))?;
    let exports_abs = exports_dir
        .canonicalize()
        .unwrap_or_else(|_| exports_dir.clone());
    info!(path = %exports_abs.display(), "exports directory");

    // --- Telegram client (cloned for auth and gateway; same session) ---
    let session_path = cfg.session_path_or_default();
    let client = session::connect(&session_path, api_id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let auth: Arc<dyn AuthPort> = Arc::new(GrammersAuthAdapter::new(
        client.clone(),
        api_id,
        api_hash,
    ));
    let tg: Arc<dyn TgGateway> = Arc::new(GrammersTgGateway::new(client, cfg.export_delay_ms));
    if let Some(ms) = cfg.export_delay_ms {
        info!(export_delay_ms = ms, "history requests throttled");
    }
    let store: Arc<dyn ChatListPort> = Arc::new(ChatListJson::in_dir(&exports_dir));

    // --- Services ---
    let session = AuthSession::with_max_attempts(auth, cfg.qr_max_attempts_or_default());
    let directory = ChatDirectoryService::new(Arc::clone(&tg), store);
    let exporter = ExportService::new(Arc::clone(&tg), exports_dir.clone()).with_progress(true);
    let app: Arc<dyn ExporterApi> = Arc::new(
        ExporterApp::new(session, directory, exporter)
            .with_poll_timeout(Duration::from_secs(cfg.qr_timeout_secs_or_default())),
    );

    let tui = TuiInputPort::new(app, exports_abs, cfg.limit_per_chat_or_default());

    // --- Run until done or Ctrl-C; files already written are kept ---
    tokio::select! {
        res = tui.run() => match res {
            Ok(()) => Ok(()),
            Err(DomainError::Cancelled) => {
                info!("cancelled");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping export; files already written are kept");
            Ok(())
        }
    }
}
