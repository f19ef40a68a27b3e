use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::mpsc;

use rust_hosted_chat::chat::{ChatClient, MessageFeed, PollingFeed};
use rust_hosted_chat::config::{self, AppConfig};
use rust_hosted_chat::gateway::{AuthApi, Gateway, InMemoryGateway, RestGateway};
use rust_hosted_chat::session::SessionStore;
use rust_hosted_chat::storage::{self, SessionCache};
use rust_hosted_chat::ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "rust_hosted_chat",
    version,
    about = "Desktop chat client for a hosted backend"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Run against a seeded in-memory backend instead of the hosted one
    #[arg(long)]
    demo: bool,
}

struct Backend {
    gateway: Arc<dyn Gateway>,
    auth: Arc<dyn AuthApi>,
}

fn hosted_backend(config: &AppConfig) -> Backend {
    let rest = Arc::new(RestGateway::new(&config.gateway_url, &config.anon_key));
    let gateway: Arc<dyn Gateway> = rest.clone();
    let auth: Arc<dyn AuthApi> = rest;
    Backend { gateway, auth }
}

fn demo_backend() -> Backend {
    let memory = Arc::new(InMemoryGateway::demo());
    let gateway: Arc<dyn Gateway> = memory.clone();
    let auth: Arc<dyn AuthApi> = memory;
    Backend { gateway, auth }
}

fn session_cache(config: &AppConfig) -> Option<SessionCache> {
    if let Err(err) = storage::ensure_data_dir(&config.data_dir) {
        log::warn!("Cannot create data dir {}: {err}", config.data_dir);
        return None;
    }
    match SessionCache::in_dir(&config.data_dir) {
        Ok(cache) => Some(cache),
        Err(err) => {
            log::warn!("Session cache unavailable: {err}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::resolve_config(&cli.config);

    let backend = if cli.demo {
        log::info!("Demo mode: sign in as alice@example.com / password");
        demo_backend()
    } else {
        hosted_backend(&app_config)
    };

    let mut session = SessionStore::new(backend.auth.clone(), backend.gateway.clone());
    if app_config.persist_session
        && !cli.demo
        && let Some(cache) = session_cache(&app_config)
    {
        session = session.with_cache(cache);
    }

    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Worker
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Worker -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy Chat Worker (Chạy ngầm)
    let feed: Arc<dyn MessageFeed> = Arc::new(PollingFeed::new(
        backend.gateway.clone(),
        app_config.poll_interval(),
    ));
    let client = ChatClient::new(session, backend.gateway, feed, event_tx, cmd_rx);
    tokio::spawn(client.run());

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "Rust Hosted Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            Ok(Box::new(ChatApp::new(cc, cmd_tx.clone(), event_receiver)))
        }),
    )
}
