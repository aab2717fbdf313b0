use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sheet_sense::api::{self, ApiState};
use sheet_sense::llm::HttpModelClient;
use sheet_sense::settings;
use sheet_sense::translate::Translator;

#[derive(Parser)]
#[command(name = "sheet-sense", about = "SheetSense command server", version)]
struct Args {
    /// Config directory override
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Address to bind (overrides settings)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings and SHEETSENSE_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheet_sense=info")),
        )
        .init();

    let args = Args::parse();
    let app_config_dir = args
        .config_dir
        .unwrap_or_else(sheet_sense::paths::default_config_dir);
    let mut loaded = settings::resolve_settings(&app_config_dir);
    if let Some(host) = args.host {
        loaded.server.host = host;
    }
    if let Some(port) = args.port {
        loaded.server.port = port;
    }

    let timeout = Duration::from_secs(loaded.request_timeout_secs);
    let model = match HttpModelClient::new(&loaded.llm, timeout) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("{e}");
            process::exit(1);
        }
    };
    tracing::info!(
        provider = ?loaded.llm.provider,
        model = loaded.llm.model_or_default(),
        "model provider ready"
    );

    let audit_dir = loaded.audit_log.then(|| app_config_dir.clone());
    let state = Arc::new(ApiState::new(
        Translator::new(Arc::new(model)),
        audit_dir,
        loaded.server.max_audio_bytes,
    ));

    let listener = match api::bind(&loaded.server.host, loaded.server.port).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("{e}");
            process::exit(2);
        }
    };
    if let Err(e) = api::serve(state, listener).await {
        tracing::error!("API server error: {e}");
        process::exit(1);
    }
}
