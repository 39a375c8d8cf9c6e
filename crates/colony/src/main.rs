//! The `colony-server` binary.
//!
//! Usage: `colony-server [config.toml]`. Exits with 42 when a moderator
//! asks for a restart, 43 for an update, and 3 when the server fails; the
//! supervisor decides what to do next.

use std::process::ExitCode;

use colony::prelude::*;
use colony::{CRASH_EXIT_CODE, logging};
use tokio::sync::mpsc;

const DEFAULT_CONFIG_PATH: &str = "colony.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match ServerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            return exit_code(CRASH_EXIT_CODE);
        }
    };
    logging::init(&config.logging.level);

    match run(config).await {
        Ok(request) => {
            tracing::info!(?request, code = request.exit_code(), "server stopped");
            exit_code(request.exit_code())
        }
        Err(e) => {
            tracing::error!(error = %e, "server crashed");
            exit_code(CRASH_EXIT_CODE)
        }
    }
}

async fn run(config: ServerConfig) -> Result<ShutdownRequest, ColonyError> {
    if let Some(dir) = std::path::Path::new(&config.database.path).parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(store_dir_error)?;
        }
    }
    let store = SqliteAccountStore::open(&config.database.path).await?;

    // Presence notices go to a relay task. This deployment just logs them.
    let (presence, mut logins) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(name) = logins.recv().await {
            tracing::info!(target: "colony::presence", %name, "user logged in");
        }
    });

    let server = ColonyServerBuilder::from_config(&config)
        .build(store, presence)
        .await?;
    server.run().await
}

fn store_dir_error(e: std::io::Error) -> ColonyError {
    ColonyError::Session(colony_session::SessionError::Store(e.to_string()))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
