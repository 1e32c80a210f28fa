use crate::{create_router, AppState};
use learnhub_core::{LearnHubError, Result, Settings};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(settings: Settings) -> Result<Self> {
        let addr: SocketAddr = settings.bind_addr.parse().map_err(|err| {
            LearnHubError::Configuration(format!(
                "invalid bind address '{}': {err}",
                settings.bind_addr
            ))
        })?;
        let state = AppState::new(settings)?;
        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let assistant_mode = self.state.assistant.is_some();
        let router = create_router(self.state);

        info!("Starting Learning Hub API server on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Server listening on http://{}", self.addr);
        info!(
            assistant_mode,
            "chat requests use {}",
            if assistant_mode {
                "the assistant pipeline"
            } else {
                "plain chat completions"
            }
        );
        info!("  GET  /health - Health check");
        info!("  POST /api/chat - Chat pipeline (stream=1 for token streaming)");
        info!("  POST /api/title - Conversation title generation");
        info!("  GET/DELETE /api/assistant/vector-files - Vector store file manager");
        info!("  GET  /api/assistant/file-meta?id=<file_id> - File metadata");
        info!("  POST /api/assistant/upload - Upload a note to the corpus");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
