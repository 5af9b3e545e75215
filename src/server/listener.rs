//! MJPEG hub server
//!
//! Binds the HTTP listener and runs one supervisor per channel alongside it.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::error::Result;
use crate::registry::ChannelRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::source::{FfmpegSource, Supervisor};

/// MJPEG hub server
pub struct HubServer {
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    supervisors: Vec<Arc<Supervisor<FfmpegSource>>>,
}

impl HubServer {
    /// Create a server for the given channels
    ///
    /// Nothing is started until [`HubServer::run`] is called.
    pub fn new(config: ServerConfig, channels: Vec<Channel>) -> Result<Self> {
        let registry = Arc::new(ChannelRegistry::new(channels)?);

        let supervisors = registry
            .iter()
            .map(|entry| {
                let source = FfmpegSource::new(
                    entry.channel(),
                    config.ffmpeg_path.clone(),
                    &config.boundary,
                );
                Arc::new(Supervisor::new(
                    source,
                    Arc::clone(entry.hub()),
                    config.supervisor_config(),
                ))
            })
            .collect();

        Ok(Self {
            config,
            registry,
            supervisors,
        })
    }

    /// Get a reference to the channel registry
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Build the HTTP router
    pub fn router(&self) -> Result<Router> {
        Ok(routes::router(
            Arc::clone(&self.registry),
            &self.config.boundary,
        )?)
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    ///
    /// Supervisors are aborted on the way out, which kills their ffmpeg
    /// processes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let app = self.router()?;
        let listener = TcpListener::bind(self.bind_addr()).await?;
        tracing::info!(
            addr = %self.bind_addr(),
            channels = self.registry.len(),
            "MJPEG hub listening"
        );

        let handles = self.spawn_supervisors();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .into_future() => result.map_err(Into::into),
        };

        for handle in handles {
            handle.abort();
        }

        result
    }

    /// Start every channel's supervisor
    pub fn spawn_supervisors(&self) -> Vec<JoinHandle<()>> {
        self.supervisors
            .iter()
            .map(|supervisor| {
                tracing::info!(channel = %supervisor.channel(), "Setting up stream");
                Arc::clone(supervisor).spawn()
            })
            .collect()
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
