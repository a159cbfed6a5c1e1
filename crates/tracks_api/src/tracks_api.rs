use crate::http::{run_tracks_http_server, HttpServerConfig};
use common::domain::LocationRepository;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TracksApi {
    location_repository: Arc<dyn LocationRepository>,
    config: HttpServerConfig,
}

impl TracksApi {
    pub fn new(location_repository: Arc<dyn LocationRepository>, config: HttpServerConfig) -> Self {
        debug!("initializing tracks API module");
        Self {
            location_repository,
            config,
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new({
            let repository = self.location_repository;
            let config = self.config;
            move |ctx| Box::pin(run_tracks_http_server(config, repository, ctx))
        })
    }
}
