use crate::domain::{LocationIngestionService, LocationSubscriberConfig};
use crate::mqtt::{LocationSubscriber, RumqttcTransport};
use common::domain::LocationRepository;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct IngestWorker {
    subscriber: LocationSubscriber<RumqttcTransport>,
}

impl IngestWorker {
    pub fn new(
        location_repository: Arc<dyn LocationRepository>,
        config: LocationSubscriberConfig,
    ) -> anyhow::Result<Self> {
        debug!("initializing ingest worker");

        let ingestion_service = Arc::new(LocationIngestionService::new(location_repository));
        let transport = RumqttcTransport::new(&config)?;
        let subscriber = LocationSubscriber::new(transport, ingestion_service, config);

        Ok(Self { subscriber })
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
            let mut subscriber = self.subscriber;
            move |ctx| Box::pin(async move { subscriber.run(ctx).await })
        })
    }
}
