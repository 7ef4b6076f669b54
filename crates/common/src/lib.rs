pub mod domain;
pub mod nats;
pub mod telemetry;

pub use nats::{NatsClient, NatsConsumer};

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBatchCache;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMetadataRequestProducer;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockProcessedEventProducer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamConsumer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockKeyValueStore;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockPullConsumer;
