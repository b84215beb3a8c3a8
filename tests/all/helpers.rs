use amq_protocol_types::DeliveryTag;
use carrot_worker::broker::{InMemoryBroker, InMemoryChannel};
use carrot_worker::consumers::{
    BrokerAction, Consumer, ConsumerBuilder, Delivery, DeliveryObserver, DispatchOutcome,
    Pipeline, ProcessingError, Stage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// A shared, ordered record of what happened during a test.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Parses the payload as JSON, leaves it untouched in `adapt` and doubles `n` in `execute`.
///
/// Every stage invocation is recorded in the journal.
pub struct DoublingPipeline {
    pub journal: Journal,
    /// How long `execute` takes.
    pub work: Duration,
}

impl DoublingPipeline {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            work: Duration::ZERO,
        }
    }
}

#[async_trait::async_trait]
impl Pipeline for DoublingPipeline {
    type Extracted = serde_json::Value;
    type Output = serde_json::Value;
    type Error = anyhow::Error;

    async fn extract(&self, payload: &[u8]) -> Result<serde_json::Value, anyhow::Error> {
        self.journal
            .record(format!("extract {}", String::from_utf8_lossy(payload)));
        Ok(serde_json::from_slice(payload)?)
    }

    async fn adapt(
        &self,
        extracted: serde_json::Value,
    ) -> Result<serde_json::Value, anyhow::Error> {
        self.journal.record(format!("adapt {extracted}"));
        Ok(extracted)
    }

    async fn execute(&self, output: serde_json::Value) -> Result<(), anyhow::Error> {
        self.journal.record(format!("execute {output}"));
        let n = output["n"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("`n` is missing"))?;
        tokio::time::sleep(self.work).await;
        self.journal.record(format!("doubled {}", n * 2));
        Ok(())
    }
}

/// What an observer saw about a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub delivery_tag: DeliveryTag,
    pub redelivered: bool,
    pub broker_action: Option<BrokerAction>,
    pub failed_stage: Option<Stage>,
    pub ack_failed: bool,
}

/// Records every outcome it is notified of, and journals each dispatch.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub journal: Journal,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl RecordingObserver {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            seen: Default::default(),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl<E: 'static> DeliveryObserver<E> for RecordingObserver {
    fn on_delivery(&self, delivery: &Delivery) {
        self.journal
            .record(format!("dispatch {}", delivery.delivery_tag));
    }

    fn on_outcome(&self, delivery: &Delivery, outcome: &DispatchOutcome<E>) {
        self.journal
            .record(format!("settled {}", delivery.delivery_tag));
        let failed_stage = outcome
            .result()
            .as_ref()
            .err()
            .and_then(ProcessingError::stage_error)
            .map(|e| e.stage);
        let ack_failed = matches!(outcome.result(), Err(ProcessingError::AckError(_)));
        self.seen.lock().unwrap().push(Seen {
            delivery_tag: outcome.delivery_tag(),
            redelivered: delivery.redelivered,
            broker_action: outcome.broker_action(),
            failed_stage,
            ack_failed,
        });
    }
}

/// A fresh in-memory broker with a declared queue.
pub fn broker_with_queue() -> (InMemoryBroker, String) {
    let broker = InMemoryBroker::new();
    let queue_name = Uuid::new_v4().to_string();
    broker.declare_queue(&queue_name);
    (broker, queue_name)
}

/// Build a consumer on a new channel of `broker`.
pub async fn build<P: Pipeline>(
    builder: ConsumerBuilder<P>,
    broker: &InMemoryBroker,
) -> Consumer<P, InMemoryChannel> {
    builder
        .with_channel(broker.channel())
        .await
        .expect("Failed to subscribe")
}

/// Poll `condition` until it holds, failing the test after a couple of seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
