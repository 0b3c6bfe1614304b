//! Illustrative card operations used to exercise the metrics pipeline.
//!
//! Nothing here touches a real card: each call sleeps for a while and,
//! for deletes, fails at a configured rate.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::CardConfig;
use crate::metrics::{Instrumented, SampleRecorder};

#[derive(Debug, Error)]
pub enum CardError {
    #[error("failed to delete card {0}")]
    DeleteFailed(String),
}

pub struct CardService {
    recorder: SampleRecorder,
    rng: Mutex<StdRng>,
    delete_failure_rate: f64,
    simulate_latency: bool,
}

impl CardService {
    pub fn new(recorder: SampleRecorder, config: &CardConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            recorder,
            rng: Mutex::new(rng),
            delete_failure_rate: config.delete_failure_rate.clamp(0.0, 1.0),
            simulate_latency: config.simulate_latency,
        }
    }

    /// Measured as `CardService` / `Create`.
    pub async fn create(&self, card_number: &str, card_type: &str) -> Result<String, CardError> {
        Instrumented::new("CardService", "Create")
            .run(&self.recorder, async {
                info!(card_number, card_type, "creating card");
                self.simulate(50..=150).await;
                Ok(format!("Card created: {card_number}"))
            })
            .await
    }

    /// Measured as `VISA_CARD` / `Update`.
    pub async fn update(&self, card_number: &str, data: &str) -> Result<String, CardError> {
        Instrumented::new("VISA_CARD", "Update")
            .run(&self.recorder, async {
                info!(card_number, data, "updating card");
                self.simulate(100..=300).await;
                Ok(format!("Card updated: {card_number}"))
            })
            .await
    }

    /// Measured as `MASTER_CARD` / `Delete`; failures land in `Delete_ERROR`.
    pub async fn delete(&self, card_number: &str) -> Result<(), CardError> {
        Instrumented::new("MASTER_CARD", "Delete")
            .record_on_error(true)
            .run(&self.recorder, async {
                info!(card_number, "deleting card");
                self.simulate(75..=125).await;
                if self.roll(self.delete_failure_rate) {
                    return Err(CardError::DeleteFailed(card_number.to_owned()));
                }
                info!(card_number, "card deleted");
                Ok(())
            })
            .await
    }

    /// Measured as `CardService` / `Validate`. Valid four times out of five.
    pub async fn validate(&self, card_number: &str) -> Result<bool, CardError> {
        Instrumented::new("CardService", "Validate")
            .run(&self.recorder, async {
                self.simulate(25..=100).await;
                let valid = !self.roll(0.2);
                info!(card_number, valid, "card validated");
                Ok(valid)
            })
            .await
    }

    fn roll(&self, probability: f64) -> bool {
        self.rng.lock().gen_bool(probability)
    }

    async fn simulate(&self, range_ms: RangeInclusive<u64>) {
        if !self.simulate_latency {
            return;
        }
        let ms = self.rng.lock().gen_range(range_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AggregateStore, MemoryStore, MeterRegistry, MetricKey};
    use std::sync::Arc;

    fn cards(failure_rate: f64) -> (CardService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let recorder = SampleRecorder::new(store.clone(), Arc::new(MeterRegistry::new()));
        let config = CardConfig {
            delete_failure_rate: failure_rate,
            simulate_latency: false,
            seed: Some(7),
        };
        (CardService::new(recorder, &config), store)
    }

    #[tokio::test]
    async fn failed_delete_is_recorded_under_error_variant() {
        let (svc, store) = cards(1.0);

        let err = svc.delete("CARD-001").await.unwrap_err();
        assert_eq!(err.to_string(), "failed to delete card CARD-001");

        let failed = store.get(&MetricKey::new("MASTER_CARD", "Delete_ERROR")).await.unwrap();
        assert_eq!(failed.unwrap().count, 1);
        assert!(store.get(&MetricKey::new("MASTER_CARD", "Delete")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_operations_use_their_own_entities() {
        let (svc, store) = cards(0.0);

        svc.create("CARD-001", "TEST").await.unwrap();
        svc.update("CARD-001", "new data").await.unwrap();
        svc.validate("CARD-001").await.unwrap();
        svc.delete("CARD-001").await.unwrap();

        let keys: Vec<String> = store.list_all().await.unwrap().into_keys().collect();
        assert_eq!(
            keys,
            [
                "metrics:CardService:Create",
                "metrics:CardService:Validate",
                "metrics:MASTER_CARD:Delete",
                "metrics:VISA_CARD:Update",
            ]
        );
    }
}
