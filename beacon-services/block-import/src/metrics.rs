// std
use std::time::Duration;
// crates
use beacon_da_verifier::{DataAvailability, NotAvailableReason};
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
// internal

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelValue)]
enum AvailabilityOutcome {
    Available,
    Missing,
    ProofError,
}

impl From<&DataAvailability> for AvailabilityOutcome {
    fn from(availability: &DataAvailability) -> Self {
        match availability {
            DataAvailability::Available => AvailabilityOutcome::Available,
            DataAvailability::NotAvailable(NotAvailableReason::Missing) => {
                AvailabilityOutcome::Missing
            }
            DataAvailability::NotAvailable(NotAvailableReason::ProofError(_)) => {
                AvailabilityOutcome::ProofError
            }
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct AvailabilityLabels {
    outcome: AvailabilityOutcome,
}

/// Counters for one pipeline, registered under the `block_import` prefix.
/// Cloning shares the underlying metrics.
#[derive(Clone, Debug)]
pub struct BlockImportMetrics {
    imported_blocks: Counter,
    data_availability: Family<AvailabilityLabels, Counter>,
    transition_seconds: Histogram,
}

impl BlockImportMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let sub_registry = registry.sub_registry_with_prefix("block_import");

        let imported_blocks = Counter::default();
        sub_registry.register(
            "blocks",
            "Blocks that passed the state transition",
            imported_blocks.clone(),
        );

        let data_availability = Family::default();
        sub_registry.register(
            "data_availability",
            "Data availability outcomes of blob carrying blocks",
            data_availability.clone(),
        );

        let transition_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 12));
        sub_registry.register(
            "transition_seconds",
            "Time spent in the state transition of a single block",
            transition_seconds.clone(),
        );

        Self {
            imported_blocks,
            data_availability,
            transition_seconds,
        }
    }

    pub(crate) fn record_transition(&self, elapsed: Duration) {
        self.transition_seconds.observe(elapsed.as_secs_f64());
    }

    pub(crate) fn record_availability(&self, availability: &DataAvailability) {
        self.data_availability
            .get_or_create(&AvailabilityLabels {
                outcome: availability.into(),
            })
            .inc();
    }

    pub(crate) fn record_imported(&self) {
        self.imported_blocks.inc();
    }

    pub fn imported_blocks(&self) -> u64 {
        self.imported_blocks.get()
    }
}

#[cfg(test)]
mod tests {
    use prometheus_client::encoding::text::encode;

    use super::*;

    #[test]
    fn metrics_are_exported_with_prefix() {
        let mut registry = Registry::default();
        let metrics = BlockImportMetrics::register(&mut registry);
        metrics.record_imported();
        metrics.record_availability(&DataAvailability::Available);
        metrics.record_transition(Duration::from_millis(3));

        let mut exported = String::new();
        encode(&mut exported, &registry).unwrap();
        assert!(exported.contains("block_import_blocks_total 1"));
        assert!(exported.contains("outcome=\"Available\""));
        assert!(exported.contains("block_import_transition_seconds_count 1"));
        assert_eq!(metrics.imported_blocks(), 1);
    }
}
