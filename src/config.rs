use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_QUEUE_PER_SIGNER: usize = 10;

/// Process-wide settings for a [`crate::GasPriceIncrementor`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GasIncrementorConfig {
    /// How often storage is polled for transactions to watch.
    #[serde(with = "serde_millis")]
    pub pull_interval: Duration,
    /// Senders with this many queued transactions are refused by `can_queue`.
    pub max_queue_per_signer: usize,
    /// Upper bound for a single chain client call. `None` waits indefinitely.
    #[serde(with = "serde_millis::option")]
    pub call_timeout: Option<Duration>,
}

impl Default for GasIncrementorConfig {
    fn default() -> Self {
        Self {
            pull_interval: DEFAULT_PULL_INTERVAL,
            max_queue_per_signer: DEFAULT_MAX_QUEUE_PER_SIGNER,
            call_timeout: None,
        }
    }
}

/// Durations as whole milliseconds.
pub(crate) mod serde_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_some(&(d.as_millis() as u64)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
        }
    }
}
