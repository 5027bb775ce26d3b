//! OS network byte counters, read through `sysinfo`.

use sysinfo::Networks;
use tracing::trace;

use crate::error::{NetError, Result};

/// Label used for the aggregate-of-all-interfaces entry in adapter lists.
pub const ALL_ADAPTERS: &str = "All";

/// Concrete counter set a reading came from, resolved once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CounterTarget {
    /// Sum over every interface the OS reports
    All,
    /// One named interface
    Interface(String),
}

/// Cumulative bytes since interface initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterReading {
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

/// Anything that can report cumulative per-interface traffic counters.
pub trait CounterSource: Send {
    /// Names of the interfaces currently known, sorted.
    fn adapters(&mut self) -> Vec<String>;

    /// Read cumulative counters for `target`.
    ///
    /// A named interface that is not present yields
    /// [`NetError::AdapterUnavailable`].
    fn read(&mut self, target: &CounterTarget) -> Result<CounterReading>;
}

/// Counter source backed by `sysinfo::Networks`
pub struct SysinfoCounters {
    networks: Networks,
}

impl SysinfoCounters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SysinfoCounters {
    fn adapters(&mut self) -> Vec<String> {
        // true = drop interfaces that went away since the last refresh
        self.networks.refresh(true);
        let mut names: Vec<String> = self.networks.iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        names
    }

    fn read(&mut self, target: &CounterTarget) -> Result<CounterReading> {
        self.networks.refresh(true);

        let reading = match target {
            CounterTarget::All => {
                let mut total = CounterReading::default();
                for (_name, data) in self.networks.iter() {
                    total.bytes_received = total.bytes_received.saturating_add(data.total_received());
                    total.bytes_sent = total.bytes_sent.saturating_add(data.total_transmitted());
                }
                total
            }
            CounterTarget::Interface(name) => {
                let data = self
                    .networks
                    .get(name)
                    .ok_or_else(|| NetError::AdapterUnavailable(name.clone()))?;
                CounterReading {
                    bytes_received: data.total_received(),
                    bytes_sent: data.total_transmitted(),
                }
            }
        };

        trace!(?target, rx = reading.bytes_received, tx = reading.bytes_sent, "counters read");
        Ok(reading)
    }
}

/// Adapter choices for a picker: "All" first, then interface names sorted.
pub fn list_adapters(source: &mut dyn CounterSource) -> Vec<String> {
    let mut names = source.adapters();
    names.sort();
    names.dedup();
    names.retain(|n| n != ALL_ADAPTERS);
    names.insert(0, ALL_ADAPTERS.to_string());
    names
}
