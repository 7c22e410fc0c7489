//! Downstream notification transports.
//!
//! Exactly one channel is active per deployment, selected at startup. All
//! channels share one discipline: synchronous sends with bounded timeouts,
//! failures caught here and reported to the dispatcher as an unsuccessful
//! send, never as a fatal error.

mod broker;
mod clouddb;
mod socket;
mod wireless;

pub use broker::BrokerChannel;
pub use clouddb::CloudDbChannel;
pub use socket::DirectSocketChannel;
pub use wireless::WirelessHubChannel;

use anyhow::Result;

use crate::config::{TransportSelector, ZonewatchConfig};

/// How a channel takes delivery of a cycle's changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// One send per changed zone.
    PerZone,
    /// One combined record covering every zone.
    Batch,
}

/// When the dispatcher may advance its last-sent record for a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// Only after a send that reported success (failed sends retry on the
    /// next change cycle).
    OnSuccess,
    /// After any attempt; a failed send is not retried until the value
    /// changes again.
    OnAttempt,
}

/// Capability contract for a notification channel.
///
/// `send`/`send_batch` errors carry the failure detail for logging; the
/// dispatcher converts them into a per-zone success signal and continues.
pub trait NotifyChannel {
    fn name(&self) -> &'static str;

    fn delivery(&self) -> Delivery {
        Delivery::PerZone
    }

    fn commit(&self) -> Commit;

    /// Deliver one zone's new value.
    fn send(&mut self, zone: usize, value: &str) -> Result<()>;

    /// Deliver the full batch of zone values (batch-capable channels only).
    fn send_batch(&mut self, values: &[String]) -> Result<()> {
        let _ = values;
        Err(anyhow::anyhow!(
            "channel '{}' does not accept batch delivery",
            self.name()
        ))
    }

    /// Orderly release of the channel's connection resources.
    fn shutdown(&mut self) {}
}

/// Open the configured channel, or `None` for the `none` selector.
///
/// Configuration errors (missing parameters, bad addresses) are fatal here;
/// connectivity problems are the channel's to absorb later.
pub fn open(config: &ZonewatchConfig, zone_count: usize) -> Result<Option<Box<dyn NotifyChannel>>> {
    let channel: Box<dyn NotifyChannel> = match config.transport {
        TransportSelector::None => return Ok(None),
        TransportSelector::Broker => Box::new(BrokerChannel::open(&config.broker)?),
        TransportSelector::Wireless => Box::new(WirelessHubChannel::open(&config.wireless)?),
        TransportSelector::Socket => {
            Box::new(DirectSocketChannel::open(&config.socket, zone_count)?)
        }
        TransportSelector::CloudDatabase => {
            Box::new(CloudDbChannel::open(&config.cloud_database, zone_count))
        }
    };
    log::info!("transport channel '{}' active", channel.name());
    Ok(Some(channel))
}
