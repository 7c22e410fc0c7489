//! Direct per-zone socket channel.
//!
//! Each zone has one fixed peer address (typically the signal controller for
//! that approach). Every send opens a short-lived connection, writes the new
//! value, and closes. Failures carry the target address and are reported
//! unsuccessful with no retry within the cycle; the dispatcher keeps the
//! last-sent record unchanged so the same value is retried next cycle.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::SocketSettings;

#[derive(Debug)]
pub struct DirectSocketChannel {
    peers: Vec<SocketAddr>,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl DirectSocketChannel {
    /// Validates the per-zone address list up front: exactly one peer per
    /// configured zone.
    pub fn open(settings: &SocketSettings, zone_count: usize) -> Result<Self> {
        if settings.peers.len() != zone_count {
            return Err(anyhow!(
                "socket transport needs one peer address per zone: {} zone(s), {} peer(s)",
                zone_count,
                settings.peers.len()
            ));
        }
        let mut peers = Vec::with_capacity(settings.peers.len());
        for raw in &settings.peers {
            let addr: SocketAddr = raw
                .parse()
                .map_err(|_| anyhow!("invalid socket peer address '{}'", raw))?;
            peers.push(addr);
        }
        Ok(Self {
            peers,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
        })
    }
}

impl super::NotifyChannel for DirectSocketChannel {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn commit(&self) -> super::Commit {
        super::Commit::OnSuccess
    }

    fn send(&mut self, zone: usize, value: &str) -> Result<()> {
        let addr = self
            .peers
            .get(zone)
            .ok_or_else(|| anyhow!("no socket peer for zone {}", zone))?;

        let mut stream = TcpStream::connect_timeout(addr, self.connect_timeout)
            .with_context(|| format!("connect to {} failed", addr))?;
        stream
            .set_write_timeout(Some(self.write_timeout))
            .with_context(|| format!("configure stream to {} failed", addr))?;
        stream
            .write_all(value.as_bytes())
            .with_context(|| format!("write to {} failed", addr))?;
        let _ = stream.shutdown(std::net::Shutdown::Both);
        log::debug!("sent '{}' for zone {} to {}", value, zone, addr);
        Ok(())
    }
}
