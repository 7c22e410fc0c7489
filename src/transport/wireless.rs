//! Short-range wireless notify hub.
//!
//! Display peers on the short-range link connect to the hub's listener and
//! receive every zone-state change as a newline-terminated `zone:value`
//! record. Delivery is best-effort per peer: a peer that fails to take a
//! write is dropped from the connected set without aborting delivery to the
//! others, and may simply reconnect.

use anyhow::{Context, Result};
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::config::WirelessSettings;

struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
}

pub struct WirelessHubChannel {
    listener: TcpListener,
    peers: Vec<Peer>,
    write_timeout: Duration,
}

impl WirelessHubChannel {
    pub fn open(settings: &WirelessSettings) -> Result<Self> {
        let listener = TcpListener::bind(&settings.listen_addr)
            .with_context(|| format!("failed to bind wireless hub on {}", settings.listen_addr))?;
        listener
            .set_nonblocking(true)
            .context("failed to set wireless hub listener nonblocking")?;
        log::info!(
            "wireless hub listening on {}",
            listener.local_addr().map_or_else(
                |_| settings.listen_addr.clone(),
                |addr| addr.to_string()
            )
        );
        Ok(Self {
            listener,
            peers: Vec::new(),
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
        })
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Accept any peers that connected since the last cycle.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_write_timeout(Some(self.write_timeout)) {
                        log::warn!("peer {} rejected: {}", addr, e);
                        continue;
                    }
                    log::info!("wireless peer {} connected", addr);
                    self.peers.push(Peer { stream, addr });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("wireless hub accept failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl super::NotifyChannel for WirelessHubChannel {
    fn name(&self) -> &'static str {
        "wireless"
    }

    fn commit(&self) -> super::Commit {
        super::Commit::OnAttempt
    }

    fn send(&mut self, zone: usize, value: &str) -> Result<()> {
        self.accept_pending();
        let record = format!("{}:{}\n", zone, value);

        // Failed peers are dropped, the rest still get the record.
        self.peers.retain_mut(|peer| {
            match peer.stream.write_all(record.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("wireless peer {} dropped: {}", peer.addr, e);
                    false
                }
            }
        });

        log::debug!(
            "notified {} wireless peer(s) of zone {} -> '{}'",
            self.peers.len(),
            zone,
            value
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        for peer in self.peers.drain(..) {
            let _ = peer.stream.shutdown(std::net::Shutdown::Both);
        }
        log::info!("wireless hub closed");
    }
}
