//! MQTT broker publish channel.
//!
//! Holds one long-lived session with the broker. A background thread drives
//! the connection event loop and tracks session state; `send` publishes the
//! zone's value to `<topic_prefix>/<zone>` with QoS 1. When the session
//! reports disconnected, the send waits one bounded grace period for the
//! event loop's reconnect before giving up on this cycle.

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::v5::Packet, mqttbytes::QoS, Client, Connection, Event, MqttOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::BrokerSettings;

const EVENT_CHANNEL_CAPACITY: usize = 10;
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

pub struct BrokerChannel {
    client: Client,
    topic_prefix: String,
    reconnect_grace: Duration,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
}

impl BrokerChannel {
    pub fn open(settings: &BrokerSettings) -> Result<Self> {
        let (host, port) = split_host_port(&settings.addr)?;
        let mut options = MqttOptions::new(&settings.client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_start(true);

        let (client, connection) = Client::new(options, EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let stopping = Arc::new(AtomicBool::new(false));
        let event_thread = spawn_event_loop(connection, connected.clone(), stopping.clone());

        log::info!("broker session opening to {}", settings.addr);
        Ok(Self {
            client,
            topic_prefix: settings.topic_prefix.clone(),
            reconnect_grace: Duration::from_millis(settings.reconnect_grace_ms),
            connected,
            stopping,
            event_thread: Some(event_thread),
        })
    }

    fn session_up(&self) -> bool {
        if self.connected.load(Ordering::SeqCst) {
            return true;
        }
        // One bounded wait for the event loop's reconnect, then give up on
        // this cycle. The value is retried only when it changes again.
        log::warn!(
            "broker session down, waiting {:?} for reconnect",
            self.reconnect_grace
        );
        std::thread::sleep(self.reconnect_grace);
        self.connected.load(Ordering::SeqCst)
    }
}

impl super::NotifyChannel for BrokerChannel {
    fn name(&self) -> &'static str {
        "broker"
    }

    fn commit(&self) -> super::Commit {
        super::Commit::OnAttempt
    }

    fn send(&mut self, zone: usize, value: &str) -> Result<()> {
        if !self.session_up() {
            return Err(anyhow!("broker session down after reconnect grace"));
        }
        let topic = format!("{}/{}", self.topic_prefix, zone);
        self.client
            .publish(&topic, QoS::AtLeastOnce, false, value.as_bytes().to_vec())
            .with_context(|| format!("publish to {} failed", topic))?;
        log::debug!("published '{}' to {}", value, topic);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.disconnect() {
            log::debug!("broker disconnect: {}", e);
        }
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }
        log::info!("broker session closed");
    }
}

fn spawn_event_loop(
    mut connection: Connection,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected.store(true, Ordering::SeqCst);
                    log::info!("broker session established");
                }
                Ok(Event::Incoming(Packet::Disconnect(_))) => {
                    connected.store(false, Ordering::SeqCst);
                    log::warn!("broker sent disconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    connected.store(false, Ordering::SeqCst);
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    log::warn!("broker connection error: {}", e);
                    // The iterator retries the connection on the next poll.
                    std::thread::sleep(RECONNECT_BACKOFF);
                }
            }
            if stopping.load(Ordering::SeqCst) {
                break;
            }
        }
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid broker address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing broker port in {}", addr))?;
        let port: u16 = port.parse().context("invalid broker port")?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing broker port in {}", addr))?;
    let port: u16 = port.parse().context("invalid broker port")?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            split_host_port("192.168.1.20:1883").expect("addr"),
            ("192.168.1.20".to_string(), 1883)
        );
        assert_eq!(
            split_host_port("[::1]:1883").expect("addr"),
            ("::1".to_string(), 1883)
        );
    }

    #[test]
    fn rejects_missing_port() {
        assert!(split_host_port("broker.local").is_err());
        assert!(split_host_port("[::1]").is_err());
    }
}
