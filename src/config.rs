use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_ZONES_PATH: &str = "zones.txt";
const DEFAULT_CLASSES_PATH: &str = "classes.txt";
const DEFAULT_INTERVAL_SECS: f64 = 2.0;
const DEFAULT_SAMPLE_EVERY: u32 = 3;
const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:1883";
const DEFAULT_BROKER_CLIENT_ID: &str = "zonewatchd";
const DEFAULT_BROKER_TOPIC_PREFIX: &str = "zonewatch/zone";
const DEFAULT_RECONNECT_GRACE_MS: u64 = 1_000;
const DEFAULT_WIRELESS_LISTEN_ADDR: &str = "0.0.0.0:9461";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_CLOUD_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize, Default)]
struct ZonewatchConfigFile {
    zones_path: Option<String>,
    classes_path: Option<String>,
    debounce_interval_secs: Option<f64>,
    sample_every: Option<u32>,
    authored_frame: Option<FrameSizeFile>,
    processing_frame: Option<FrameSizeFile>,
    transport: Option<String>,
    broker: Option<BrokerConfigFile>,
    wireless: Option<WirelessConfigFile>,
    socket: Option<SocketConfigFile>,
    cloud_database: Option<CloudDbConfigFile>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
struct FrameSizeFile {
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize, Default)]
struct BrokerConfigFile {
    addr: Option<String>,
    client_id: Option<String>,
    topic_prefix: Option<String>,
    reconnect_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct WirelessConfigFile {
    listen_addr: Option<String>,
    write_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SocketConfigFile {
    peers: Option<Vec<String>>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CloudDbConfigFile {
    database_url: Option<String>,
    credential_path: Option<PathBuf>,
    timeout_ms: Option<u64>,
}

/// Active transport selected at startup. Unrecognized values are rejected
/// with a descriptive error, never silently defaulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportSelector {
    Broker,
    Wireless,
    Socket,
    CloudDatabase,
    #[default]
    None,
}

impl FromStr for TransportSelector {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "broker" => Ok(Self::Broker),
            "wireless" => Ok(Self::Wireless),
            "socket" => Ok(Self::Socket),
            "cloud-database" => Ok(Self::CloudDatabase),
            "none" => Ok(Self::None),
            other => Err(anyhow!(
                "unrecognized transport '{}' (expected broker, wireless, socket, \
                 cloud-database or none)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ZonewatchConfig {
    pub zones_path: PathBuf,
    pub classes_path: PathBuf,
    /// Debounce window in seconds.
    pub debounce_interval_secs: f64,
    /// Process every Nth frame.
    pub sample_every: u32,
    /// Frame size the zone polygons were authored at, when it differs from
    /// the processing size.
    pub authored_frame: Option<(u32, u32)>,
    pub processing_frame: Option<(u32, u32)>,
    pub transport: TransportSelector,
    pub broker: BrokerSettings,
    pub wireless: WirelessSettings,
    pub socket: SocketSettings,
    pub cloud_database: CloudDbSettings,
}

#[derive(Clone, Debug)]
pub struct BrokerSettings {
    pub addr: String,
    pub client_id: String,
    pub topic_prefix: String,
    pub reconnect_grace_ms: u64,
}

#[derive(Clone, Debug)]
pub struct WirelessSettings {
    pub listen_addr: String,
    pub write_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SocketSettings {
    pub peers: Vec<String>,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct CloudDbSettings {
    pub database_url: String,
    pub credential_path: PathBuf,
    pub timeout_ms: u64,
}

impl ZonewatchConfig {
    /// Load from `ZONEWATCH_CONFIG` (when set), apply `ZONEWATCH_*` env
    /// overrides, then validate. All errors here are fatal startup errors.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ZONEWATCH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ZonewatchConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ZonewatchConfigFile) -> Result<Self> {
        let transport = match file.transport.as_deref() {
            Some(value) => value.parse()?,
            None => TransportSelector::None,
        };
        let broker = BrokerSettings {
            addr: file
                .broker
                .as_ref()
                .and_then(|b| b.addr.clone())
                .unwrap_or_else(|| DEFAULT_BROKER_ADDR.to_string()),
            client_id: file
                .broker
                .as_ref()
                .and_then(|b| b.client_id.clone())
                .unwrap_or_else(|| DEFAULT_BROKER_CLIENT_ID.to_string()),
            topic_prefix: file
                .broker
                .as_ref()
                .and_then(|b| b.topic_prefix.clone())
                .unwrap_or_else(|| DEFAULT_BROKER_TOPIC_PREFIX.to_string()),
            reconnect_grace_ms: file
                .broker
                .as_ref()
                .and_then(|b| b.reconnect_grace_ms)
                .unwrap_or(DEFAULT_RECONNECT_GRACE_MS),
        };
        let wireless = WirelessSettings {
            listen_addr: file
                .wireless
                .as_ref()
                .and_then(|w| w.listen_addr.clone())
                .unwrap_or_else(|| DEFAULT_WIRELESS_LISTEN_ADDR.to_string()),
            write_timeout_ms: file
                .wireless
                .as_ref()
                .and_then(|w| w.write_timeout_ms)
                .unwrap_or(DEFAULT_WRITE_TIMEOUT_MS),
        };
        let socket = SocketSettings {
            peers: file
                .socket
                .as_ref()
                .and_then(|s| s.peers.clone())
                .unwrap_or_default(),
            connect_timeout_ms: file
                .socket
                .as_ref()
                .and_then(|s| s.connect_timeout_ms)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            write_timeout_ms: file
                .socket
                .as_ref()
                .and_then(|s| s.write_timeout_ms)
                .unwrap_or(DEFAULT_WRITE_TIMEOUT_MS),
        };
        let cloud_database = CloudDbSettings {
            database_url: file
                .cloud_database
                .as_ref()
                .and_then(|c| c.database_url.clone())
                .unwrap_or_default(),
            credential_path: file
                .cloud_database
                .as_ref()
                .and_then(|c| c.credential_path.clone())
                .unwrap_or_default(),
            timeout_ms: file
                .cloud_database
                .as_ref()
                .and_then(|c| c.timeout_ms)
                .unwrap_or(DEFAULT_CLOUD_TIMEOUT_MS),
        };
        Ok(Self {
            zones_path: PathBuf::from(
                file.zones_path
                    .unwrap_or_else(|| DEFAULT_ZONES_PATH.to_string()),
            ),
            classes_path: PathBuf::from(
                file.classes_path
                    .unwrap_or_else(|| DEFAULT_CLASSES_PATH.to_string()),
            ),
            debounce_interval_secs: file
                .debounce_interval_secs
                .unwrap_or(DEFAULT_INTERVAL_SECS),
            sample_every: file.sample_every.unwrap_or(DEFAULT_SAMPLE_EVERY),
            authored_frame: file.authored_frame.map(|f| (f.width, f.height)),
            processing_frame: file.processing_frame.map(|f| (f.width, f.height)),
            transport,
            broker,
            wireless,
            socket,
            cloud_database,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ZONEWATCH_ZONES") {
            if !path.trim().is_empty() {
                self.zones_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("ZONEWATCH_CLASSES") {
            if !path.trim().is_empty() {
                self.classes_path = PathBuf::from(path);
            }
        }
        if let Ok(transport) = std::env::var("ZONEWATCH_TRANSPORT") {
            if !transport.trim().is_empty() {
                self.transport = transport.trim().parse()?;
            }
        }
        if let Ok(interval) = std::env::var("ZONEWATCH_INTERVAL_SECS") {
            let secs: f64 = interval
                .parse()
                .map_err(|_| anyhow!("ZONEWATCH_INTERVAL_SECS must be a number of seconds"))?;
            self.debounce_interval_secs = secs;
        }
        if let Ok(addr) = std::env::var("ZONEWATCH_BROKER_ADDR") {
            if !addr.trim().is_empty() {
                self.broker.addr = addr;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.debounce_interval_secs.is_finite() || self.debounce_interval_secs <= 0.0 {
            return Err(anyhow!("debounce interval must be greater than zero"));
        }
        if self.sample_every == 0 {
            return Err(anyhow!("sample_every must be at least 1"));
        }
        for (w, h) in [self.authored_frame, self.processing_frame].into_iter().flatten() {
            if w == 0 || h == 0 {
                return Err(anyhow!("frame dimensions must be non-zero"));
            }
        }
        if self.transport == TransportSelector::CloudDatabase {
            if self.cloud_database.database_url.trim().is_empty() {
                return Err(anyhow!("cloud-database transport needs a database_url"));
            }
            if self.cloud_database.credential_path.as_os_str().is_empty() {
                return Err(anyhow!("cloud-database transport needs a credential_path"));
            }
        }
        if self.transport == TransportSelector::Socket && self.socket.peers.is_empty() {
            return Err(anyhow!("socket transport needs at least one peer address"));
        }
        Ok(())
    }

    /// Zone polygons rescaled when authoring and processing sizes differ.
    pub fn frame_scaling(&self) -> Option<((u32, u32), (u32, u32))> {
        match (self.authored_frame, self.processing_frame) {
            (Some(authored), Some(processing)) if authored != processing => {
                Some((authored, processing))
            }
            _ => None,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ZonewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
