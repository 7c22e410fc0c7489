//! Cloud realtime-database channel.
//!
//! Legacy integration: the whole zone vector is written as one combined
//! record under `/zones/z0-z{n-1}`, values joined with `&`, so the remote
//! consumer always sees a consistent pair-wise snapshot. Initialization
//! (credential file + endpoint probe) is allowed to fail without taking the
//! process down; the channel then runs disarmed and every send is a logged
//! no-op.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::CloudDbSettings;

#[derive(Debug, Deserialize)]
struct CredentialFile {
    database_secret: String,
}

pub struct CloudDbChannel {
    armed: Option<ArmedCloudDb>,
    batch_key: String,
}

struct ArmedCloudDb {
    agent: ureq::Agent,
    base_url: Url,
    secret: String,
}

impl CloudDbChannel {
    /// Initialization failure is non-fatal: the channel opens disarmed and
    /// the pipeline proceeds with no transport for its cycles.
    pub fn open(settings: &CloudDbSettings, zone_count: usize) -> Self {
        let batch_key = format!("z0-z{}", zone_count.saturating_sub(1));
        match arm(settings) {
            Ok(armed) => {
                log::info!("cloud database initialized at {}", armed.base_url);
                Self {
                    armed: Some(armed),
                    batch_key,
                }
            }
            Err(e) => {
                log::error!(
                    "cloud database initialization failed: {:#} - notifications disabled",
                    e
                );
                Self {
                    armed: None,
                    batch_key,
                }
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn batch_key(&self) -> &str {
        &self.batch_key
    }
}

fn arm(settings: &CloudDbSettings) -> Result<ArmedCloudDb> {
    let base_url = Url::parse(&settings.database_url)
        .with_context(|| format!("invalid database url '{}'", settings.database_url))?;

    let raw = std::fs::read_to_string(&settings.credential_path).with_context(|| {
        format!(
            "failed to read credential file {}",
            settings.credential_path.display()
        )
    })?;
    let credentials: CredentialFile = serde_json::from_str(&raw).with_context(|| {
        format!(
            "invalid credential file {}",
            settings.credential_path.display()
        )
    })?;

    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_millis(settings.timeout_ms))
        .build();

    // Endpoint probe: a shallow read of the database root.
    let probe = probe_url(&base_url)?;
    agent
        .get(probe.as_str())
        .query("shallow", "true")
        .query("auth", &credentials.database_secret)
        .call()
        .context("database endpoint probe failed")?;

    Ok(ArmedCloudDb {
        agent,
        base_url,
        secret: credentials.database_secret,
    })
}

fn probe_url(base: &Url) -> Result<Url> {
    base.join(".json").context("failed to build probe url")
}

fn batch_url(base: &Url, batch_key: &str) -> Result<Url> {
    base.join(&format!("zones/{}.json", batch_key))
        .context("failed to build batch url")
}

/// The combined record value: zone values joined with `&`.
pub(crate) fn join_batch(values: &[String]) -> String {
    values.join("&")
}

impl super::NotifyChannel for CloudDbChannel {
    fn name(&self) -> &'static str {
        "cloud-database"
    }

    fn delivery(&self) -> super::Delivery {
        super::Delivery::Batch
    }

    fn commit(&self) -> super::Commit {
        super::Commit::OnAttempt
    }

    fn send(&mut self, _zone: usize, _value: &str) -> Result<()> {
        Err(anyhow!("cloud-database only accepts batch delivery"))
    }

    fn send_batch(&mut self, values: &[String]) -> Result<()> {
        let Some(armed) = &self.armed else {
            log::debug!("cloud database disarmed, dropping batch");
            return Ok(());
        };
        let record = join_batch(values);
        let url = batch_url(&armed.base_url, &self.batch_key)?;
        armed
            .agent
            .put(url.as_str())
            .query("auth", &armed.secret)
            .send_string(&serde_json::to_string(&record)?)
            .with_context(|| format!("write of '{}' to {} failed", record, self.batch_key))?;
        log::debug!("cloud database updated {} = '{}'", self.batch_key, record);
        Ok(())
    }
}
