//! Harness configuration (`todomvc-harness.toml`).
//!
//! ```toml
//! [timing]
//! poll_interval = 20          # ms between predicate checks
//! timeout = 5000              # ms, omit to poll forever
//! fixture_delay = 10          # ms, fixture latency once the list is shown
//! initial_fixture_delay = 100 # ms, fixture latency for the first load
//! case_timeout = 10000        # ms, omit to let a case run forever
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::poll::WaitOptions;

pub const CONFIG_FILE_NAME: &str = "todomvc-harness.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Delay between predicate checks (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Give up waiting after this long (ms). Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Fixture response delay after the first list is shown (ms)
    #[serde(default = "default_fixture_delay")]
    pub fixture_delay: u64,

    /// Fixture response delay while the app loads its first list (ms)
    #[serde(default = "default_initial_fixture_delay")]
    pub initial_fixture_delay: u64,

    /// Fail a case that runs longer than this (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_timeout: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: None,
            fixture_delay: default_fixture_delay(),
            initial_fixture_delay: default_initial_fixture_delay(),
            case_timeout: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    20
}

fn default_fixture_delay() -> u64 {
    10
}

fn default_initial_fixture_delay() -> u64 {
    100
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }

    pub fn fixture_delay(&self) -> Duration {
        Duration::from_millis(self.fixture_delay)
    }

    pub fn initial_fixture_delay(&self) -> Duration {
        Duration::from_millis(self.initial_fixture_delay)
    }

    pub fn case_timeout(&self) -> Option<Duration> {
        self.case_timeout.map(Duration::from_millis)
    }

    /// Options for `wait_for_with` matching these timings.
    pub fn wait_options(&self) -> WaitOptions {
        let options = WaitOptions::default().with_interval(self.poll_interval());
        match self.timeout() {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Default,
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        if config.timing.poll_interval == 0 {
            anyhow::bail!("timing.poll_interval must be greater than zero");
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Load `path` if given, otherwise the nearest `todomvc-harness.toml`
    /// from `start` upward, otherwise the defaults.
    pub fn load(path: Option<&Path>, start: &Path) -> Result<(Self, ConfigSource)> {
        if let Some(path) = path {
            return Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())));
        }
        match find_config_file(start) {
            Some(found) => Ok((Self::from_file(&found)?, ConfigSource::File(found))),
            None => Ok((Self::default(), ConfigSource::Default)),
        }
    }
}

fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
