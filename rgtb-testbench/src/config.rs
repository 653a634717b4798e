// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Run configuration.
//!
//! Every option can be set from four sources. Later sources override earlier
//! ones:
//!
//!  1. built-in defaults,
//!  2. a TOML file named by `conf_file`,
//!  3. environment variables prefixed with `RGTB_` (e.g. `RGTB_SEED=3`),
//!  4. the command line (e.g. `--seed 3`).

use std::ffi::OsString;
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rgtb_engine::types::SimError;
use rgtb_models::clock_reset::DEFAULT_CLK_PERIOD_PS;
use rgtb_models::fpga_core::Fault;
use rgtb_models::golden::DEFAULT_MATRIX_RANGE;
use rgtb_models::rgmii::Speed;
use rgtb_protocols::ethernet::MacAddr;
use rgtb_track::builder::{TrackerConfig, TrackersConfig};
use rgtb_track::str_to_level;
use rgtb_track::tracker::TrackConfigError;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "RGTB_";

/// Clock cycles to wait for each frame from the device.
pub const DEFAULT_TIMEOUT_CYCLES: u64 = 100_000;

#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<TrackConfigError> for ConfigError {
    fn from(e: TrackConfigError) -> Self {
        Self(e.0)
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        SimError(e.0)
    }
}

/// Command-line arguments.
#[derive(Parser, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[command(
    name = "rgtb",
    about = "Check the correlation offload device over RGMII"
)]
pub struct Config {
    /// Seed used to generate the kernel and matrix
    #[arg(long)]
    pub seed: Option<u64>,

    /// Line rate of the PHYs in Mb/s (10, 100 or 1000)
    #[arg(long)]
    pub speed_mbps: Option<u32>,

    /// Smallest matrix cell value
    #[arg(long)]
    pub matrix_min: Option<u8>,

    /// Largest matrix cell value
    #[arg(long)]
    pub matrix_max: Option<u8>,

    /// Clock cycles to wait for each frame from the device
    #[arg(long)]
    pub timeout_cycles: Option<u64>,

    /// Period of the device clock in picoseconds
    #[arg(long)]
    pub clk_period_ps: Option<u64>,

    /// File to write the packet capture to. Empty for no capture
    #[arg(long)]
    pub capture_file: Option<String>,

    /// MAC address of the simulated host
    #[arg(long)]
    pub host_mac: Option<String>,

    /// IPv4 address of the simulated host
    #[arg(long)]
    pub host_ip: Option<String>,

    /// UDP port of the simulated host
    #[arg(long)]
    pub host_port: Option<u16>,

    /// MAC address of the device
    #[arg(long)]
    pub dut_mac: Option<String>,

    /// IPv4 address of the device
    #[arg(long)]
    pub dut_ip: Option<String>,

    /// UDP port of the device
    #[arg(long)]
    pub dut_port: Option<u16>,

    /// Fault to inject into the behavioural device (none, silent,
    /// corrupt-result, corrupt-second-result, bad-arp-request, swapped-ports,
    /// bad-fcs or truncated-result)
    #[arg(long)]
    pub fault: Option<String>,

    /// Level of log messages to emit (error, warn, info, debug or trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Only entities matching this regular expression log at `log_level`.
    /// Others only log errors
    #[arg(long)]
    pub log_filter_regex: Option<String>,

    /// File to write log messages to. Empty for none
    #[arg(long)]
    pub log_file: Option<String>,

    /// Write log messages to stdout
    #[arg(long)]
    pub stdout: Option<bool>,

    /// TOML file with further options
    #[arg(long)]
    pub conf_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let device = Endpoint::device();
        let host = Endpoint::host();
        Self {
            seed: Some(0),
            speed_mbps: Some(Speed::Mbps1000.mbps()),
            matrix_min: Some(*DEFAULT_MATRIX_RANGE.start()),
            matrix_max: Some(*DEFAULT_MATRIX_RANGE.end()),
            timeout_cycles: Some(DEFAULT_TIMEOUT_CYCLES),
            clk_period_ps: Some(DEFAULT_CLK_PERIOD_PS),
            capture_file: Some("rgtb.pcap".to_string()),
            host_mac: Some(host.mac.to_string()),
            host_ip: Some(host.ip.to_string()),
            host_port: Some(host.port),
            dut_mac: Some(device.mac.to_string()),
            dut_ip: Some(device.ip.to_string()),
            dut_port: Some(device.port),
            fault: Some("none".to_string()),
            log_level: Some("warn".to_string()),
            log_filter_regex: Some(String::new()),
            log_file: Some(String::new()),
            stdout: Some(true),
            conf_file: Some(String::new()),
        }
    }
}

fn required<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T, ConfigError> {
    value
        .as_ref()
        .ok_or_else(|| ConfigError(format!("no value for {name}")))
}

fn parse_field<T>(value: &Option<String>, name: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let value = required(value, name)?;
    value
        .parse()
        .map_err(|e| ConfigError(format!("bad {name} '{value}': {e}")))
}

impl Config {
    /// Parse the command line of this process and merge in the other
    /// sources. Exits the process on `--help` or a command-line error.
    pub fn parse_all_sources() -> Result<Self, ConfigError> {
        Self::merge_sources(Self::parse())
    }

    /// As [`parse_all_sources`](Self::parse_all_sources) but with the given
    /// arguments. The first argument is the program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args).map_err(|e| ConfigError(e.to_string()))?;
        Self::merge_sources(cli)
    }

    fn merge_sources(cli: Self) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        // The configuration file can itself be named on the command line or
        // in the environment
        let conf_file = match &cli.conf_file {
            Some(conf_file) => conf_file.clone(),
            None => Figment::new()
                .merge(Env::prefixed(ENV_PREFIX))
                .extract_inner::<String>("conf_file")
                .unwrap_or_default(),
        };
        if !conf_file.is_empty() {
            figment = Self::conf_file_merge(figment, Path::new(&conf_file))?;
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        let config: Self = figment.extract()?;
        Ok(config.clap_merge(cli))
    }

    fn conf_file_merge(figment: Figment, conf_file: &Path) -> Result<Figment, ConfigError> {
        if conf_file.is_dir() {
            return Err(ConfigError(format!(
                "{} is not a file path",
                conf_file.display()
            )));
        }
        if !conf_file.exists() {
            return Err(ConfigError(format!("{} not found", conf_file.display())));
        }
        Ok(figment.merge(Toml::file(conf_file)))
    }

    fn clap_merge(mut self, cli: Self) -> Self {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(
                    if cli.$field.is_some() {
                        self.$field = cli.$field;
                    }
                )*
            };
        }
        merge!(
            seed,
            speed_mbps,
            matrix_min,
            matrix_max,
            timeout_cycles,
            clk_period_ps,
            capture_file,
            host_mac,
            host_ip,
            host_port,
            dut_mac,
            dut_ip,
            dut_port,
            fault,
            log_level,
            log_filter_regex,
            log_file,
            stdout,
            conf_file
        );
        self
    }

    /// The settings used to build and run the testbench.
    pub fn testbench_config(&self) -> Result<TestbenchConfig, ConfigError> {
        let matrix_min = *required(&self.matrix_min, "matrix_min")?;
        let matrix_max = *required(&self.matrix_max, "matrix_max")?;
        if matrix_min > matrix_max {
            return Err(ConfigError(format!(
                "empty matrix range {matrix_min}..={matrix_max}"
            )));
        }
        let clk_period_ps = *required(&self.clk_period_ps, "clk_period_ps")?;
        if clk_period_ps == 0 || clk_period_ps % 4 != 0 {
            return Err(ConfigError(format!(
                "clock period {clk_period_ps}ps is not a non-zero multiple of 4ps"
            )));
        }
        let speed = Speed::from_mbps(*required(&self.speed_mbps, "speed_mbps")?)
            .map_err(|e| ConfigError(e.0))?;
        let capture_file = required(&self.capture_file, "capture_file")?;
        let timeout_cycles = *required(&self.timeout_cycles, "timeout_cycles")?;
        if timeout_cycles == 0 || timeout_cycles.checked_mul(clk_period_ps).is_none() {
            return Err(ConfigError(format!(
                "timeout of {timeout_cycles} cycles of {clk_period_ps}ps is out of range"
            )));
        }

        Ok(TestbenchConfig {
            seed: *required(&self.seed, "seed")?,
            speed,
            matrix_range: matrix_min..=matrix_max,
            timeout_cycles,
            clk_period_ps,
            capture_file: (!capture_file.is_empty()).then(|| PathBuf::from(capture_file)),
            host: Endpoint {
                mac: parse_field(&self.host_mac, "host_mac")?,
                ip: parse_field(&self.host_ip, "host_ip")?,
                port: *required(&self.host_port, "host_port")?,
            },
            device: Endpoint {
                mac: parse_field(&self.dut_mac, "dut_mac")?,
                ip: parse_field(&self.dut_ip, "dut_ip")?,
                port: *required(&self.dut_port, "dut_port")?,
            },
        })
    }

    pub fn fault(&self) -> Result<Fault, ConfigError> {
        parse_field(&self.fault, "fault")
    }

    /// Where log messages go.
    pub fn trackers_config(&self) -> Result<TrackersConfig<'_>, ConfigError> {
        let level = str_to_level(required(&self.log_level, "log_level")?)?;
        let filter_regex = required(&self.log_filter_regex, "log_filter_regex")?.as_str();
        let log_file = required(&self.log_file, "log_file")?.as_str();
        Ok(TrackersConfig {
            stdout: TrackerConfig {
                enable: *required(&self.stdout, "stdout")?,
                level,
                filter_regex,
                file: None,
            },
            log_file: TrackerConfig {
                enable: !log_file.is_empty(),
                level,
                filter_regex,
                file: Some(log_file),
            },
        })
    }
}

/// The link, network and transport addresses of one end of the test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    #[must_use]
    pub fn host() -> Self {
        Self {
            mac: MacAddr::new(0x5a, 0x51, 0x52, 0x53, 0x54, 0x55),
            ip: Ipv4Addr::new(192, 168, 1, 100),
            port: 5678,
        }
    }

    #[must_use]
    pub fn device() -> Self {
        Self {
            mac: MacAddr::new(0x02, 0x00, 0x00, 0x00, 0x00, 0x00),
            ip: Ipv4Addr::new(192, 168, 1, 128),
            port: 1234,
        }
    }
}

/// Validated settings for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestbenchConfig {
    pub seed: u64,
    pub speed: Speed,
    pub matrix_range: RangeInclusive<u8>,
    pub timeout_cycles: u64,
    pub clk_period_ps: u64,
    pub capture_file: Option<PathBuf>,
    pub host: Endpoint,
    pub device: Endpoint,
}

impl Default for TestbenchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            speed: Speed::Mbps1000,
            matrix_range: DEFAULT_MATRIX_RANGE,
            timeout_cycles: DEFAULT_TIMEOUT_CYCLES,
            clk_period_ps: DEFAULT_CLK_PERIOD_PS,
            capture_file: None,
            host: Endpoint::host(),
            device: Endpoint::device(),
        }
    }
}

impl TestbenchConfig {
    /// How long to wait for each frame from the device.
    #[must_use]
    pub fn timeout_ps(&self) -> u64 {
        self.timeout_cycles.saturating_mul(self.clk_period_ps)
    }
}
