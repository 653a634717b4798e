// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Tests that touch environment variables run serially.

use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use rgtb_models::fpga_core::Fault;
use rgtb_models::rgmii::Speed;
use rgtb_protocols::ethernet::MacAddr;
use rgtb_testbench::config::{Config, TestbenchConfig};
use serial_test::serial;

/// Sets an environment variable for the lifetime of the guard.
struct EnvVar(&'static str);

impl EnvVar {
    fn set(name: &'static str, value: &str) -> Self {
        // SAFETY: tests touching the environment are marked #[serial]
        unsafe { env::set_var(name, value) };
        Self(name)
    }
}

impl Drop for EnvVar {
    fn drop(&mut self) {
        // SAFETY: as above
        unsafe { env::remove_var(self.0) };
    }
}

fn parse(args: &[&str]) -> Config {
    let mut all = vec!["rgtb"];
    all.extend_from_slice(args);
    Config::from_args(all).unwrap()
}

#[test]
#[serial]
fn defaults() {
    let config = parse(&[]);
    assert_eq!(config, Config::default());
    assert_eq!(
        config.testbench_config().unwrap(),
        TestbenchConfig {
            capture_file: Some(PathBuf::from("rgtb.pcap")),
            ..TestbenchConfig::default()
        }
    );
    assert_eq!(config.fault().unwrap(), Fault::None);

    let trackers = config.trackers_config().unwrap();
    assert!(trackers.stdout.enable);
    assert!(!trackers.log_file.enable);
    assert_eq!(trackers.stdout.level, log::Level::Warn);
}

#[test]
#[serial]
fn command_line() {
    let config = parse(&[
        "--seed",
        "5",
        "--speed-mbps",
        "100",
        "--host-mac",
        "00:11:22:33:44:55",
        "--dut-ip",
        "10.0.0.2",
        "--capture-file",
        "",
        "--fault",
        "silent",
    ]);
    let tb = config.testbench_config().unwrap();
    assert_eq!(tb.seed, 5);
    assert_eq!(tb.speed, Speed::Mbps100);
    assert_eq!(tb.host.mac, MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55));
    assert_eq!(tb.device.ip, Ipv4Addr::new(10, 0, 0, 2));
    assert_eq!(tb.capture_file, None);
    assert_eq!(config.fault().unwrap(), Fault::Silent);
}

#[test]
#[serial]
fn environment_then_command_line() {
    let _seed = EnvVar::set("RGTB_SEED", "9");
    let _timeout = EnvVar::set("RGTB_TIMEOUT_CYCLES", "500");

    let tb = parse(&[]).testbench_config().unwrap();
    assert_eq!(tb.seed, 9);
    assert_eq!(tb.timeout_cycles, 500);

    let tb = parse(&["--seed", "3"]).testbench_config().unwrap();
    assert_eq!(tb.seed, 3);
    assert_eq!(tb.timeout_cycles, 500);
}

#[test]
#[serial]
fn conf_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(
        &path,
        "seed = 11\nspeed_mbps = 10\nmatrix_min = 0\nmatrix_max = 100\n",
    )
    .unwrap();
    let path_str = path.to_str().unwrap();

    let tb = parse(&["--conf-file", path_str])
        .testbench_config()
        .unwrap();
    assert_eq!(tb.seed, 11);
    assert_eq!(tb.speed, Speed::Mbps10);
    assert_eq!(tb.matrix_range, 0..=100);

    // The environment overrides the file and the command line overrides both
    let _seed = EnvVar::set("RGTB_SEED", "12");
    let tb = parse(&["--conf-file", path_str])
        .testbench_config()
        .unwrap();
    assert_eq!(tb.seed, 12);
    let tb = parse(&["--conf-file", path_str, "--matrix-max", "50"])
        .testbench_config()
        .unwrap();
    assert_eq!(tb.matrix_range, 0..=50);
}

#[test]
#[serial]
fn conf_file_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.toml");
    fs::write(&path, "clk_period_ps = 16000\n").unwrap();
    let _conf = EnvVar::set("RGTB_CONF_FILE", path.to_str().unwrap());

    let tb = parse(&[]).testbench_config().unwrap();
    assert_eq!(tb.clk_period_ps, 16000);
    assert_eq!(tb.timeout_ps(), 100_000 * 16000);
}

#[test]
#[serial]
fn missing_conf_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");
    let result = Config::from_args(["rgtb", "--conf-file", path.to_str().unwrap()]);
    assert!(result.unwrap_err().0.ends_with("not found"));
}

#[test]
#[serial]
fn invalid_values() {
    let bad_speed = parse(&["--speed-mbps", "25"]).testbench_config();
    assert!(bad_speed.unwrap_err().0.contains("unsupported line rate 25"));

    let empty_range = parse(&["--matrix-min", "8", "--matrix-max", "7"]).testbench_config();
    assert_eq!(empty_range.unwrap_err().0, "empty matrix range 8..=7");

    let no_timeout = parse(&["--timeout-cycles", "0"]).testbench_config();
    assert!(no_timeout.unwrap_err().0.contains("out of range"));

    let endless_timeout = parse(&["--timeout-cycles", "18446744073709551615"]).testbench_config();
    assert_eq!(
        endless_timeout.unwrap_err().0,
        "timeout of 18446744073709551615 cycles of 8000ps is out of range"
    );

    let bad_period = parse(&["--clk-period-ps", "8001"]).testbench_config();
    assert!(bad_period.is_err());

    let bad_mac = parse(&["--dut-mac", "02:00"]).testbench_config();
    assert!(bad_mac.unwrap_err().0.starts_with("bad dut_mac '02:00'"));

    assert!(parse(&["--fault", "flaky"]).fault().is_err());
    assert!(parse(&["--log-level", "loud"]).trackers_config().is_err());
}

#[test]
#[serial]
fn matrix_range_is_inclusive() {
    let tb = parse(&["--matrix-min", "0", "--matrix-max", "255"])
        .testbench_config()
        .unwrap();
    assert_eq!(tb.matrix_range, 0..=255);

    let tb = parse(&["--matrix-min", "9", "--matrix-max", "9"])
        .testbench_config()
        .unwrap();
    assert_eq!(tb.matrix_range, 9..=9);
}

#[test]
#[serial]
fn bad_argument() {
    assert!(Config::from_args(["rgtb", "--no-such-option"]).is_err());
}
