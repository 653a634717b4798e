// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::fs;
use std::path::PathBuf;

use rgtb_engine::test_helpers::start_test;
use rgtb_models::fpga_core::Fault;
use rgtb_models::rgmii::Speed;
use rgtb_protocols::pcap::read_records;
use rgtb_testbench::config::TestbenchConfig;
use rgtb_testbench::failure::TbFailure;
use rgtb_testbench::packet_log::Direction;
use rgtb_testbench::scenario::{ROUNDS, Report, ScenarioState};
use rgtb_testbench::testbench::Testbench;

fn run_with(config: TestbenchConfig, fault: Fault) -> (Testbench, Result<Report, TbFailure>) {
    let engine = start_test(file!());
    let mut testbench = Testbench::new(engine, config).unwrap();
    testbench.attach_fpga_core(fault).unwrap();
    let result = testbench.run();
    (testbench, result)
}

fn check_pass(config: TestbenchConfig) {
    let speed = config.speed;
    let (testbench, result) = run_with(config, Fault::None);
    let report = result.unwrap();

    assert_eq!(report.speed, speed);
    assert_eq!(report.rounds, ROUNDS);
    assert_eq!(report.frames_sent, 3);
    assert_eq!(report.frames_received, 3);
    assert_eq!(
        report.result,
        testbench.scenario.vectors().expected_result().unwrap()
    );
    assert_eq!(testbench.scenario.state(), ScenarioState::Done);
    assert_eq!(
        testbench.scenario.history(),
        vec![
            ScenarioState::Init,
            ScenarioState::Reset,
            ScenarioState::SendData,
            ScenarioState::AwaitArpRequest,
            ScenarioState::SendArpReply,
            ScenarioState::AwaitResult,
            ScenarioState::Validate,
            ScenarioState::RepeatRoundTrip,
            ScenarioState::Done,
        ]
    );

    // Frames alternate between host and device
    let log = testbench.scenario.packet_log();
    let directions: Vec<Direction> = log.frames().iter().map(|f| f.direction).collect();
    assert_eq!(
        directions,
        vec![
            Direction::ToDevice,
            Direction::FromDevice,
            Direction::ToDevice,
            Direction::FromDevice,
            Direction::ToDevice,
            Direction::FromDevice,
        ]
    );
}

#[test]
fn pass_1000() {
    check_pass(TestbenchConfig::default());
}

#[test]
fn pass_100() {
    check_pass(TestbenchConfig {
        speed: Speed::Mbps100,
        seed: 1,
        ..TestbenchConfig::default()
    });
}

#[test]
fn pass_10() {
    // A request takes most of a millisecond to send at 10 Mb/s
    check_pass(TestbenchConfig {
        speed: Speed::Mbps10,
        seed: 2,
        timeout_cycles: 1_000_000,
        ..TestbenchConfig::default()
    });
}

#[test]
fn pass_full_byte_range() {
    check_pass(TestbenchConfig {
        seed: 3,
        matrix_range: 0..=255,
        ..TestbenchConfig::default()
    });
}

#[test]
fn same_seed_same_run() {
    let config = TestbenchConfig {
        seed: 42,
        ..TestbenchConfig::default()
    };
    let (first_tb, first) = run_with(config.clone(), Fault::None);
    let (second_tb, second) = run_with(config, Fault::None);
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(
        first_tb.scenario.packet_log().frames(),
        second_tb.scenario.packet_log().frames()
    );

    let (other_tb, _) = run_with(
        TestbenchConfig {
            seed: 43,
            ..TestbenchConfig::default()
        },
        Fault::None,
    );
    assert_ne!(first_tb.scenario.vectors(), other_tb.scenario.vectors());
}

#[test]
fn silent_device_times_out() {
    let config = TestbenchConfig {
        timeout_cycles: 2000,
        ..TestbenchConfig::default()
    };
    let (testbench, result) = run_with(config, Fault::Silent);
    match result {
        Err(TbFailure::Timeout {
            waiting_for,
            cycles,
        }) => {
            assert_eq!(waiting_for, "ARP request");
            assert_eq!(cycles, 2000);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(testbench.scenario.state(), ScenarioState::AwaitArpRequest);
}

#[test]
fn corrupt_result() {
    let (testbench, result) = run_with(TestbenchConfig::default(), Fault::CorruptResult);
    let failure = result.unwrap_err();
    match &failure {
        TbFailure::Payload {
            round,
            expected,
            actual,
        } => {
            assert_eq!(*round, 1);
            assert_eq!(expected.len(), actual.len());
            assert_eq!(expected[0], !actual[0]);
            assert_eq!(expected[1..], actual[1..]);
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(failure.kind(), "payload");
    assert!(failure.to_string().contains("1 cells differ"));
    assert_eq!(testbench.scenario.state(), ScenarioState::Validate);
}

#[test]
fn bad_arp_request() {
    let (testbench, result) = run_with(TestbenchConfig::default(), Fault::BadArpRequest);
    match result {
        Err(TbFailure::Protocol { check, .. }) => assert_eq!(check, "ARP ptype"),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(testbench.scenario.state(), ScenarioState::AwaitArpRequest);
    assert_eq!(testbench.scenario.packet_log().len(), 2);
}

#[test]
fn corrupt_second_result() {
    let (testbench, result) = run_with(TestbenchConfig::default(), Fault::CorruptSecondResult);
    match result {
        Err(TbFailure::Payload {
            round,
            expected,
            actual,
        }) => {
            assert_eq!(round, ROUNDS);
            assert_eq!(expected[0], !actual[0]);
            assert_eq!(expected[1..], actual[1..]);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(testbench.scenario.state(), ScenarioState::RepeatRoundTrip);
    assert_eq!(testbench.scenario.packet_log().len(), 6);
}

#[test]
fn swapped_ports() {
    let config = TestbenchConfig::default();
    let (device_port, host_port) = (config.device.port, config.host.port);
    let (testbench, result) = run_with(config, Fault::SwappedPorts);
    let failure = result.unwrap_err();
    match &failure {
        TbFailure::Protocol {
            check,
            expected,
            actual,
            ..
        } => {
            assert_eq!(check, "source port");
            assert_eq!(*expected, device_port.to_string());
            assert_eq!(*actual, host_port.to_string());
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(failure.kind(), "protocol");
    assert_eq!(testbench.scenario.state(), ScenarioState::AwaitResult);
}

#[test]
fn bad_fcs() {
    let (testbench, result) = run_with(TestbenchConfig::default(), Fault::BadFcs);
    let failure = result.unwrap_err();
    match &failure {
        TbFailure::Parse {
            waiting_for, error, ..
        } => {
            assert_eq!(waiting_for, "ARP request");
            assert!(error.starts_with("bad FCS"), "{error}");
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(failure.kind(), "parse");
    assert_eq!(testbench.scenario.state(), ScenarioState::AwaitArpRequest);

    // The unframed bytes are still logged
    let log = testbench.scenario.packet_log();
    assert_eq!(log.count(Direction::FromDevice), 1);
}

#[test]
fn truncated_result() {
    let (testbench, result) = run_with(TestbenchConfig::default(), Fault::TruncatedResult);
    let failure = result.unwrap_err();
    match &failure {
        TbFailure::Parse {
            waiting_for, error, ..
        } => {
            assert_eq!(waiting_for, "UDP result");
            assert!(error.contains("IPv4 total length"), "{error}");
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(failure.kind(), "parse");
    assert_eq!(testbench.scenario.state(), ScenarioState::AwaitResult);
}

fn capture_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("run.pcap")
}

#[test]
fn capture_on_pass() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestbenchConfig {
        capture_file: Some(capture_path(&dir)),
        ..TestbenchConfig::default()
    };
    let (testbench, result) = run_with(config, Fault::None);
    let report = result.unwrap();
    assert_eq!(report.capture, Some((capture_path(&dir), 6)));

    let records = read_records(&fs::read(capture_path(&dir)).unwrap()).unwrap();
    assert_eq!(records.len(), 6);
    let log = testbench.scenario.packet_log();
    for (record, frame) in records.iter().zip(log.frames()) {
        assert_eq!(record.data, frame.data);
    }
}

#[test]
fn capture_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestbenchConfig {
        capture_file: Some(capture_path(&dir)),
        timeout_cycles: 2000,
        ..TestbenchConfig::default()
    };
    let (_testbench, result) = run_with(config, Fault::Silent);
    assert!(matches!(result, Err(TbFailure::Timeout { .. })));

    // Only the request made it onto the wire
    let records = read_records(&fs::read(capture_path(&dir)).unwrap()).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn unwritable_capture_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestbenchConfig {
        capture_file: Some(dir.path().join("missing").join("run.pcap")),
        ..TestbenchConfig::default()
    };
    let (_testbench, result) = run_with(config, Fault::None);
    assert!(matches!(result, Err(TbFailure::Capture(_))));
}
