// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use serialfmt_config::{StopReason, TestAssertion};
use serialfmt_sim::{Cpu, Machine, RunOutcome, SimulationError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Steps per `Machine::run` call between wall-clock checks.
const RUN_CHUNK: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub stop_reason: StopReason,
    pub exit_code: Option<u8>,
    pub steps: u64,
    pub serial: Vec<u8>,
}

impl Execution {
    pub fn serial_text(&self) -> String {
        String::from_utf8_lossy(&self.serial).into_owned()
    }
}

/// Runs `machine` until the guest exits, faults, or a limit is reached.
pub fn execute<C: Cpu>(
    machine: &mut Machine<C>,
    max_steps: u64,
    wall_time: Option<Duration>,
) -> Execution {
    let start = Instant::now();
    let mut remaining = max_steps;

    let (stop_reason, exit_code) = loop {
        if wall_time.is_some_and(|limit| start.elapsed() >= limit) {
            break (StopReason::WallTime, None);
        }

        let chunk = remaining.min(RUN_CHUNK);
        match machine.run(chunk) {
            Ok(RunOutcome::Exit(code)) => break (StopReason::Exit, Some(code)),
            Ok(RunOutcome::MaxSteps) => {
                remaining -= chunk;
                if remaining == 0 {
                    break (StopReason::MaxSteps, None);
                }
            }
            Err(e) => {
                warn!("Simulation stopped at step {}: {}", machine.steps, e);
                let reason = match e {
                    SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
                    SimulationError::DecodeError(_) => StopReason::DecodeError,
                };
                break (reason, None);
            }
        }
    };

    info!(
        "Stopped: {:?} after {} steps ({:?})",
        stop_reason,
        machine.steps,
        start.elapsed()
    );

    Execution {
        stop_reason,
        exit_code,
        steps: machine.steps,
        serial: machine.bus.serial_output(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertionResult {
    pub assertion: TestAssertion,
    pub passed: bool,
}

pub fn evaluate(assertions: &[TestAssertion], execution: &Execution) -> Vec<AssertionResult> {
    let serial = execution.serial_text();
    assertions
        .iter()
        .map(|assertion| {
            let passed = match assertion {
                TestAssertion::SerialContains(a) => serial.contains(&a.serial_contains),
                TestAssertion::SerialEquals(a) => serial == a.serial_equals,
                TestAssertion::ExitCode(a) => execution.exit_code == Some(a.expected_exit_code),
                TestAssertion::ExpectedStopReason(a) => {
                    execution.stop_reason == a.expected_stop_reason
                }
            };
            if !passed {
                warn!("Assertion failed: {:?}", assertion);
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect()
}

/// With no assertions a run passes unless the guest faulted.
pub fn passed(results: &[AssertionResult], execution: &Execution) -> bool {
    if results.is_empty() {
        return !matches!(
            execution.stop_reason,
            StopReason::MemoryViolation | StopReason::DecodeError
        );
    }
    results.iter().all(|r| r.passed)
}

#[derive(Debug, Serialize)]
pub struct TestConfigSummary {
    pub firmware: String,
    pub system: Option<String>,
    pub max_steps: u64,
    pub wall_time_ms: Option<u64>,
}

/// Contents of `result.json`.
#[derive(Debug, Serialize)]
pub struct TestReport {
    pub status: &'static str,
    pub stop_reason: StopReason,
    pub exit_code: Option<u8>,
    pub steps: u64,
    pub serial: String,
    pub firmware_hash: String,
    pub assertions: Vec<AssertionResult>,
    pub config: TestConfigSummary,
}

impl TestReport {
    pub fn new(
        execution: &Execution,
        assertions: Vec<AssertionResult>,
        firmware_hash: String,
        config: TestConfigSummary,
    ) -> Self {
        let status = if passed(&assertions, execution) {
            "pass"
        } else {
            "fail"
        };
        Self {
            status,
            stop_reason: execution.stop_reason,
            exit_code: execution.exit_code,
            steps: execution.steps,
            serial: execution.serial_text(),
            firmware_hash,
            assertions,
            config,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == "pass"
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(bytes))
}
