// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prints "Hi" on the serial port, writes exit status 1, then spins.
const HELLO_EXIT: [u32; 9] = [
    0x0000_70B7, // lui  x1, 0x7
    0x9690_8193, // addi x3, x1, -0x697
    0x0480_0113, // addi x2, x0, 'H'
    0x0021_8023, // sb   x2, 0(x3)
    0x0690_0113, // addi x2, x0, 'i'
    0x0021_8023, // sb   x2, 0(x3)
    0x0010_0113, // addi x2, x0, 1
    0x0020_8023, // sb   x2, 0(x1)
    0x0000_006F, // jal  x0, 0
];

fn test_dir(name: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("serialfmt-tests-{}-{}", name, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn write_image(dir: &std::path::Path, words: &[u32]) -> PathBuf {
    let path = dir.join("image.bin");
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, bytes).expect("Failed to write image");
    path
}

fn serialfmt() -> Command {
    Command::new(env!("CARGO_BIN_EXE_serialfmt"))
}

#[test]
fn test_cli_help() {
    let output = serialfmt()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("serialfmt RV32I simulator"));
    assert!(stdout.contains("disasm"));
}

#[test]
fn test_cli_load_missing_file() {
    let output = serialfmt()
        .args(["run", "-f", "non_existent_file.elf"])
        .output()
        .expect("Failed to execute command");

    // It should fail because file is missing
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_run_exits_with_guest_status() {
    let dir = test_dir("run");
    let image = write_image(&dir, &HELLO_EXIT);

    let output = serialfmt()
        .args(["run", "-f", image.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hi");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_run_quiet_and_step_limited() {
    let dir = test_dir("run-quiet");
    let image = write_image(&dir, &[0x0000_006F]);

    let output = serialfmt()
        .args([
            "run",
            "-f",
            image.to_str().unwrap(),
            "--max-steps",
            "100",
            "--no-serial-stdout",
        ])
        .output()
        .expect("Failed to execute command");

    // Guest never exited
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_run_max_steps_guard() {
    let dir = test_dir("run-huge");
    let image = write_image(&dir, &HELLO_EXIT);

    let output = serialfmt()
        .args(["run", "-f", image.to_str().unwrap(), "--max-steps", "60000000"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exceeds the allowed maximum"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_run_reports_instruction_count() {
    let dir = test_dir("run-metrics");
    let image = write_image(&dir, &HELLO_EXIT);

    let output = serialfmt()
        .args(["run", "-f", image.to_str().unwrap(), "--no-serial-stdout"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Executed 8 instructions"), "stderr: {}", stderr);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_outputs() {
    let dir = test_dir("outputs");
    write_image(&dir, &HELLO_EXIT);

    let script_path = dir.join("script.yaml");
    let script_content = r#"
schema_version: "1.0"
inputs:
  firmware: "image.bin"
limits:
  max_steps: 1000
assertions:
  - serial_equals: "Hi"
  - expected_exit_code: 1
  - expected_stop_reason: exit
"#;
    std::fs::write(&script_path, script_content).expect("Failed to write script");

    let output_dir = dir.join("artifacts");

    let output = serialfmt()
        .args([
            "test",
            "--script",
            script_path.to_str().unwrap(),
            "--no-serial-stdout",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());

    let result_path = output_dir.join("result.json");
    let result_content = std::fs::read_to_string(&result_path).unwrap();
    let result: serde_json::Value = serde_json::from_str(&result_content).unwrap();

    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "exit");
    assert_eq!(result["exit_code"], 1);
    assert_eq!(result["serial"], "Hi");
    assert_eq!(result["steps"], 8);
    assert_eq!(result["firmware_hash"].as_str().unwrap().len(), 64);
    assert!(result["config"]["firmware"]
        .as_str()
        .unwrap()
        .contains("image.bin"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_assertion_fail() {
    let dir = test_dir("assert-fail");
    write_image(&dir, &HELLO_EXIT);

    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  firmware: "image.bin"
limits:
  max_steps: 1000
assertions:
  - serial_contains: "ThisTextWillNeverBeFound"
"#,
    )
    .unwrap();

    let output = serialfmt()
        .args(["test", "--script", script_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1)); // EXIT_ASSERT_FAIL

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_memory_violation() {
    let dir = test_dir("memviol");
    // lui x1, 0x2000 ; lw x2, 0(x1) reads past the end of RAM
    write_image(&dir, &[0x0200_00B7, 0x0000_A103]);

    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  firmware: "image.bin"
limits:
  max_steps: 1000
assertions:
  - expected_stop_reason: memory_violation
"#,
    )
    .unwrap();

    let output = serialfmt()
        .args(["test", "--script", script_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_max_steps_guard() {
    let dir = test_dir("huge");
    write_image(&dir, &HELLO_EXIT);

    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  firmware: "image.bin"
limits:
  max_steps: 60000000
"#,
    )
    .unwrap();

    let output = serialfmt()
        .args(["test", "--script", script_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_disasm() {
    let dir = test_dir("disasm");
    let image = write_image(&dir, &HELLO_EXIT);

    let output = serialfmt()
        .args(["disasm", "-f", image.to_str().unwrap(), "-n", "2"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.starts_with("00000000: 000070b7  lui x1, 0x7"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_debug_session() {
    let dir = test_dir("debug");
    let image = write_image(&dir, &HELLO_EXIT);

    let mut child = serialfmt()
        .args(["debug", "-f", image.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn debugger");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"b 0x1c\nc\ni regs\nq\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hi");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Hit breakpoint at 0x0000001C"));
    assert!(stderr.contains("0000001C> sb x2, 0(x1)"));

    let _ = std::fs::remove_dir_all(&dir);
}
