use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn bytesim() -> Command {
    Command::cargo_bin("bytesim").unwrap()
}

#[test]
fn runs_without_arguments() {
    let mut cmd = bytesim();
    cmd.assert().success();
}

#[test]
fn runs_hello_world() {
    let mut cmd = bytesim();
    cmd.arg("run").arg("tests/files/hello.asm");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("42\nHello, world!\n"))
        .stdout(predicate::str::contains("Halted"));
}

#[test]
fn runs_path_shorthand() {
    let mut cmd = bytesim();
    cmd.arg("tests/files/hello.asm");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello, world!"));
}

#[test]
fn runs_loop_minimal() {
    let mut cmd = bytesim();
    cmd.arg("run").arg("--minimal").arg("tests/files/loop.asm");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("tick\ntick\ntick\n"))
        .stdout(predicate::str::contains("tick\ntick\ntick\ntick").not());
}

#[test]
fn traces_registers() {
    let mut cmd = bytesim();
    cmd.arg("run")
        .arg("--minimal")
        .arg("--trace")
        .arg("tests/files/loop.asm");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("R0 3\n"))
        .stderr(predicate::str::contains("SP 231\n"));
}

#[test]
fn trace_headers_only_without_minimal() {
    let mut cmd = bytesim();
    cmd.arg("run").arg("--trace").arg("tests/files/loop.asm");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("step 1 -> IP 0x03"));

    let mut cmd = bytesim();
    cmd.arg("run")
        .arg("--minimal")
        .arg("--trace")
        .arg("tests/files/loop.asm");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("step 1").not());
}

#[test]
fn trace_from_environment() {
    let mut cmd = bytesim();
    cmd.env("BYTESIM_TRACE", "1")
        .arg("run")
        .arg("--minimal")
        .arg("tests/files/loop.asm");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("R0 2\n"));
}

#[test]
fn reports_fault() {
    let mut cmd = bytesim();
    cmd.arg("run").arg("tests/files/fault.asm");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Stack underflow (IP = 0)"));
}

#[test]
fn stops_at_step_limit() {
    let mut cmd = bytesim();
    cmd.arg("run")
        .arg("--max-steps")
        .arg("100")
        .arg("tests/files/infinite.asm");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("did not halt within 100 steps"));
}

#[test]
fn step_limit_from_environment() {
    let mut cmd = bytesim();
    cmd.env("BYTESIM_MAX_STEPS", "10")
        .arg("run")
        .arg("tests/files/infinite.asm");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("within 10 steps"));
}

#[test]
fn check_accepts_valid_source() {
    let mut cmd = bytesim();
    cmd.arg("check").arg("tests/files/hello.asm");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("no errors found"));
}

#[test]
fn check_reports_undefined_label() {
    let mut cmd = bytesim();
    cmd.arg("check").arg("tests/files/undefined_label.asm");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Undefined label: nowhere"));
}

#[test]
fn check_reports_duplicate_label() {
    let mut cmd = bytesim();
    cmd.arg("check").arg("tests/files/duplicate_label.asm");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate label: LOOP"));
}

#[test]
fn compile_then_run_image() {
    let dest = std::env::temp_dir().join("bytesim_hello_test.bin");
    let mut cmd = bytesim();
    cmd.arg("compile").arg("tests/files/hello.asm").arg(&dest);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Saved"));

    let image = std::fs::read(&dest).unwrap();
    // CP number to address, then the count cell
    assert_eq!(image[0], 2);
    assert!(image.len() <= 256);

    let mut cmd = bytesim();
    cmd.arg("run").arg(&dest);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("42\nHello, world!\n"));
    let _ = std::fs::remove_file(&dest);
}

#[test]
fn prints_labels() {
    let mut cmd = bytesim();
    cmd.arg("labels").arg("tests/files/hello.asm");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("greeting"))
        .stdout(predicate::str::contains("count"))
        .stdout(predicate::str::contains("0x00 -> 2"));
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = bytesim();
    cmd.arg("run").arg("Cargo.toml");
    cmd.assert().failure();
}
