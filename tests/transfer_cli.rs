//! Black-box tests of the `transfer` binary.

use std::fs;
use std::net::TcpListener;

use assert_cmd::Command;
use compress::EngineParams;
use predicates::prelude::*;
use tempfile::TempDir;

fn transfer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_transfer"))
}

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn sample_text() -> Vec<u8> {
    (b'a'..=b'z')
        .flat_map(|letter| std::iter::repeat_n(letter, 1_000))
        .collect()
}

#[test]
fn compress_then_decompress_restores_the_file() {
    let dir = TempDir::new().expect("tempdir");
    let original = sample_text();
    let input = write_file(&dir, "letters.txt", &original);
    let packed = dir.path().join("letters.z");
    let restored = dir.path().join("letters.out");

    transfer()
        .args(["--compress", "--quality", "95"])
        .arg(&input)
        .arg(&packed)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert!(fs::metadata(&packed).expect("packed").len() < original.len() as u64);

    transfer().arg(&packed).arg(&restored).assert().success();
    assert_eq!(fs::read(&restored).expect("restored"), original);
}

#[cfg(feature = "zstd")]
#[test]
fn zstd_round_trip_through_stdout() {
    let dir = TempDir::new().expect("tempdir");
    let original = sample_text();
    let input = write_file(&dir, "letters.txt", &original);
    let packed = dir.path().join("letters.zst");

    transfer()
        .args(["-z", "--algorithm", "zstd"])
        .arg(&input)
        .arg(&packed)
        .assert()
        .success();

    let output = transfer()
        .args(["--algorithm", "zstd"])
        .arg(&packed)
        .arg("-")
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(output.stdout, original);
}

#[test]
fn decompressing_to_stdout() {
    let dir = TempDir::new().expect("tempdir");
    let compressed =
        compress::compress_to_vec(b"hello from a compressed file\n", EngineParams::default())
            .expect("compress");
    let input = write_file(&dir, "hello.z", &compressed);

    transfer()
        .arg(&input)
        .arg("-")
        .assert()
        .success()
        .stdout("hello from a compressed file\n");
}

#[test]
fn missing_resource_exits_with_two() {
    let dir = TempDir::new().expect("tempdir");
    transfer()
        .arg(dir.path().join("absent.z"))
        .arg("-")
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("transfer: not found: "));
}

#[test]
fn corrupt_stream_exits_with_three() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_file(&dir, "bogus.z", b"this was never compressed at all");
    transfer()
        .arg(&input)
        .arg(dir.path().join("out"))
        .assert()
        .code(3)
        .stderr(predicate::str::starts_with("transfer: "));
}

#[test]
fn unwritable_destination_exits_with_four() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_file(&dir, "plain.txt", b"plain");
    transfer()
        .arg("-z")
        .arg(&input)
        .arg(dir.path().join("missing-dir").join("out.z"))
        .assert()
        .code(4)
        .stderr(predicate::str::starts_with("transfer: write error: "));
}

#[test]
fn bad_arguments_exit_with_five() {
    transfer().assert().code(5);
    transfer()
        .args(["--quality", "500", "a", "b"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("--quality"));
}

#[test]
fn refused_connection_exits_with_one() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    transfer()
        .arg(format!("http://127.0.0.1:{port}/payload.z"))
        .arg("-")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("transfer: connection"));
}

#[test]
fn version_is_printed() {
    transfer()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("transfer "));
}
