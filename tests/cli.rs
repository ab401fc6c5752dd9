//! Runs the actual binary.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value};

const TWO_RECORDS : &str = r#"{"@graph":[{"@id":"/rec/1"},{"foo":"bar"}]}
{"@graph":[{"@id":"/rec/2"},{"foo":"baz"}]}
"#;

fn ldvals(args : &[&str], stdin : &str) -> Output {
  let mut child = Command::new(env!("CARGO_BIN_EXE_ldvals"))
    .args(args)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .unwrap();
  child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
  child.wait_with_output().unwrap()
}

fn stdout_json(output : &Output) -> Value {
  serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn counts() {
  let output = ldvals(&["foo", "-q"], TWO_RECORDS);
  assert!(output.status.success());
  assert_eq!(stdout_json(&output), json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
}

#[test]
fn filter() {
  let output = ldvals(&["foo", "-q", "--filter", "v != 'baz'"], TWO_RECORDS);
  assert!(output.status.success());
  assert_eq!(stdout_json(&output), json!({"instanceOf.foo": {"bar": 1}}));
}

#[test]
fn examples() {
  let output = ldvals(&["1", "foo", "-q", "--compact"], TWO_RECORDS);
  assert!(output.status.success());
  assert_eq!(String::from_utf8_lossy(&output.stdout), "{\"instanceOf.foo\":{\"bar\":[\"1\"],\"baz\":[\"2\"]}}\n");
}

#[test]
fn no_keys_is_usage_error() {
  let output = ldvals(&["-t"], TWO_RECORDS);
  assert_eq!(output.status.code(), Some(2));
  assert!(output.stdout.is_empty());
  assert!(String::from_utf8_lossy(&output.stderr).contains("Provide keys"));
}

#[test]
fn bad_filter_is_usage_error() {
  let output = ldvals(&["foo", "--filter", "open('x')"], TWO_RECORDS);
  assert_eq!(output.status.code(), Some(2));
  assert!(output.stdout.is_empty());
}

#[test]
fn strict_fails_after_output() {
  let output = ldvals(&["foo", "-q", "--strict"], &format!("{TWO_RECORDS}garbage\n"));
  assert_eq!(output.status.code(), Some(1));
  assert_eq!(stdout_json(&output), json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
}

#[test]
fn progress_only_on_stderr() {
  let output = ldvals(&["foo"], TWO_RECORDS);
  assert!(output.status.success());
  // stdout is exactly one json document
  assert_eq!(stdout_json(&output), json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
  assert!(String::from_utf8_lossy(&output.stderr).contains("Records: 2"));
}

#[test]
fn input_file() {
  let path = std::env::temp_dir().join(format!("ldvals-test-{}.jsonl", std::process::id()));
  std::fs::write(&path, TWO_RECORDS).unwrap();
  let output = ldvals(&["foo", "-q", "-i", path.to_str().unwrap()], "");
  std::fs::remove_file(&path).unwrap();
  assert!(output.status.success());
  assert_eq!(stdout_json(&output), json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
}

#[test]
fn missing_input_file() {
  let output = ldvals(&["foo", "-q", "-i", "/nonexistent/ldvals.jsonl"], "");
  assert_eq!(output.status.code(), Some(1));
  assert!(output.stdout.is_empty());
}
