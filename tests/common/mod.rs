use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_acol"))
}

/// Run `acol` with an isolated HOME so no user config or log is touched.
///
/// Every invocation leaves a log under the temp dir for post-mortem reading.
pub fn run_cli_case(case_name: &str, home: &Path, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("acol-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", home)
        .env_remove("ACOL_COLLECTOR_SIDECAR_NAME")
        .env_remove("ACOL_WATCH_POLL_INTERVAL_MS")
        .env_remove("ACOL_ACTIVITY_LOG")
        .env_remove("ACOL_OUTPUT_FORMAT")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute acol command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
