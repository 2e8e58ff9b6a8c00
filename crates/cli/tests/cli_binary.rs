use std::path::PathBuf;
use std::process::Command;

fn hub_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("hub");
	path
}

#[test]
fn help_lists_flags_and_env_vars() {
	let output = Command::new(hub_binary()).arg("--help").output().expect("failed to run hub");
	assert!(output.status.success());
	let stdout = String::from_utf8_lossy(&output.stdout);
	for flag in ["--listen", "--data-dir", "--bridge-url", "--max-restarts", "--print-qr"] {
		assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
	}
	assert!(stdout.contains("PRINT_QR_CONSOLE"));
}

#[test]
fn unreadable_store_fails_startup() {
	let dir = tempfile::TempDir::new().unwrap();
	std::fs::write(dir.path().join("sessions.json"), "{ not json").unwrap();

	let output = Command::new(hub_binary())
		.args(["--data-dir", dir.path().to_str().unwrap(), "--listen", "127.0.0.1:0"])
		.env_remove("PORT")
		.env_remove("RUST_LOG")
		.output()
		.expect("failed to run hub");
	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("failed to open session store"), "stderr:\n{stderr}");
}
