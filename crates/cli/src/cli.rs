use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use hub::{BackoffPolicy, CredentialPolicy, SupervisorConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "hub")]
#[command(about = "Session hub - supervised messaging sessions behind an HTTP API")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = ArgAction::Count)]
	pub verbose: u8,

	/// Address the HTTP API listens on
	#[arg(long, env = "HUB_LISTEN", default_value = "127.0.0.1:3000")]
	pub listen: SocketAddr,

	/// Override only the port of --listen
	#[arg(long, env = "PORT")]
	pub port: Option<u16>,

	/// Directory holding sessions.json
	#[arg(long, env = "HUB_DATA_DIR", value_name = "DIR", default_value = "./hub-data")]
	pub data_dir: PathBuf,

	/// Base WebSocket URL of the protocol bridge; the session id is appended
	#[arg(long, env = "HUB_BRIDGE_URL", default_value = "ws://127.0.0.1:8765/sessions")]
	pub bridge_url: String,

	/// Delay before the first automatic restart (ms)
	#[arg(long, env = "HUB_BACKOFF_BASE_MS", default_value_t = 2000)]
	pub backoff_base_ms: u64,

	/// Upper bound for any restart delay (ms)
	#[arg(long, env = "HUB_BACKOFF_CAP_MS", default_value_t = 30_000)]
	pub backoff_cap_ms: u64,

	/// Automatic restarts before a session is terminated
	#[arg(long, env = "HUB_MAX_RESTARTS", default_value_t = 5)]
	pub max_restarts: u32,

	/// Let newer credentials replace the first stored one
	#[arg(long, env = "HUB_REPLACE_CREDENTIALS")]
	pub replace_credentials: bool,

	/// Print login challenges to the console as QR codes
	#[arg(long, env = "PRINT_QR_CONSOLE", default_value_t = true, action = ArgAction::Set)]
	pub print_qr: bool,
}

impl Cli {
	pub fn listen_addr(&self) -> SocketAddr {
		let mut addr = self.listen;
		if let Some(port) = self.port {
			addr.set_port(port);
		}
		addr
	}

	pub fn supervisor_config(&self) -> SupervisorConfig {
		SupervisorConfig {
			backoff: BackoffPolicy::new(
				Duration::from_millis(self.backoff_base_ms),
				Duration::from_millis(self.backoff_cap_ms),
				self.max_restarts,
			),
			credential_policy: if self.replace_credentials {
				CredentialPolicy::ReplaceOnChange
			} else {
				CredentialPolicy::KeepFirst
			},
			..SupervisorConfig::default()
		}
	}
}
