//! Console observer for session lifecycle events.

use hub::protocol::{SessionEvent, SessionEventKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Logs every event and, when `print_qr` is set, prints fresh challenges as QR codes.
pub fn spawn(mut events: broadcast::Receiver<SessionEvent>, print_qr: bool) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(event) => observe(&event, print_qr),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(target = "hub.events", skipped, "observer fell behind");
				}
				Err(broadcast::error::RecvError::Closed) => break,
			}
		}
	})
}

fn observe(event: &SessionEvent, print_qr: bool) {
	let session = event.session.as_str();
	match &event.kind {
		SessionEventKind::StateChanged { from, to } => {
			debug!(target = "hub.events", session, %from, %to, "state changed");
		}
		SessionEventKind::Challenge { value } => {
			info!(target = "hub.events", session, "challenge ready at /sessions/{session}/qr");
			if print_qr {
				print_challenge(session, value);
			}
		}
		SessionEventKind::Connected { device } => {
			let device = device.as_ref().map(|d| d.id.as_str()).unwrap_or("unknown");
			info!(target = "hub.events", session, device, "connected");
		}
		SessionEventKind::RestartScheduled { attempt, delay_ms } => {
			info!(target = "hub.events", session, attempt, delay_ms, "restart scheduled");
		}
		SessionEventKind::Terminated { cause } => {
			warn!(target = "hub.events", session, ?cause, "terminated; reset required");
		}
		SessionEventKind::PersistenceFailed { message } => {
			warn!(target = "hub.events", session, message = message.as_str(), "persistence failed");
		}
		SessionEventKind::MessagesArrived { count } => {
			debug!(target = "hub.events", session, count, "messages arrived");
		}
	}
}

fn print_challenge(session: &str, value: &str) {
	println!("Login challenge for session '{session}':");
	println!("{value}");
	match hub::render_terminal(value) {
		Ok(rendered) => println!("{rendered}"),
		Err(err) => warn!(target = "hub.events", session, error = %err, "failed to render challenge"),
	}
}
