//! Observer notifications published by session supervisors.

use serde::{Deserialize, Serialize};

use crate::session::{DeviceInfo, SessionState};
use crate::transport::CloseReason;

/// Why a session stopped restarting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationCause {
	/// The transport closed for a reason that must not be retried.
	Closed { reason: CloseReason },
	/// Retriable closures kept happening until the restart budget ran out.
	MaxRetriesExceeded { attempts: u32 },
}

/// A single lifecycle notification for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
	pub session: String,
	#[serde(flatten)]
	pub kind: SessionEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEventKind {
	StateChanged {
		from: SessionState,
		to: SessionState,
	},
	Challenge {
		value: String,
	},
	Connected {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		device: Option<DeviceInfo>,
	},
	RestartScheduled {
		attempt: u32,
		delay_ms: u64,
	},
	Terminated {
		cause: TerminationCause,
	},
	PersistenceFailed {
		message: String,
	},
	MessagesArrived {
		count: usize,
	},
}
