//! Supervisor configuration: restart backoff and credential write policy.

use std::time::Duration;

/// Bounded exponential backoff for automatic restarts.
///
/// The delay for attempt `n` (starting at 1) is `min(cap, base * 2^(n-1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
	pub base: Duration,
	pub cap: Duration,
	/// Restarts allowed before the session is terminated.
	pub max_attempts: u32,
}

impl BackoffPolicy {
	pub const DEFAULT_BASE: Duration = Duration::from_millis(2000);
	pub const DEFAULT_CAP: Duration = Duration::from_millis(30_000);
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

	pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
		Self { base, cap, max_attempts }
	}

	/// Returns the delay before restart attempt `attempt` (1-based).
	pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(31);
		let factor = 1u32 << exponent;
		self.base.saturating_mul(factor).min(self.cap)
	}

	/// Returns true once `attempts` restarts have used up the budget.
	pub fn is_exhausted(&self, attempts: u32) -> bool {
		attempts >= self.max_attempts
	}
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CAP, Self::DEFAULT_MAX_ATTEMPTS)
	}
}

/// How the auth-state bridge treats a new credential once one is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
	/// The first non-empty credential stays authoritative until a reset.
	#[default]
	KeepFirst,
	/// Every distinct credential replaces the stored one.
	ReplaceOnChange,
}

/// Settings shared by every supervisor a registry spawns.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub backoff: BackoffPolicy,
	pub credential_policy: CredentialPolicy,
	/// Capacity of the observer event channel.
	pub event_capacity: usize,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			backoff: BackoffPolicy::default(),
			credential_policy: CredentialPolicy::default(),
			event_capacity: 256,
		}
	}
}
