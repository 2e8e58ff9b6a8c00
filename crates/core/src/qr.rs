//! Login challenge rendering.
//!
//! Only the raw challenge string is ever stored. Images are produced on
//! demand from whatever challenge is pending at the time of the request.

use qrcode::QrCode;
use qrcode::render::{svg, unicode};

use crate::error::{Error, Result};
use crate::session::Session;

/// Content type of [`encode_challenge`] output.
pub const CHALLENGE_CONTENT_TYPE: &str = "image/svg+xml";

/// Encodes a challenge string as a scannable SVG image.
pub fn encode_challenge(challenge: &str) -> Result<Vec<u8>> {
	let code = QrCode::new(challenge.as_bytes())?;
	let image = code
		.render::<svg::Color>()
		.min_dimensions(256, 256)
		.dark_color(svg::Color("#000000"))
		.light_color(svg::Color("#ffffff"))
		.build();
	Ok(image.into_bytes())
}

/// Renders a challenge for a terminal using half-block characters.
pub fn render_terminal(challenge: &str) -> Result<String> {
	let code = QrCode::new(challenge.as_bytes())?;
	Ok(code
		.render::<unicode::Dense1x2>()
		.dark_color(unicode::Dense1x2::Light)
		.light_color(unicode::Dense1x2::Dark)
		.build())
}

/// Renders the pending challenge of `session`, if there is one.
pub fn challenge_image(session: &Session) -> Result<Vec<u8>> {
	let challenge = session
		.pending_challenge()
		.ok_or_else(|| Error::ChallengeUnavailable(session.id.clone()))?;
	encode_challenge(challenge)
}

#[cfg(test)]
mod tests {
	use hub_protocol::SessionState;

	use super::*;

	#[test]
	fn encodes_svg() {
		let bytes = encode_challenge("2@Yx9k1,abc,def").unwrap();
		let text = String::from_utf8(bytes).unwrap();
		assert!(text.contains("<svg"));
	}

	#[test]
	fn terminal_rendering_is_multiline() {
		let text = render_terminal("2@Yx9k1").unwrap();
		assert!(text.lines().count() > 5);
	}

	#[test]
	fn no_image_without_pending_challenge() {
		let mut session = Session::new("ops");
		session.state = SessionState::Connected;
		session.challenge = Some("stale".into());
		assert!(matches!(challenge_image(&session), Err(Error::ChallengeUnavailable(_))));

		session.state = SessionState::AwaitingChallenge;
		assert!(challenge_image(&session).is_ok());
	}
}
