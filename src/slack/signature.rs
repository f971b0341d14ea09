//! Slack request signature verification.
//!
//! Slack signs every HTTP request it sends with the app's signing secret:
//! `X-Slack-Signature: v0=hex(HMAC-SHA256(secret, "v0:{timestamp}:{body}"))`.
//! Requests whose `X-Slack-Request-Timestamp` is more than five minutes away
//! from the local clock are rejected to stop replays.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const MAX_TIMESTAMP_AGE_SECS: i64 = 300;
const VERSION_PREFIX: &str = "v0=";

type HmacSha256 = Hmac<Sha256>;

/// Check a request signature against the signing secret at time `now`
pub fn verify_signature_at(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> bool {
    let Ok(ts) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    if (now - ts).abs() > MAX_TIMESTAMP_AGE_SECS {
        return false;
    }

    let Some(provided) = signature.strip_prefix(VERSION_PREFIX) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{}:", timestamp.trim()).as_bytes());
    mac.update(body);

    // verify_slice compares in constant time
    mac.verify_slice(&provided).is_ok()
}

/// Check a request signature against the current wall clock
pub fn verify_signature(signing_secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    verify_signature_at(
        signing_secret,
        timestamp,
        body,
        signature,
        chrono::Utc::now().timestamp(),
    )
}

/// Compute the `v0=...` signature Slack would send for a body
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any size"));
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    format!("{}{}", VERSION_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_531_420_618;

    #[test]
    fn test_known_slack_example() {
        // Example from Slack's request verification documentation
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let signature = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";

        assert!(verify_signature_at(SECRET, "1531420618", body, signature, NOW));
    }

    #[test]
    fn test_roundtrip_with_current_clock() {
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = compute_signature(SECRET, &ts, b"payload");
        assert!(verify_signature(SECRET, &ts, b"payload", &sig));
    }

    #[test]
    fn test_tampered_body_fails() {
        let sig = compute_signature(SECRET, "1531420618", b"original");
        assert!(!verify_signature_at(SECRET, "1531420618", b"tampered", &sig, NOW));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let sig = compute_signature("another-secret", "1531420618", b"body");
        assert!(!verify_signature_at(SECRET, "1531420618", b"body", &sig, NOW));
    }

    #[test]
    fn test_stale_and_future_timestamps_fail() {
        let old = (NOW - 600).to_string();
        let sig = compute_signature(SECRET, &old, b"body");
        assert!(!verify_signature_at(SECRET, &old, b"body", &sig, NOW));

        let future = (NOW + 600).to_string();
        let sig = compute_signature(SECRET, &future, b"body");
        assert!(!verify_signature_at(SECRET, &future, b"body", &sig, NOW));

        let recent = (NOW - 120).to_string();
        let sig = compute_signature(SECRET, &recent, b"body");
        assert!(verify_signature_at(SECRET, &recent, b"body", &sig, NOW));
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let sig = compute_signature(SECRET, "1531420618", b"body");
        assert!(!verify_signature_at(SECRET, "not-a-number", b"body", &sig, NOW));
        assert!(!verify_signature_at(SECRET, "1531420618", b"body", "", NOW));
        assert!(!verify_signature_at(SECRET, "1531420618", b"body", &sig[3..], NOW));
        assert!(!verify_signature_at(SECRET, "1531420618", b"body", "v0=zz", NOW));
    }
}
