/*!
 * # Account Activation Tokens
 *
 * Tokens have the form `{timestamp_base36}-{hmac_hex}`. The HMAC covers the
 * user id, password hash and activation flag, so a token stops working once
 * the account is activated or its password changes.
 */

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::entities::user;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the MAC kept in the token (32 hex characters).
const TOKEN_MAC_BYTES: usize = 16;

#[derive(Clone, Debug)]
pub struct ActivationTokens {
    secret: String,
    ttl: Duration,
}

impl ActivationTokens {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn make_token(&self, user: &user::Model, now: DateTime<Utc>) -> Result<String, InvalidLength> {
        let ts = now.timestamp().max(0) as u64;
        let tag = self.keyed(user, ts)?.finalize().into_bytes();
        Ok(format!(
            "{}-{}",
            to_base36(ts),
            hex::encode(&tag[..TOKEN_MAC_BYTES])
        ))
    }

    pub fn check_token(&self, user: &user::Model, token: &str, now: DateTime<Utc>) -> bool {
        let Some((ts_part, mac_part)) = token.split_once('-') else {
            return false;
        };
        let Ok(ts) = u64::from_str_radix(ts_part, 36) else {
            return false;
        };
        let Ok(tag) = hex::decode(mac_part) else {
            return false;
        };
        if tag.len() != TOKEN_MAC_BYTES {
            return false;
        }
        let Ok(mac) = self.keyed(user, ts) else {
            return false;
        };
        if mac.verify_truncated_left(&tag).is_err() {
            return false;
        }

        let age = now.timestamp() - ts as i64;
        (0..=self.ttl.num_seconds()).contains(&age)
    }

    fn keyed(&self, user: &user::Model, ts: u64) -> Result<HmacSha256, InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())?;
        mac.update(user.id.as_bytes());
        mac.update(user.password_hash.as_bytes());
        mac.update(if user.is_active { b"1" } else { b"0" });
        mac.update(ts.to_string().as_bytes());
        Ok(mac)
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// URL-safe encoding of a user id for activation links
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uid: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim_end_matches('=')).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inactive_user() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            username: "taras".into(),
            email: "taras@example.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            is_active: false,
            is_superuser: false,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tokens() -> ActivationTokens {
        ActivationTokens::new("activation-secret", Duration::days(3))
    }

    #[test]
    fn fresh_token_is_accepted() {
        let user = inactive_user();
        let now = Utc::now();
        let token = tokens().make_token(&user, now).unwrap();
        assert!(tokens().check_token(&user, &token, now + Duration::hours(1)));
    }

    #[test]
    fn token_expires_after_ttl() {
        let user = inactive_user();
        let now = Utc::now();
        let token = tokens().make_token(&user, now).unwrap();
        assert!(!tokens().check_token(&user, &token, now + Duration::days(3) + Duration::seconds(1)));
    }

    #[test]
    fn token_stops_working_once_account_is_active() {
        let mut user = inactive_user();
        let now = Utc::now();
        let token = tokens().make_token(&user, now).unwrap();
        user.is_active = true;
        assert!(!tokens().check_token(&user, &token, now));
    }

    #[test]
    fn token_for_another_user_is_rejected() {
        let now = Utc::now();
        let token = tokens().make_token(&inactive_user(), now).unwrap();
        assert!(!tokens().check_token(&inactive_user(), &token, now));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let user = inactive_user();
        for token in ["", "-", "abc", "zz-nothex", "1-abcd"] {
            assert!(!tokens().check_token(&user, token, Utc::now()), "{token}");
        }
    }

    #[test]
    fn uid_decodes_with_or_without_padding() {
        let id = Uuid::new_v4();
        let uid = encode_uid(id);
        assert!(!uid.contains('='));
        assert_eq!(decode_uid(&uid), Some(id));
        assert_eq!(decode_uid(&format!("{uid}==")), Some(id));
        assert_eq!(decode_uid("not base64!"), None);
    }

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(u64::from_str_radix(&to_base36(1_700_000_000), 36).unwrap(), 1_700_000_000);
    }

    proptest! {
        #[test]
        fn altering_the_mac_invalidates_the_token(pos in 0usize..32, replacement in "[0-9a-f]") {
            let user = inactive_user();
            let now = Utc::now();
            let token = tokens().make_token(&user, now).unwrap();
            let (ts, mac) = token.split_once('-').unwrap();
            let mut chars: Vec<char> = mac.chars().collect();
            let new_char = replacement.chars().next().unwrap();
            prop_assume!(chars[pos] != new_char);
            chars[pos] = new_char;
            let tampered = format!("{ts}-{}", chars.into_iter().collect::<String>());
            prop_assert!(!tokens().check_token(&user, &tampered, now));
        }
    }
}
