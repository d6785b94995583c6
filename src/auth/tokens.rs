use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::user;

/// What a signed token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload for storefront tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    /// Access tokens carry the account's name and grants; refresh tokens only
    /// identify the account.
    pub(crate) fn for_account(
        account: &user::Model,
        kind: TokenKind,
        ttl: ChronoDuration,
        issuer: &str,
        audience: &str,
        grants: (Vec<String>, Vec<String>),
    ) -> Self {
        let now = Utc::now();
        let (roles, permissions) = match kind {
            TokenKind::Access => grants,
            TokenKind::Refresh => (Vec::new(), Vec::new()),
        };
        let identity = kind == TokenKind::Access;

        Self {
            sub: account.id.to_string(),
            name: identity.then(|| account.username.clone()),
            email: identity.then(|| account.email.clone()),
            roles,
            permissions,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            kind,
        }
    }

    pub fn account_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Token ids revoked by logout or refresh rotation, kept until they expire.
#[derive(Debug, Default)]
pub(crate) struct RevocationList {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RevocationList {
    pub(crate) async fn revoke(&self, jti: String, exp: i64) {
        let until = DateTime::<Utc>::from_timestamp(exp, 0).unwrap_or_else(Utc::now);
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires| *expires > now);
        revoked.insert(jti, until);
    }

    pub(crate) async fn contains(&self, jti: &str) -> bool {
        self.revoked.read().await.contains_key(jti)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            username: "olena".into(),
            email: "olena@example.com".into(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn refresh_claims_drop_identity_and_grants() {
        let grants = (vec!["customer".to_string()], vec!["x:y".to_string()]);
        let claims = Claims::for_account(
            &account(),
            TokenKind::Refresh,
            ChronoDuration::hours(1),
            "iss",
            "aud",
            grants,
        );
        assert!(claims.name.is_none());
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_on_revoke() {
        let list = RevocationList::default();
        list.revoke("old".into(), Utc::now().timestamp() - 10).await;
        list.revoke("new".into(), Utc::now().timestamp() + 600).await;

        assert!(!list.contains("old").await);
        assert!(list.contains("new").await);
    }
}
