use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{check_password_policy, decode_uid, encode_uid, hash_password, ActivationTokens, AuthUser},
    config::AppConfig,
    db::DbPool,
    entities::user,
    errors::{field_errors, FieldErrors, ServiceError},
    events::{Event, EventSender},
    repositories::{PurchaseRepository, UserRepository},
    services::{
        mailer::{activation_email, Mailer},
        media::{decode_image, MediaStore},
        purchases::SnapshotView,
    },
};

pub const AVATAR_PLACEHOLDER: &str = "/static/img/placeholder.png";
const AVATAR_DIR: &str = "accounts/profiles/avatars";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SignupForm {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this value has at most 150 characters."),
        regex(
            path = "USERNAME_RE",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 64, message = "Ensure this value has at most 64 characters.")
    )]
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ProfileUpdateForm {
    #[validate(
        email(message = "Select correct email."),
        length(max = 64, message = "Ensure this value has at most 64 characters.")
    )]
    pub email: String,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    /// Base64 image, optionally as a `data:` URL
    pub avatar: Option<String>,
    #[serde(default)]
    pub clear_avatar: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupOutcome {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    Activated,
    AlreadyActive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivationOutcome {
    pub status: ActivationStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    /// Purchase snapshots, newest first
    pub last_buys: Vec<SnapshotView>,
}

/// Python-style title case: a letter is upper-cased when it follows a non-letter.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const SIGNUP_EMAIL_TAKEN: &str = "User with this Email address already exists.";
const PROFILE_EMAIL_TAKEN: &str = "This email used";

/// Rebuilds the form errors for a write that lost a uniqueness race, now that
/// the competing row is visible.
async fn duplicate_account_error<C: ConnectionTrait>(
    conn: &C,
    username: Option<&str>,
    email: &str,
    email_message: &str,
    except: Option<Uuid>,
) -> Result<ServiceError, ServiceError> {
    let users = UserRepository::new(conn);
    let mut errors = FieldErrors::new();
    if let Some(username) = username {
        if users.username_taken(username).await? {
            push_error(&mut errors, "username", USERNAME_TAKEN);
        }
    }
    if users.email_taken(email, except).await? {
        push_error(&mut errors, "email", email_message);
    }
    if errors.is_empty() {
        return Ok(ServiceError::Conflict("Account was modified concurrently".to_string()));
    }
    Ok(ServiceError::InvalidForm(errors))
}

/// Signup, email activation and profile management
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
    media: Arc<dyn MediaStore>,
    tokens: ActivationTokens,
    public_base_url: String,
    mail_from: String,
    max_avatar_bytes: usize,
}

impl AccountService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        media: Arc<dyn MediaStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            mailer,
            media,
            tokens: ActivationTokens::new(
                config.jwt_secret.clone(),
                Duration::seconds(config.activation_token_ttl_secs as i64),
            ),
            public_base_url: config.public_base_url().to_string(),
            mail_from: config.mail_from.clone(),
            max_avatar_bytes: config.max_avatar_bytes,
        }
    }

    pub fn activation_link(&self, account: &user::Model, now: DateTime<Utc>) -> Result<String, ServiceError> {
        let token = self
            .tokens
            .make_token(account, now)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        Ok(format!(
            "{}/accounts/activate/{}/{}/",
            self.public_base_url,
            encode_uid(account.id),
            token
        ))
    }

    /// Creates an inactive account and emails its activation link. A failed send
    /// rolls the account back.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn signup(&self, form: SignupForm) -> Result<SignupOutcome, ServiceError> {
        let username = form.username.trim().to_string();
        let email = form.email.trim().to_string();
        let mut errors = form.validate().err().map(|e| field_errors(&e)).unwrap_or_default();

        let users = UserRepository::new(&*self.db);
        if users.username_taken(&username).await? {
            push_error(&mut errors, "username", USERNAME_TAKEN);
        }
        if users.email_taken(&email, None).await? {
            push_error(&mut errors, "email", SIGNUP_EMAIL_TAKEN);
        }
        if form.password1 != form.password2 {
            push_error(&mut errors, "password2", "The two password fields didn't match.");
        } else {
            for violation in check_password_policy(&form.password2) {
                push_error(&mut errors, "password2", violation.to_string());
            }
        }
        if !errors.is_empty() {
            return Err(ServiceError::InvalidForm(errors));
        }

        let password_hash =
            hash_password(&form.password1).map_err(|e| ServiceError::HashError(e.to_string()))?;

        let txn = self.db.begin().await?;
        let account = match UserRepository::new(&txn)
            .insert_inactive(&username, &email, password_hash)
            .await
            .map_err(ServiceError::from)
        {
            Err(ServiceError::Conflict(_)) => {
                txn.rollback().await?;
                warn!("Signup lost a race for its username or email");
                return Err(duplicate_account_error(
                    &*self.db,
                    Some(&username),
                    &email,
                    SIGNUP_EMAIL_TAKEN,
                    None,
                )
                .await?);
            }
            inserted => inserted?,
        };
        let link = self.activation_link(&account, Utc::now())?;
        let message = activation_email(&self.mail_from, &account.email, &account.username, &link);

        if let Err(e) = self.mailer.send(message).await {
            error!("Error sending email: {}", e);
            txn.rollback().await?;
            return Err(ServiceError::field(
                "__all__",
                "We could not send the confirmation email. Please try again.",
            ));
        }
        txn.commit().await?;

        counter!("storefront_signups", 1);
        self.event_sender
            .send_or_log(Event::UserRegistered(account.id))
            .await;
        info!(user_id = %account.id, "Account created, activation email sent");

        Ok(SignupOutcome {
            user_id: account.id,
            username: account.username,
            email: account.email,
            is_active: account.is_active,
            message: "Please confirm your email address to complete the registration.".to_string(),
        })
    }

    #[instrument(skip(self, token))]
    pub async fn activate(&self, uid: &str, token: &str) -> Result<ActivationOutcome, ServiceError> {
        let invalid = || ServiceError::BadRequest("Activation link is invalid!".to_string());

        let users = UserRepository::new(&*self.db);
        let account = match decode_uid(uid) {
            Some(id) => users.find_by_id(id).await?,
            None => None,
        }
        .ok_or_else(invalid)?;

        if account.is_active {
            return Ok(ActivationOutcome {
                status: ActivationStatus::AlreadyActive,
                message: "Your account is already activated.".to_string(),
            });
        }

        if !self.tokens.check_token(&account, token, Utc::now()) {
            warn!(user_id = %account.id, "Rejected activation token");
            return Err(invalid());
        }

        let account = users.activate(account).await?;
        self.event_sender
            .send_or_log(Event::UserActivated(account.id))
            .await;

        Ok(ActivationOutcome {
            status: ActivationStatus::Activated,
            message: "Thank you for confirming your email. You can now login to your account."
                .to_string(),
        })
    }

    async fn load(&self, user: &AuthUser) -> Result<user::Model, ServiceError> {
        UserRepository::new(&*self.db)
            .find_by_id(user.user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user.user_id)))
    }

    fn avatar_url(&self, account: &user::Model) -> String {
        account
            .avatar
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.media.url_for(p))
            .unwrap_or_else(|| AVATAR_PLACEHOLDER.to_string())
    }

    async fn view(&self, account: user::Model) -> Result<ProfileView, ServiceError> {
        let last_buys = PurchaseRepository::new(&*self.db)
            .snapshots_for_user(account.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(ProfileView {
            avatar_url: self.avatar_url(&account),
            id: account.id,
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            is_superuser: account.is_superuser,
            date_joined: account.date_joined,
            last_buys,
        })
    }

    pub async fn profile(&self, user: &AuthUser) -> Result<ProfileView, ServiceError> {
        let account = self.load(user).await?;
        self.view(account).await
    }

    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn update_profile(
        &self,
        user: &AuthUser,
        form: ProfileUpdateForm,
    ) -> Result<ProfileView, ServiceError> {
        let account = self.load(user).await?;
        let email = form.email.trim().to_string();
        let mut errors = form.validate().err().map(|e| field_errors(&e)).unwrap_or_default();

        if !errors.contains_key("email")
            && UserRepository::new(&*self.db)
                .email_taken(&email, Some(account.id))
                .await?
        {
            push_error(&mut errors, "email", PROFILE_EMAIL_TAKEN);
        }

        let image = match form.avatar.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(payload) => match decode_image(payload) {
                Ok(image) if image.bytes.len() > self.max_avatar_bytes => {
                    push_error(&mut errors, "avatar", "Size of image must be 1024*1024 and 4MB.");
                    None
                }
                Ok(image) => Some(image),
                Err(_) => {
                    push_error(
                        &mut errors,
                        "avatar",
                        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                    );
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(ServiceError::InvalidForm(errors));
        }

        let avatar = match image {
            Some(image) => {
                let path = format!("{}/{}-{}.{}", AVATAR_DIR, account.id, Uuid::new_v4(), image.extension);
                self.media
                    .save(&path, &image.bytes)
                    .await
                    .map_err(|e| ServiceError::StorageError(e.to_string()))?;
                Some(path)
            }
            None if form.clear_avatar => None,
            None => account.avatar.clone(),
        };

        let first_name = title_case(form.first_name.as_deref().unwrap_or_default().trim());
        let last_name = title_case(form.last_name.as_deref().unwrap_or_default().trim());

        let account_id = account.id;
        let updated = match UserRepository::new(&*self.db)
            .update_profile(account, email.clone(), first_name, last_name, avatar)
            .await
            .map_err(ServiceError::from)
        {
            Err(ServiceError::Conflict(_)) => {
                return Err(duplicate_account_error(
                    &*self.db,
                    None,
                    &email,
                    PROFILE_EMAIL_TAKEN,
                    Some(account_id),
                )
                .await?);
            }
            updated => updated?,
        };

        self.event_sender
            .send_or_log(Event::ProfileUpdated(updated.id))
            .await;
        self.view(updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailer::MockMailer;
    use crate::services::media::LocalMediaStore;
    use test_case::test_case;
    use tokio::sync::mpsc;

    #[test_case("john" => "John")]
    #[test_case("mary-jane o'neil" => "Mary-Jane O'Neil")]
    #[test_case("ÉLODIE" => "Élodie")]
    #[test_case("x2y" => "X2Y"; "digits break words")]
    #[test_case("" => "")]
    fn titles(input: &str) -> String {
        title_case(input)
    }

    #[test]
    fn username_pattern() {
        assert!(USERNAME_RE.is_match("olena.k+shop@home-1_x"));
        assert!(!USERNAME_RE.is_match("has space"));
        assert!(!USERNAME_RE.is_match("semi;colon"));
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "k3Jq9vX2mP8rT5wY1zB4nC7dF0gH6jL9qS2uV5xA8eD1iK4oN7rU0tW3yZ6bE9hM".into(),
            3600,
            86_400,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        cfg.public_base_url = "https://shop.example.com/".into();
        cfg
    }

    fn service(db: sea_orm::DatabaseConnection, mailer: MockMailer) -> AccountService {
        let (tx, _rx) = mpsc::channel(8);
        AccountService::new(
            Arc::new(db),
            Arc::new(EventSender::new(tx)),
            Arc::new(mailer),
            Arc::new(LocalMediaStore::new("media", "/media")),
            &config(),
        )
    }

    #[tokio::test]
    async fn activation_link_uses_public_base_url() {
        let db = migrated_db().await;
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let svc = service(db, mailer);
        let account = user::Model {
            id: Uuid::new_v4(),
            username: "olena".into(),
            email: "olena@example.com".into(),
            password_hash: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            is_active: false,
            is_superuser: false,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        };

        let link = svc.activation_link(&account, Utc::now()).unwrap();
        let prefix = format!("https://shop.example.com/accounts/activate/{}/", encode_uid(account.id));
        assert!(link.starts_with(&prefix), "{link}");
        assert!(link.ends_with('/'));
    }

    async fn migrated_db() -> sea_orm::DatabaseConnection {
        let pool = crate::db::establish_connection_from_app_config(&config())
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn lost_signup_race_reports_taken_fields() {
        let db = migrated_db().await;
        UserRepository::new(&db)
            .insert_inactive("olena", "olena@example.com", "hash".into())
            .await
            .unwrap();

        let err = duplicate_account_error(
            &db,
            Some("olena"),
            "olena@example.com",
            SIGNUP_EMAIL_TAKEN,
            None,
        )
        .await
        .unwrap();
        let ServiceError::InvalidForm(fields) = err else {
            panic!("expected a form error, got {err:?}");
        };
        assert_eq!(fields["username"], vec![USERNAME_TAKEN.to_string()]);
        assert_eq!(fields["email"], vec![SIGNUP_EMAIL_TAKEN.to_string()]);
    }

    #[tokio::test]
    async fn lost_race_without_visible_duplicate_is_a_conflict() {
        let db = migrated_db().await;
        let owner = UserRepository::new(&db)
            .insert_inactive("olena", "olena@example.com", "hash".into())
            .await
            .unwrap();

        let err = duplicate_account_error(
            &db,
            None,
            "olena@example.com",
            PROFILE_EMAIL_TAKEN,
            Some(owner.id),
        )
        .await
        .unwrap();
        assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn duplicate_email_insert_maps_to_conflict() {
        let db = migrated_db().await;
        let users = UserRepository::new(&db);
        users
            .insert_inactive("olena", "olena@example.com", "hash".into())
            .await
            .unwrap();

        let err = users
            .insert_inactive("olena2", "olena@example.com", "hash".into())
            .await
            .map_err(ServiceError::from)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    }
}
