//! End-to-end tests of the auth flows over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;

use warden_auth::{
    Argon2Hasher, AuthConfig, AuthError, AuthService, AuthStores, Denial, Entity, LoginInput,
    Policy, RefreshToken, RefreshTokenStore, Role, Scope, SignupInput, StoreError, TokenError,
    User, UserStore,
};
use warden_core::{Slug, UserId};
use warden_infra::{InMemoryAuthStore, ensure_default_tenant};

const SECRET: &str = "integration-test-secret-0123456789abcdef";

async fn setup_with(config: AuthConfig) -> (AuthService, Arc<InMemoryAuthStore>) {
    let store = Arc::new(InMemoryAuthStore::new());
    let slug = Slug::parse(config.default_tenant_slug.as_str()).unwrap();
    ensure_default_tenant(store.as_ref(), &slug, "Default").await.unwrap();

    let service = AuthService::new(
        AuthStores::shared(store.clone()),
        Arc::new(Argon2Hasher::fast()),
        Arc::new(config),
    );
    (service, store)
}

async fn setup() -> (AuthService, Arc<InMemoryAuthStore>) {
    setup_with(AuthConfig::with_secret(SECRET)).await
}

fn signup_input(email: &str) -> SignupInput {
    SignupInput {
        email: email.into(),
        password: "correct horse".into(),
        name: "Alice".into(),
    }
}

fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn signup_issues_user_role_and_derived_scopes() {
    let (service, store) = setup().await;

    let tokens = service.signup(signup_input("alice@example.com")).await.unwrap();
    assert_eq!(tokens.expires_in_ms, 86_400_000);
    assert_eq!(tokens.refresh_token.len(), 43);

    let claims = service.validate_access_token(&tokens.access_token).unwrap();
    assert_eq!(claims.sub, "alice@example.com");
    assert_eq!(claims.roles, vec![Role::USER]);
    assert_eq!(
        claims.scopes,
        Some(vec![Scope::TICKETS_READ_OWN, Scope::TICKETS_WRITE_OWN])
    );

    let user = store.find_user_by_email("alice@example.com").await.unwrap().unwrap();
    assert_eq!(claims.tenant_id, Some(user.tenant_id));
    assert_ne!(user.password_hash, "correct horse");
    assert_eq!(store.refresh_token_count_for(user.id), 1);
}

#[tokio::test]
async fn signup_with_taken_email_is_a_conflict() {
    let (service, _) = setup().await;
    service.signup(signup_input("bob@example.com")).await.unwrap();

    let err = service.signup(signup_input("bob@example.com")).await.unwrap_err();
    assert_eq!(err, AuthError::Conflict);
}

#[tokio::test]
async fn signup_rejects_invalid_input_with_field_errors() {
    let (service, _) = setup().await;

    let err = service
        .signup(SignupInput {
            email: "not-an-email".into(),
            password: "short".into(),
            name: "".into(),
        })
        .await
        .unwrap_err();

    let AuthError::Validation(fields) = err else {
        panic!("expected validation error, got {err:?}");
    };
    let names: Vec<_> = fields.iter().map(|f| f.field).collect();
    assert!(names.contains(&"email"));
    assert!(names.contains(&"password"));
    assert!(names.contains(&"name"));
}

#[tokio::test]
async fn signup_without_default_tenant_is_not_found() {
    let store = Arc::new(InMemoryAuthStore::new());
    let service = AuthService::new(
        AuthStores::shared(store),
        Arc::new(Argon2Hasher::fast()),
        Arc::new(AuthConfig::with_secret(SECRET)),
    );

    let err = service.signup(signup_input("carol@example.com")).await.unwrap_err();
    assert_eq!(err, AuthError::NotFound(Entity::Tenant));
}

#[tokio::test]
async fn login_supersedes_the_previous_refresh_token() {
    let (service, store) = setup().await;
    let first = service.signup(signup_input("dave@example.com")).await.unwrap();

    let second = service
        .login(login_input("dave@example.com", "correct horse"))
        .await
        .unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);

    let err = service.refresh_access_token(&first.refresh_token).await.unwrap_err();
    assert_eq!(err, AuthError::NotFound(Entity::RefreshToken));

    service.refresh_access_token(&second.refresh_token).await.unwrap();

    let user = store.find_user_by_email("dave@example.com").await.unwrap().unwrap();
    assert_eq!(store.refresh_token_count_for(user.id), 1);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (service, store) = setup().await;
    service.signup(signup_input("erin@example.com")).await.unwrap();

    let wrong_password = service
        .login(login_input("erin@example.com", "wrong password"))
        .await
        .unwrap_err();
    let unknown_email = service
        .login(login_input("nobody@example.com", "correct horse"))
        .await
        .unwrap_err();
    assert_eq!(wrong_password, AuthError::Unauthorized);
    assert_eq!(unknown_email, AuthError::Unauthorized);

    let mut user = store.find_user_by_email("erin@example.com").await.unwrap().unwrap();
    user.enabled = false;
    store.save_user(user).await.unwrap();

    let disabled = service
        .login(login_input("erin@example.com", "correct horse"))
        .await
        .unwrap_err();
    assert_eq!(disabled, AuthError::Unauthorized);
}

#[tokio::test]
async fn refresh_keeps_the_token_and_rederives_claims() {
    let (service, store) = setup().await;
    let tokens = service.signup(signup_input("frank@example.com")).await.unwrap();

    let mut user = store.find_user_by_email("frank@example.com").await.unwrap().unwrap();
    user.roles.insert(Role::AGENT);
    store.save_user(user).await.unwrap();

    let refreshed = service.refresh_access_token(&tokens.refresh_token).await.unwrap();
    assert_eq!(refreshed.refresh_token, tokens.refresh_token);

    let claims = service.validate_access_token(&refreshed.access_token).unwrap();
    assert!(claims.has_role(&Role::AGENT));
    let scopes = claims.scopes.unwrap();
    assert!(scopes.contains(&Scope::TICKETS_READ_ANY));
    assert!(scopes.contains(&Scope::TICKETS_READ_OWN));
}

#[tokio::test]
async fn expired_refresh_token_is_deleted_on_first_use() {
    let (service, store) = setup().await;
    service.signup(signup_input("gina@example.com")).await.unwrap();
    let user = store.find_user_by_email("gina@example.com").await.unwrap().unwrap();

    let stale = service
        .refresh_tokens()
        .issue_at(&user, Utc::now() - Duration::days(8))
        .await
        .unwrap();

    let err = service.refresh_access_token(&stale.token).await.unwrap_err();
    assert_eq!(err, AuthError::Expired);
    assert!(store.find_refresh_token(&stale.token).await.unwrap().is_none());

    let err = service.refresh_access_token(&stale.token).await.unwrap_err();
    assert_eq!(err, AuthError::NotFound(Entity::RefreshToken));
}

#[tokio::test]
async fn unknown_refresh_token_is_not_found() {
    let (service, _) = setup().await;
    let err = service.refresh_access_token("no-such-token").await.unwrap_err();
    assert_eq!(err, AuthError::NotFound(Entity::RefreshToken));
}

#[tokio::test]
async fn refresh_for_disabled_user_is_unauthorized() {
    let (service, store) = setup().await;
    let tokens = service.signup(signup_input("hank@example.com")).await.unwrap();

    let mut user = store.find_user_by_email("hank@example.com").await.unwrap().unwrap();
    user.enabled = false;
    store.save_user(user).await.unwrap();

    let err = service.refresh_access_token(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, AuthError::Unauthorized);
}

#[tokio::test]
async fn current_identity_reports_deleted_user() {
    let (service, store) = setup().await;
    let tokens = service.signup(signup_input("ivy@example.com")).await.unwrap();
    let claims = service.validate_access_token(&tokens.access_token).unwrap();

    let profile = service.current_identity(&claims).await.unwrap();
    assert_eq!(profile.email, "ivy@example.com");
    assert_eq!(profile.name, "Alice");
    assert!(profile.enabled);

    assert!(store.remove_user(profile.id));
    let err = service.current_identity(&claims).await.unwrap_err();
    assert_eq!(err, AuthError::NotFound(Entity::User));
}

#[tokio::test]
async fn legacy_token_without_scopes_is_refused_by_scope_policy() {
    let (service, _) = setup().await;
    let now = Utc::now().timestamp();
    let legacy = jsonwebtoken::encode(
        &Header::default(),
        &json!({ "sub": "old@example.com", "iat": now, "exp": now + 600 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let claims = service.validate_access_token(&legacy).unwrap();
    assert_eq!(claims.scopes, None);
    assert_eq!(claims.tenant_id, None);

    let policy = Policy::scope([Scope::TICKETS_READ_OWN], false);
    assert_eq!(policy.evaluate(Some(&claims)), Err(Denial::NoScopes));
}

#[tokio::test]
async fn tampered_access_token_is_rejected() {
    let (service, _) = setup().await;
    let tokens = service.signup(signup_input("jack@example.com")).await.unwrap();

    let mut forged = tokens.access_token.clone();
    let last = forged.pop().unwrap();
    forged.push(if last == 'A' { 'B' } else { 'A' });

    let err = service.validate_access_token(&forged).unwrap_err();
    assert_eq!(err, AuthError::InvalidToken(TokenError::BadSignature));
}

/// User store that never answers `exists_user_with_email` in time.
struct StalledUsers(Arc<InMemoryAuthStore>);

#[async_trait::async_trait]
impl UserStore for StalledUsers {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.0.find_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.0.find_user_by_id(id).await
    }

    async fn exists_user_with_email(&self, email: &str) -> Result<bool, StoreError> {
        tokio::time::sleep(StdDuration::from_secs(5)).await;
        self.0.exists_user_with_email(email).await
    }

    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        self.0.save_user(user).await
    }

    async fn create_user_with_refresh_token(
        &self,
        user: User,
        token: RefreshToken,
    ) -> Result<(User, RefreshToken), StoreError> {
        self.0.create_user_with_refresh_token(user, token).await
    }
}

#[tokio::test]
async fn slow_store_surfaces_as_unavailable() {
    let store = Arc::new(InMemoryAuthStore::new());
    let slug = Slug::parse("default").unwrap();
    ensure_default_tenant(store.as_ref(), &slug, "Default").await.unwrap();

    let stores = AuthStores {
        users: Arc::new(StalledUsers(store.clone())),
        tenants: store.clone(),
        refresh_tokens: store,
    };
    let config = AuthConfig {
        store_timeout: StdDuration::from_millis(50),
        ..AuthConfig::with_secret(SECRET)
    };
    let service = AuthService::new(stores, Arc::new(Argon2Hasher::fast()), Arc::new(config));

    let err = service.signup(signup_input("kim@example.com")).await.unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)), "got {err:?}");
}

/// Fails the first signup write, then delegates.
struct FailFirstSignup {
    inner: Arc<InMemoryAuthStore>,
    failed: AtomicBool,
}

#[async_trait::async_trait]
impl UserStore for FailFirstSignup {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_id(id).await
    }

    async fn exists_user_with_email(&self, email: &str) -> Result<bool, StoreError> {
        self.inner.exists_user_with_email(email).await
    }

    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        self.inner.save_user(user).await
    }

    async fn create_user_with_refresh_token(
        &self,
        user: User,
        token: RefreshToken,
    ) -> Result<(User, RefreshToken), StoreError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("db down".into()));
        }
        self.inner.create_user_with_refresh_token(user, token).await
    }
}

#[tokio::test]
async fn failed_signup_leaves_no_account_and_can_be_retried() {
    let store = Arc::new(InMemoryAuthStore::new());
    let slug = Slug::parse("default").unwrap();
    ensure_default_tenant(store.as_ref(), &slug, "Default").await.unwrap();

    let stores = AuthStores {
        users: Arc::new(FailFirstSignup {
            inner: store.clone(),
            failed: AtomicBool::new(false),
        }),
        tenants: store.clone(),
        refresh_tokens: store.clone(),
    };
    let service = AuthService::new(
        stores,
        Arc::new(Argon2Hasher::fast()),
        Arc::new(AuthConfig::with_secret(SECRET)),
    );

    let err = service.signup(signup_input("lena@example.com")).await.unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)), "got {err:?}");
    assert!(!store.exists_user_with_email("lena@example.com").await.unwrap());

    let tokens = service.signup(signup_input("lena@example.com")).await.unwrap();
    let user = store.find_user_by_email("lena@example.com").await.unwrap().unwrap();
    assert_eq!(store.refresh_token_count_for(user.id), 1);
    assert!(service.refresh_access_token(&tokens.refresh_token).await.is_ok());
}
