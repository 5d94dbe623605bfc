//! Integration tests for the session subsystem
//!
//! Wires the notifier, lifecycle manager, and mock collaborators together
//! and exercises the externally observable properties end to end: startup
//! restore, refresh de-duplication and rotation, bounded retry, and
//! logout preemption of in-flight work.

use std::sync::{Arc, Once};

use chrono::{Duration as ChronoDuration, Utc};
use intra_session::testing::{
    MemoryCredentialStore, MockInteractor, MockProfileClient, MockTokenExchanger,
};
use intra_session::{
    AuthError, Credential, CredentialStore, InteractionOutcome, OAuthConfig, SessionState,
    SessionStateNotifier, TokenLifecycleManager, TokenResponse, DEFAULT_SKEW_SECONDS,
};
use tokio::time::Duration;

struct Harness {
    store: Arc<MemoryCredentialStore>,
    exchanger: Arc<MockTokenExchanger>,
    profile: Arc<MockProfileClient>,
    interactor: Arc<MockInteractor>,
    manager: Arc<TokenLifecycleManager>,
    notifier: Arc<SessionStateNotifier>,
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn harness() -> Harness {
    init_tracing();
    let store = Arc::new(MemoryCredentialStore::new());
    let exchanger = Arc::new(MockTokenExchanger::new());
    let profile = Arc::new(MockProfileClient::new());
    let interactor =
        Arc::new(MockInteractor::new(InteractionOutcome::Authorized { code: "code-1".into() }));
    let manager = Arc::new(TokenLifecycleManager::new(
        store.clone(),
        exchanger.clone(),
        profile.clone(),
        DEFAULT_SKEW_SECONDS,
    ));
    let config = OAuthConfig::new(
        "https://api.intra.42.fr".to_string(),
        "uid".to_string(),
        "secret".to_string(),
        "myapp://callback".to_string(),
        vec!["public".to_string()],
    );
    let notifier =
        Arc::new(SessionStateNotifier::new(manager.clone(), interactor.clone(), config));
    Harness { store, exchanger, profile, interactor, manager, notifier }
}

fn token_response(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in,
        token_type: Some("bearer".to_string()),
        scope: None,
    }
}

fn expiring_credential(access: &str, refresh: Option<&str>, life_seconds: i64) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(Utc::now() + ChronoDuration::seconds(life_seconds)),
    }
}

/// Full login-to-logout journey: interactive login, an API call through the
/// token wrapper, a profile reload, then logout.
#[tokio::test]
async fn full_session_journey() {
    let h = harness();
    h.exchanger.set_exchange_response(Ok(token_response("AT", Some("RT"), Some(7200))));

    let state = h.notifier.login().await.unwrap();
    assert!(matches!(state, SessionState::Authenticated(_)));
    assert_eq!(h.interactor.authorize_calls(), 1);
    assert_eq!(h.exchanger.exchange_calls(), 1);

    // An API call through the wrapper uses the stored token directly.
    let token = h
        .manager
        .call_with_token(|token| async move { Ok::<_, AuthError>(token) })
        .await
        .unwrap();
    assert_eq!(token, "AT");
    assert_eq!(h.exchanger.refresh_calls(), 0);

    let user = h.notifier.reload_profile().await.unwrap();
    assert_eq!(user.login, MockProfileClient::default_profile().login);

    h.notifier.logout().await;
    assert_eq!(h.notifier.state(), SessionState::Unauthenticated);
    assert!(h.store.get().await.unwrap().is_none());
}

/// A persisted, still-valid credential restores the session on startup
/// without any token endpoint traffic.
#[tokio::test]
async fn startup_restores_valid_credential() {
    let h = harness();
    h.store.seed(expiring_credential("AT", Some("RT"), 7200)).await;

    let state = h.notifier.initialize().await;
    assert!(matches!(state, SessionState::Authenticated(_)));
    assert_eq!(h.exchanger.refresh_calls(), 0);
    assert_eq!(h.exchanger.exchange_calls(), 0);
}

/// A persisted credential inside the expiry skew is refreshed before the
/// session restores.
#[tokio::test]
async fn startup_refreshes_stale_credential() {
    let h = harness();
    h.store.seed(expiring_credential("OLD", Some("RT"), 30)).await;
    h.exchanger.set_refresh_response(Ok(token_response("NEW", Some("RT2"), Some(7200))));

    let state = h.notifier.initialize().await;
    assert!(matches!(state, SessionState::Authenticated(_)));
    assert_eq!(h.exchanger.refresh_calls(), 1);
    assert_eq!(h.profile.last_token(), Some("NEW".to_string()));
}

/// A revoked refresh token at startup clears everything and lands in
/// `Unauthenticated` rather than a stale, ambiguous state.
#[tokio::test]
async fn startup_with_revoked_refresh_clears_credential() {
    let h = harness();
    h.store.seed(expiring_credential("OLD", Some("RT"), 0)).await;
    h.exchanger.set_refresh_response(Err(AuthError::RefreshRejected("revoked".to_string())));

    let state = h.notifier.initialize().await;
    assert_eq!(state, SessionState::Unauthenticated);
    assert_eq!(h.notifier.state(), SessionState::Unauthenticated);
    assert!(h.store.get().await.unwrap().is_none());
}

/// Ten concurrent callers hitting an expired token produce exactly one
/// refresh network call; the rest share its outcome.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_callers_share_one_refresh() {
    let h = harness();
    h.store.seed(expiring_credential("OLD", Some("RT"), 0)).await;
    h.exchanger.set_refresh_response(Ok(token_response("NEW", Some("RT2"), Some(7200))));
    h.exchanger.set_refresh_delay(Duration::from_millis(50));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&h.manager);
        handles.push(tokio::spawn(async move { manager.ensure_valid().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "NEW");
    }

    assert_eq!(h.exchanger.refresh_calls(), 1);
}

/// When the provider omits a rotated refresh token, the previous one is
/// carried forward rather than dropped.
#[tokio::test]
async fn refresh_without_rotation_keeps_previous_token() {
    let h = harness();
    h.store.seed(expiring_credential("OLD", Some("RT-keep"), 0)).await;
    h.exchanger.set_refresh_response(Ok(token_response("NEW", None, Some(7200))));

    let token = h.manager.ensure_valid().await.unwrap();
    assert_eq!(token, "NEW");

    let stored = h.store.get().await.unwrap().unwrap();
    assert_eq!(stored.refresh_token, Some("RT-keep".to_string()));
}

/// The 401-triggered retry is bounded: two consecutive 401s produce exactly
/// one refresh and then surface `Unauthorized`.
#[tokio::test]
async fn reactive_retry_is_bounded() {
    let h = harness();
    h.store.seed(expiring_credential("AT", Some("RT"), 7200)).await;
    h.exchanger.set_refresh_response(Ok(token_response("NEW", None, Some(7200))));
    h.profile.push_response(Err(AuthError::Unauthorized));
    h.profile.push_response(Err(AuthError::Unauthorized));

    let result = h.manager.fetch_profile().await;
    assert_eq!(result, Err(AuthError::Unauthorized));
    assert_eq!(h.exchanger.refresh_calls(), 1);
    assert_eq!(h.profile.fetch_calls(), 2);
}

/// Logout during a slow login: the logged-out state wins even though the
/// login's exchange later succeeds.
#[tokio::test(flavor = "multi_thread")]
async fn logout_wins_over_slow_login() {
    let h = harness();
    h.exchanger.set_exchange_response(Ok(token_response("AT", Some("RT"), Some(7200))));
    h.interactor.set_delay(Duration::from_millis(100));

    let notifier = Arc::clone(&h.notifier);
    let login = tokio::spawn(async move { notifier.login().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.notifier.logout().await;

    let _ = login.await.unwrap();
    assert_eq!(h.notifier.state(), SessionState::Unauthenticated);
}

/// Subscribers observe the Authenticating and Authenticated transitions in
/// order, and never an internal value.
#[tokio::test]
async fn subscribers_observe_public_transitions() {
    let h = harness();
    h.exchanger.set_exchange_response(Ok(token_response("AT", Some("RT"), Some(7200))));
    let mut rx = h.notifier.subscribe();
    assert_eq!(*rx.borrow(), SessionState::Unauthenticated);

    let notifier = Arc::clone(&h.notifier);
    let login = tokio::spawn(async move { notifier.login().await });

    let mut observed = Vec::new();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        let done = matches!(state, SessionState::Authenticated(_));
        observed.push(state);
        if done {
            break;
        }
    }
    login.await.unwrap().unwrap();

    assert!(observed.iter().all(SessionState::is_public));
    assert!(matches!(observed.last(), Some(SessionState::Authenticated(_))));
}
