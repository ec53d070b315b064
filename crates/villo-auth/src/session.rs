//! The live token pair and its refresh rule.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::codec::TokenCodec;
use crate::discovery::ClientConfig;
use crate::error::Result;
use crate::negotiator::{TokenNegotiator, TokenPair};

/// Scheme tag placed before the access token in the `Authorization` header.
pub const AUTH_SCHEME: &str = "Taknv1";

/// Width of the staleness window. Tokens live for about two hours.
pub const DEFAULT_REFRESH_WINDOW_MINS: i64 = 30;

/// How the staleness test compares expiry to the current time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Refresh once expiry is within the window: `now + window >= expires_at`.
    #[default]
    Proactive,
    /// Refresh only once the token has been expired for longer than the
    /// window: `expires_at < now - window`.
    Lagging,
}

impl RefreshPolicy {
    /// A window too wide for the calendar saturates: Proactive then
    /// always refreshes and Lagging never does.
    pub fn is_stale(self, expires_at: DateTime<Utc>, now: DateTime<Utc>, window: TimeDelta) -> bool {
        match self {
            RefreshPolicy::Proactive => now
                .checked_add_signed(window)
                .is_none_or(|deadline| deadline >= expires_at),
            RefreshPolicy::Lagging => now
                .checked_sub_signed(window)
                .is_some_and(|cutoff| expires_at < cutoff),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefreshPolicy::Proactive => "proactive",
            RefreshPolicy::Lagging => "lagging",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proactive" => Ok(RefreshPolicy::Proactive),
            "lagging" => Ok(RefreshPolicy::Lagging),
            other => Err(format!(
                "unknown refresh policy '{}' (expected 'proactive' or 'lagging')",
                other
            )),
        }
    }
}

/// Access/refresh token pair with derived expiry.
///
/// Expiry is decoded from the access token on demand through the shared
/// codec, so an undecodable token only fails when a header is requested.
/// Only [`Session::refresh`] mutates it: the access token is replaced
/// while the refresh token and auth host carry over.
#[derive(Clone)]
pub struct Session {
    auth_host: String,
    access_token: String,
    refresh_token: String,
    codec: Arc<TokenCodec>,
    policy: RefreshPolicy,
    window: TimeDelta,
}

impl Session {
    /// Build a session from an issued token pair.
    pub fn new(auth_host: impl Into<String>, pair: TokenPair, codec: Arc<TokenCodec>) -> Self {
        Self {
            auth_host: auth_host.into(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            codec,
            policy: RefreshPolicy::default(),
            window: TimeDelta::minutes(DEFAULT_REFRESH_WINDOW_MINS),
        }
    }

    /// Perform the initial issuance and build the session.
    pub async fn establish(
        negotiator: &dyn TokenNegotiator,
        client: &ClientConfig,
        codec: Arc<TokenCodec>,
    ) -> Result<Self> {
        let pair = negotiator.issue(client).await?;
        let session = Self::new(client.auth_host.clone(), pair, codec);
        tracing::info!(auth_host = %session.auth_host, "Session established");
        Ok(session)
    }

    /// Set the staleness rule and window.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy, window: TimeDelta) -> Self {
        self.policy = policy;
        self.window = window;
        self
    }

    pub fn auth_host(&self) -> &str {
        &self.auth_host
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Expiry of the current access token.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        self.codec.expiry_of(&self.access_token)
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Whether the staleness test trips at `now`. Fails with
    /// `MalformedToken` if the access token's expiry cannot be decoded.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.policy.is_stale(self.expires_at()?, now, self.window))
    }

    /// Copy of this session carrying a new access token. The token must
    /// decode.
    pub fn refreshed(&self, access_token: String) -> Result<Self> {
        self.codec.expiry_of(&access_token)?;
        Ok(Self {
            access_token,
            ..self.clone()
        })
    }

    /// Exchange the refresh token for a new access token, in place.
    ///
    /// On error the session is left untouched.
    pub async fn refresh(&mut self, negotiator: &dyn TokenNegotiator) -> Result<()> {
        let access_token = negotiator
            .refresh(&self.auth_host, &self.refresh_token)
            .await?;
        *self = self.refreshed(access_token)?;
        tracing::info!(expires_at = %self.expires_at()?, "Session refreshed");
        Ok(())
    }

    /// `Authorization` header value, refreshing first if the token is stale.
    pub async fn authorization_header_value(
        &mut self,
        negotiator: &dyn TokenNegotiator,
    ) -> Result<String> {
        self.authorization_header_value_at(negotiator, Utc::now())
            .await
    }

    /// Same as [`Session::authorization_header_value`] with an explicit
    /// clock. Refreshes at most once, however stale the token is.
    pub async fn authorization_header_value_at(
        &mut self,
        negotiator: &dyn TokenNegotiator,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if self.is_stale_at(now)? {
            tracing::info!(
                expires_at = %self.expires_at()?,
                policy = %self.policy,
                "Access token stale, refreshing"
            );
            self.refresh(negotiator).await?;
            if self.is_stale_at(now)? {
                tracing::warn!(
                    expires_at = %self.expires_at()?,
                    "Refreshed access token is already stale"
                );
            }
        }
        Ok(format!("{} {}", AUTH_SCHEME, self.access_token))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auth_host", &self.auth_host)
            .field("policy", &self.policy)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::test_support::{mint_token, token_expiring_in};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Hands out pre-minted access tokens and counts refresh calls.
    #[derive(Debug, Default)]
    struct ScriptedNegotiator {
        issued: Option<TokenPair>,
        refreshed: Mutex<Vec<String>>,
        next_access: Mutex<Vec<String>>,
    }

    impl ScriptedNegotiator {
        fn with_refreshes(tokens: Vec<String>) -> Self {
            Self {
                next_access: Mutex::new(tokens),
                ..Self::default()
            }
        }

        fn issuing(pair: TokenPair) -> Self {
            Self {
                issued: Some(pair),
                ..Self::default()
            }
        }

        fn refresh_calls(&self) -> Vec<String> {
            self.refreshed.lock().clone()
        }
    }

    #[async_trait]
    impl TokenNegotiator for ScriptedNegotiator {
        async fn issue(&self, _client: &ClientConfig) -> Result<TokenPair> {
            Ok(self.issued.clone().unwrap_or_else(|| TokenPair {
                access_token: token_expiring_in(7200),
                refresh_token: "r".to_string(),
            }))
        }

        async fn refresh(&self, auth_host: &str, refresh_token: &str) -> Result<String> {
            self.refreshed
                .lock()
                .push(format!("{auth_host}|{refresh_token}"));
            self.next_access
                .lock()
                .pop()
                .ok_or_else(|| AuthError::TokenExchange("no scripted token left".into()))
        }
    }

    fn session(access_token: String) -> Session {
        let pair = TokenPair {
            access_token,
            refresh_token: "refresh-1".to_string(),
        };
        Session::new("https://auth.test", pair, Arc::new(TokenCodec::new()))
    }

    fn client_config() -> ClientConfig {
        ClientConfig {
            auth_host: "https://auth.test".into(),
            env: "prd".into(),
            client_code: "web".into(),
            client_key: "k".into(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_new_session_from_issuance() {
        let token = mint_token(&json!({ "exp": 1700000000 }));
        let s = session(token.clone());
        assert_eq!(s.access_token(), token);
        assert_eq!(s.refresh_token(), "refresh-1");
        assert_eq!(s.expires_at().unwrap(), at(1_700_000_000));
    }

    #[tokio::test]
    async fn test_issued_opaque_token_kept_until_header_requested() {
        let negotiator = ScriptedNegotiator::issuing(TokenPair {
            access_token: "a.b.c".to_string(),
            refresh_token: "r".to_string(),
        });

        let mut s = Session::establish(&negotiator, &client_config(), Arc::new(TokenCodec::new()))
            .await
            .unwrap();
        assert_eq!(s.access_token(), "a.b.c");
        assert_eq!(s.refresh_token(), "r");
        assert_eq!(s.auth_host(), "https://auth.test");

        let err = s.authorization_header_value(&negotiator).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
        assert!(negotiator.refresh_calls().is_empty());
    }

    #[test]
    fn test_proactive_policy() {
        let exp = at(10_000);
        let window = TimeDelta::minutes(30);
        let p = RefreshPolicy::Proactive;
        assert!(!p.is_stale(exp, at(10_000 - 1801), window));
        assert!(p.is_stale(exp, at(10_000 - 1800), window));
        assert!(p.is_stale(exp, at(10_000 + 5), window));
    }

    #[test]
    fn test_lagging_policy() {
        let exp = at(10_000);
        let window = TimeDelta::minutes(30);
        let p = RefreshPolicy::Lagging;
        assert!(!p.is_stale(exp, at(10_000 - 1800), window));
        assert!(!p.is_stale(exp, at(10_000 + 1800), window));
        assert!(p.is_stale(exp, at(10_000 + 1801), window));
    }

    #[test]
    fn test_overflowing_window_saturates() {
        let exp = at(10_000);
        let window = TimeDelta::MAX;
        assert!(RefreshPolicy::Proactive.is_stale(exp, at(0), window));
        assert!(!RefreshPolicy::Lagging.is_stale(exp, at(20_000), window));

        let s = session(token_expiring_in(7200))
            .with_refresh_policy(RefreshPolicy::Proactive, TimeDelta::minutes(200_000_000_000));
        assert!(s.is_stale_at(Utc::now()).unwrap());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Proactive".parse::<RefreshPolicy>(), Ok(RefreshPolicy::Proactive));
        assert_eq!(" lagging ".parse::<RefreshPolicy>(), Ok(RefreshPolicy::Lagging));
        assert!("eager".parse::<RefreshPolicy>().is_err());
        assert_eq!(RefreshPolicy::Lagging.to_string(), "lagging");
    }

    #[tokio::test]
    async fn test_fresh_token_not_refreshed() {
        let token = token_expiring_in(7200);
        let mut s = session(token.clone());
        let negotiator = ScriptedNegotiator::default();

        let header = s.authorization_header_value(&negotiator).await.unwrap();
        assert_eq!(header, format!("Taknv1 {token}"));
        assert!(negotiator.refresh_calls().is_empty());
    }

    #[tokio::test]
    async fn test_stale_token_refreshed_and_header_updated() {
        let new_token = token_expiring_in(7200);
        let mut s = session(token_expiring_in(600));
        let negotiator = ScriptedNegotiator::with_refreshes(vec![new_token.clone()]);

        let header = s.authorization_header_value(&negotiator).await.unwrap();
        assert_eq!(header, format!("Taknv1 {new_token}"));
        assert_eq!(negotiator.refresh_calls(), vec!["https://auth.test|refresh-1"]);
    }

    #[tokio::test]
    async fn test_refresh_preserves_host_and_refresh_token() {
        let new_token = mint_token(&json!({ "exp": 1700007200 }));
        let mut s = session(mint_token(&json!({ "exp": 1700000000 })));
        let negotiator = ScriptedNegotiator::with_refreshes(vec![new_token.clone()]);

        s.refresh(&negotiator).await.unwrap();
        assert_eq!(s.auth_host(), "https://auth.test");
        assert_eq!(s.refresh_token(), "refresh-1");
        assert_eq!(s.access_token(), new_token);
        assert_eq!(s.expires_at().unwrap(), at(1_700_007_200));
    }

    #[tokio::test]
    async fn test_at_most_one_refresh_per_call() {
        // the replacement is itself long expired
        let still_stale = mint_token(&json!({ "exp": 1000 }));
        let mut s = session(mint_token(&json!({ "exp": 500 })));
        let negotiator =
            ScriptedNegotiator::with_refreshes(vec![token_expiring_in(7200), still_stale.clone()]);

        let header = s.authorization_header_value(&negotiator).await.unwrap();
        assert_eq!(header, format!("Taknv1 {still_stale}"));
        assert_eq!(negotiator.refresh_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_lagging_policy_keeps_recently_expired_token() {
        let token = token_expiring_in(-600);
        let mut s = session(token.clone())
            .with_refresh_policy(RefreshPolicy::Lagging, TimeDelta::minutes(30));
        let negotiator = ScriptedNegotiator::default();

        let header = s.authorization_header_value(&negotiator).await.unwrap();
        assert_eq!(header, format!("Taknv1 {token}"));
        assert!(negotiator.refresh_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_session_untouched() {
        let token = token_expiring_in(60);
        let mut s = session(token.clone());
        let negotiator = ScriptedNegotiator::with_refreshes(vec!["not.a-token.x".to_string()]);

        let err = s.authorization_header_value(&negotiator).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
        assert_eq!(s.access_token(), token);
    }

    #[tokio::test]
    async fn test_establish_uses_issued_pair() {
        let negotiator = ScriptedNegotiator::default();

        let s = Session::establish(&negotiator, &client_config(), Arc::new(TokenCodec::new()))
            .await
            .unwrap();
        assert_eq!(s.auth_host(), "https://auth.test");
        assert_eq!(s.refresh_token(), "r");
        assert!(!s.is_stale_at(Utc::now()).unwrap());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let s = session(token_expiring_in(7200));
        let debug = format!("{s:?}");
        assert!(!debug.contains(s.access_token()));
        assert!(!debug.contains("refresh-1"));
    }
}
