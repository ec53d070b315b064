//! Credential discovery across the site's script fragments.
//!
//! Fragments are tried from the last one referenced by the page back to the
//! first: the application configuration usually lives in the chunk loaded
//! last. The first fragment holding a complete `oAuth` object wins and also
//! supplies the `contract` and `stations` objects. Each attempt is logged
//! with its outcome so a layout change on the site can be diagnosed from
//! the logs alone.

use std::fmt;

use crate::bundle::BundleLocator;
use crate::error::{AuthError, Result};
use crate::extract::{ExtractionOutcome, ExtractionStrategy, ObjectFields, RegexObjectStrategy};

/// OAuth client credentials recovered from the bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub auth_host: String,
    pub env: String,
    pub client_code: String,
    pub client_key: String,
}

impl ClientConfig {
    /// Build from a complete `oAuth` object. Returns `None` if any of the
    /// four keys is absent or empty.
    pub fn from_fields(fields: &ObjectFields) -> Option<Self> {
        let get = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Some(Self {
            auth_host: get("authHost")?,
            env: get("env")?,
            client_code: get("clientCode")?,
            client_key: get("clientKey")?,
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("auth_host", &self.auth_host)
            .field("env", &self.env)
            .field("client_code", &self.client_code)
            .field("client_key", &redact(&self.client_key))
            .finish()
    }
}

/// Operator contract identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInfo {
    pub name: String,
}

impl ContractInfo {
    pub fn from_fields(fields: &ObjectFields) -> Option<Self> {
        let name = fields.get("name").filter(|v| !v.is_empty())?.clone();
        Some(Self { name })
    }
}

/// Station list endpoint and its query-string key.
#[derive(Clone, PartialEq, Eq)]
pub struct StationsEndpointInfo {
    pub url: String,
    pub api_key: String,
}

impl StationsEndpointInfo {
    pub fn from_fields(fields: &ObjectFields) -> Option<Self> {
        let get = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Some(Self {
            url: get("url")?,
            api_key: get("apiKey")?,
        })
    }
}

impl fmt::Debug for StationsEndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationsEndpointInfo")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Everything recovered from the bundle. Read-only once built.
#[derive(Debug, Clone)]
pub struct DiscoveredConfig {
    pub client: ClientConfig,
    pub contract: Option<ContractInfo>,
    pub stations: Option<StationsEndpointInfo>,
    /// Fragment the `oAuth` object was read from.
    pub fragment: String,
}

impl DiscoveredConfig {
    /// The contract, or `ConfigNotFound` if the bundle did not provide one.
    pub fn contract(&self) -> Result<&ContractInfo> {
        self.contract.as_ref().ok_or_else(|| {
            AuthError::ConfigNotFound(format!(
                "no complete 'contract' object found (oAuth fragment: {})",
                self.fragment
            ))
        })
    }

    /// The stations endpoint, or `ConfigNotFound` if the bundle did not
    /// provide one.
    pub fn stations(&self) -> Result<&StationsEndpointInfo> {
        self.stations.as_ref().ok_or_else(|| {
            AuthError::ConfigNotFound(format!(
                "no complete 'stations' object found (oAuth fragment: {})",
                self.fragment
            ))
        })
    }
}

/// Knobs for the fragment search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Look for `contract`/`stations` in the remaining fragments when the
    /// `oAuth` fragment lacks them. Off by default: the live site keeps all
    /// three objects in the same chunk.
    pub endpoint_fallback: bool,
}

/// The three strategies used during discovery.
#[derive(Debug)]
pub struct Extractors {
    pub oauth: Box<dyn ExtractionStrategy>,
    pub contract: Box<dyn ExtractionStrategy>,
    pub stations: Box<dyn ExtractionStrategy>,
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            oauth: Box::new(RegexObjectStrategy::oauth()),
            contract: Box::new(RegexObjectStrategy::contract()),
            stations: Box::new(RegexObjectStrategy::stations()),
        }
    }
}

/// Run discovery with the default regex strategies.
pub async fn discover(locator: &BundleLocator, options: DiscoveryOptions) -> Result<DiscoveredConfig> {
    discover_with(locator, &Extractors::default(), options).await
}

/// Run discovery with custom extraction strategies.
pub async fn discover_with(
    locator: &BundleLocator,
    extractors: &Extractors,
    options: DiscoveryOptions,
) -> Result<DiscoveredConfig> {
    let mut remaining = locator.fragment_paths().await?;
    let total = remaining.len();

    let mut found = None;
    while let Some(fragment) = remaining.pop() {
        let script = locator.fetch_fragment(&fragment).await?;
        let outcome = extractors.oauth.attempt(&script);
        log_attempt(&fragment, extractors.oauth.as_ref(), &outcome);

        let Some(client) = outcome
            .into_complete()
            .as_ref()
            .and_then(ClientConfig::from_fields)
        else {
            continue;
        };

        let contract = attempt_object(&fragment, &script, extractors.contract.as_ref())
            .and_then(|f| ContractInfo::from_fields(&f));
        let stations = attempt_object(&fragment, &script, extractors.stations.as_ref())
            .and_then(|f| StationsEndpointInfo::from_fields(&f));

        found = Some(DiscoveredConfig {
            client,
            contract,
            stations,
            fragment,
        });
        break;
    }

    let Some(mut config) = found else {
        return Err(AuthError::ConfigNotFound(format!(
            "no complete '{}' object in any of {} fragments; the site's front-end \
             changed and the extraction rules need updating",
            extractors.oauth.object_name(),
            total
        )));
    };

    if options.endpoint_fallback {
        fill_from_remaining(locator, extractors, &mut config, remaining).await?;
    }

    if config.contract.is_none() || config.stations.is_none() {
        tracing::warn!(
            fragment = %config.fragment,
            contract = config.contract.is_some(),
            stations = config.stations.is_some(),
            "Endpoint descriptors incomplete; calls that need them will fail"
        );
    }

    tracing::info!(
        fragment = %config.fragment,
        auth_host = %config.client.auth_host,
        env = %config.client.env,
        contract = config.contract.as_ref().map(|c| c.name.as_str()),
        "Discovered client configuration"
    );
    Ok(config)
}

/// Search not-yet-examined fragments, same reverse order, for whatever the
/// `oAuth` fragment lacked.
async fn fill_from_remaining(
    locator: &BundleLocator,
    extractors: &Extractors,
    config: &mut DiscoveredConfig,
    mut remaining: Vec<String>,
) -> Result<()> {
    while config.contract.is_none() || config.stations.is_none() {
        let Some(fragment) = remaining.pop() else {
            break;
        };
        tracing::debug!(fragment = %fragment, "Falling back to fragment for endpoint descriptors");
        let script = locator.fetch_fragment(&fragment).await?;

        if config.contract.is_none() {
            config.contract = attempt_object(&fragment, &script, extractors.contract.as_ref())
                .and_then(|f| ContractInfo::from_fields(&f));
        }
        if config.stations.is_none() {
            config.stations = attempt_object(&fragment, &script, extractors.stations.as_ref())
                .and_then(|f| StationsEndpointInfo::from_fields(&f));
        }
    }
    Ok(())
}

fn attempt_object(
    fragment: &str,
    script: &str,
    strategy: &dyn ExtractionStrategy,
) -> Option<ObjectFields> {
    let outcome = strategy.attempt(script);
    log_attempt(fragment, strategy, &outcome);
    outcome.into_complete()
}

fn log_attempt(fragment: &str, strategy: &dyn ExtractionStrategy, outcome: &ExtractionOutcome) {
    match outcome {
        ExtractionOutcome::Complete(fields) => tracing::info!(
            fragment,
            object = strategy.object_name(),
            outcome = outcome.label(),
            keys = ?fields.keys().collect::<Vec<_>>(),
            "Extraction attempt"
        ),
        ExtractionOutcome::Partial { missing, .. } => tracing::warn!(
            fragment,
            object = strategy.object_name(),
            outcome = outcome.label(),
            ?missing,
            "Extraction attempt"
        ),
        ExtractionOutcome::NotFound => tracing::info!(
            fragment,
            object = strategy.object_name(),
            outcome = outcome.label(),
            "Extraction attempt"
        ),
    }
}

/// Keep the first four characters of a secret for log correlation.
pub fn redact(secret: &str) -> String {
    let head: String = secret.chars().take(4).collect();
    if head.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{}****", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OAUTH: &str =
        r#",oAuth:{authHost:"https://auth.test",env:"prd",clientCode:"web",clientKey:"key-1"}"#;
    const OAUTH_PARTIAL: &str = r#",oAuth:{authHost:"https://auth.test",env:"prd",clientCode:"web"}"#;
    const CONTRACT: &str = r#",contract:{name:"bruxelles"}"#;
    const STATIONS: &str = r#",api:{stations:{url:"https://api.test/stations",apiKey:"sk-9"}}"#;

    /// Serve a landing page listing `chunks` in order, each with a body.
    /// `expected` is how many times each chunk must be downloaded.
    async fn site(chunks: &[(&str, String, u64)]) -> MockServer {
        let server = MockServer::start().await;
        let page: String = chunks
            .iter()
            .map(|(name, _, _)| format!(r#"<link rel="modulepreload" href="{}">"#, name))
            .collect();
        Mock::given(method("GET"))
            .and(path("/fr/mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        for (name, body, expected) in chunks {
            Mock::given(method("GET"))
                .and(path(format!("/{}", name)))
                .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
                .expect(*expected)
                .mount(&server)
                .await;
        }
        server
    }

    fn locator(server: &MockServer) -> BundleLocator {
        BundleLocator::new(reqwest::Client::new(), &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_last_fragment_tried_first() {
        let server = site(&[
            ("chunk-A.js", "var a=1;".to_string(), 0),
            ("chunk-B.js", format!("x{OAUTH}{CONTRACT}{STATIONS}"), 1),
        ])
        .await;

        let config = discover(&locator(&server), DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(config.fragment, "chunk-B.js");
        assert_eq!(config.client.auth_host, "https://auth.test");
        assert_eq!(config.client.client_key, "key-1");
        assert_eq!(config.contract().unwrap().name, "bruxelles");
        assert_eq!(config.stations().unwrap().api_key, "sk-9");
    }

    #[tokio::test]
    async fn test_partial_match_skipped_for_earlier_fragment() {
        let server = site(&[
            ("chunk-A.js", format!("x{OAUTH}{CONTRACT}"), 1),
            ("chunk-B.js", "nothing".to_string(), 1),
            ("chunk-C.js", format!("x{OAUTH_PARTIAL}{CONTRACT}{STATIONS}"), 1),
        ])
        .await;

        let config = discover(&locator(&server), DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(config.fragment, "chunk-A.js");
        // taken from chunk-A only, which has no stations object
        assert!(config.stations.is_none());
        assert!(matches!(config.stations(), Err(AuthError::ConfigNotFound(_))));
    }

    #[tokio::test]
    async fn test_all_fragments_examined_before_failing() {
        let server = site(&[
            ("chunk-A.js", "a".to_string(), 1),
            ("chunk-B.js", format!("x{OAUTH_PARTIAL}"), 1),
            ("chunk-C.js", "c".to_string(), 1),
        ])
        .await;

        let err = discover(&locator(&server), DiscoveryOptions::default())
            .await
            .unwrap_err();
        match err {
            AuthError::ConfigNotFound(msg) => assert!(msg.contains("3 fragments"), "{msg}"),
            other => panic!("expected ConfigNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_fallback_leaves_descriptors_empty() {
        let server = site(&[
            ("chunk-A.js", format!("x{CONTRACT}{STATIONS}"), 0),
            ("chunk-B.js", format!("x{OAUTH}"), 1),
        ])
        .await;

        let config = discover(&locator(&server), DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(config.fragment, "chunk-B.js");
        assert!(config.contract.is_none());
        assert!(config.stations.is_none());
    }

    #[tokio::test]
    async fn test_fallback_consults_earlier_fragment_for_descriptors() {
        let server = site(&[
            ("chunk-A.js", format!("x{CONTRACT}{STATIONS}{OAUTH}"), 1),
            ("chunk-B.js", format!("x{OAUTH}"), 1),
        ])
        .await;

        let options = DiscoveryOptions {
            endpoint_fallback: true,
        };
        let config = discover(&locator(&server), options).await.unwrap();
        // the oAuth object still comes from the last fragment
        assert_eq!(config.fragment, "chunk-B.js");
        assert_eq!(config.contract().unwrap().name, "bruxelles");
        assert_eq!(config.stations().unwrap().url, "https://api.test/stations");
    }

    #[tokio::test]
    async fn test_fallback_not_used_when_oauth_fragment_is_complete() {
        let server = site(&[
            ("chunk-A.js", r#",contract:{name:"other"}"#.to_string(), 0),
            ("chunk-B.js", format!("x{OAUTH}{CONTRACT}{STATIONS}"), 1),
        ])
        .await;

        let options = DiscoveryOptions {
            endpoint_fallback: true,
        };
        let config = discover(&locator(&server), options).await.unwrap();
        assert_eq!(config.contract().unwrap().name, "bruxelles");
    }

    #[tokio::test]
    async fn test_unreachable_fragment_is_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fr/mapping"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<link href="chunk-Z.js">"#),
            )
            .mount(&server)
            .await;

        let err = discover(&locator(&server), DiscoveryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Discovery(ref m) if m.contains("chunk-Z.js")));
    }

    #[test]
    fn test_client_config_requires_all_keys() {
        let mut fields = ObjectFields::new();
        fields.insert("authHost".into(), "h".into());
        fields.insert("env".into(), "e".into());
        fields.insert("clientCode".into(), "c".into());
        assert!(ClientConfig::from_fields(&fields).is_none());

        fields.insert("clientKey".into(), "k".into());
        assert!(ClientConfig::from_fields(&fields).is_some());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig {
            auth_host: "https://auth.test".into(),
            env: "prd".into(),
            client_code: "web".into(),
            client_key: "supersecret".into(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("supe****"));
    }

    #[test]
    fn test_redact_short_secret() {
        assert_eq!(redact("abc"), "****");
        assert_eq!(redact("abcdef"), "abcd****");
    }
}
