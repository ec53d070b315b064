//! Static extraction of configuration objects from minified script text.
//!
//! The front-end bundle inlines its configuration as object literals such
//! as `,oAuth:{authHost:"https://…",env:"prd",clientCode:"…",clientKey:"…"}`.
//! Only flat `identifier:"string"` leaves are read; nested objects and
//! arrays inside the literal are ignored.
//!
//! Scraping a third party's minified bundle breaks whenever the bundler
//! output changes, so each object type is located by an
//! [`ExtractionStrategy`] that can be swapped without touching the session
//! or gateway layers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Flat key/value pairs read from one object literal.
pub type ObjectFields = BTreeMap<String, String>;

static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z]+):"([^"]+?)""#).expect("valid field regex"));

static OAUTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",oAuth:\{(.*?)\}").expect("valid oAuth regex"));

static CONTRACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",contract:\{(.*?)\}").expect("valid contract regex"));

static STATIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"stations:\{(.*?)\}").expect("valid stations regex"));

/// Keys the OAuth client object must carry.
pub const OAUTH_KEYS: &[&str] = &["authHost", "env", "clientCode", "clientKey"];
/// Keys the contract object must carry.
pub const CONTRACT_KEYS: &[&str] = &["name"];
/// Keys the stations endpoint object must carry.
pub const STATIONS_KEYS: &[&str] = &["url", "apiKey"];

/// Result of looking for one object in one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Object found with every required key non-empty.
    Complete(ObjectFields),
    /// Object found but some required keys are absent or empty.
    Partial {
        fields: ObjectFields,
        missing: Vec<&'static str>,
    },
    /// Object not present in this fragment.
    NotFound,
}

impl ExtractionOutcome {
    /// Sort raw fields into an outcome against a set of required keys.
    pub fn classify(fields: Option<ObjectFields>, required: &[&'static str]) -> Self {
        let Some(fields) = fields else {
            return ExtractionOutcome::NotFound;
        };

        let missing: Vec<&'static str> = required
            .iter()
            .copied()
            .filter(|key| fields.get(*key).is_none_or(|v| v.is_empty()))
            .collect();

        if missing.is_empty() {
            ExtractionOutcome::Complete(fields)
        } else {
            ExtractionOutcome::Partial { fields, missing }
        }
    }

    /// Label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Complete(_) => "found-complete",
            ExtractionOutcome::Partial { .. } => "found-partial",
            ExtractionOutcome::NotFound => "not-found",
        }
    }

    /// The fields when the object was complete.
    pub fn into_complete(self) -> Option<ObjectFields> {
        match self {
            ExtractionOutcome::Complete(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Locates one named configuration object in script text.
pub trait ExtractionStrategy: Send + Sync + fmt::Debug {
    /// Name of the object this strategy looks for (`oAuth`, `contract`, …).
    fn object_name(&self) -> &str;

    /// Keys that must be present for the object to be usable.
    fn required_keys(&self) -> &'static [&'static str];

    /// Raw fields of the object, or `None` when the fragment lacks it.
    fn extract(&self, script: &str) -> Option<ObjectFields>;

    /// Extract and classify in one step.
    fn attempt(&self, script: &str) -> ExtractionOutcome {
        ExtractionOutcome::classify(self.extract(script), self.required_keys())
    }
}

/// Finds `<prefix>{…}` with a regex and reads its quoted leaves.
///
/// The closing brace is the first `}` after the prefix, so a nested object
/// inside the literal truncates the match; the credentials consumed here
/// always sit before any nested value.
#[derive(Clone)]
pub struct RegexObjectStrategy {
    name: &'static str,
    pattern: Regex,
    required: &'static [&'static str],
}

impl RegexObjectStrategy {
    /// Build a strategy from a pattern whose first capture group is the
    /// object body.
    pub fn new(
        name: &'static str,
        pattern: &str,
        required: &'static [&'static str],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            required,
        })
    }

    /// The OAuth client object (`,oAuth:{…}`).
    pub fn oauth() -> Self {
        Self::preset("oAuth", &OAUTH_RE, OAUTH_KEYS)
    }

    /// The contract object (`,contract:{…}`).
    pub fn contract() -> Self {
        Self::preset("contract", &CONTRACT_RE, CONTRACT_KEYS)
    }

    /// The stations endpoint object (`stations:{…}`).
    pub fn stations() -> Self {
        Self::preset("stations", &STATIONS_RE, STATIONS_KEYS)
    }

    fn preset(name: &'static str, pattern: &Regex, required: &'static [&'static str]) -> Self {
        Self {
            name,
            pattern: pattern.clone(),
            required,
        }
    }
}

impl fmt::Debug for RegexObjectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexObjectStrategy")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl ExtractionStrategy for RegexObjectStrategy {
    fn object_name(&self) -> &str {
        self.name
    }

    fn required_keys(&self) -> &'static [&'static str] {
        self.required
    }

    fn extract(&self, script: &str) -> Option<ObjectFields> {
        let body = self.pattern.captures(script)?.get(1)?.as_str();
        tracing::debug!(
            object = self.name,
            pattern = %self.pattern.as_str(),
            body_len = body.len(),
            "Matched configuration object"
        );
        Some(parse_fields(body))
    }
}

/// Parse `key:"value"` pairs. Later duplicates win.
pub fn parse_fields(body: &str) -> ObjectFields {
    FIELD_RE
        .captures_iter(body)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}
