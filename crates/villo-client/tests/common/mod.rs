//! Common test utilities for integration tests.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token whose deflated payload expires `offset_secs` from now.
pub fn token_expiring_in(offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let claims = json!({ "exp": exp, "nonce": offset_secs }).to_string();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(claims.as_bytes()).unwrap();
    let payload = encoder.finish().unwrap();

    format!(
        "{}.{}.c2ln",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","zip":"DEF"}"#),
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// Which descriptor objects the served bundle carries.
pub struct Bundle {
    pub contract: bool,
    pub stations: bool,
}

impl Default for Bundle {
    fn default() -> Self {
        Self {
            contract: true,
            stations: true,
        }
    }
}

/// A fake operator site: landing page, one vendor chunk and an app chunk
/// whose configuration points every endpoint back at the mock server.
pub async fn operator_site(bundle: Bundle) -> MockServer {
    let server = MockServer::start().await;
    let uri = server.uri();

    let page = r#"<html><head>
        <link rel="modulepreload" href="chunk-VENDOR.js">
        <link rel="modulepreload" href="chunk-APP.js">
        </head></html>"#;
    Mock::given(method("GET"))
        .and(path("/fr/mapping"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chunk-VENDOR.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("var vendor=1;"))
        .mount(&server)
        .await;

    let mut app = format!(
        r#"const e={{production:!0,oAuth:{{authHost:"{uri}",env:"prd",clientCode:"web",clientKey:"key-1"}}"#
    );
    if bundle.contract {
        app.push_str(r#",contract:{name:"bruxelles"}"#);
    }
    if bundle.stations {
        app.push_str(&format!(
            r#",api:{{stations:{{url:"{uri}/api/stations",apiKey:"sk-9"}}}}"#
        ));
    }
    app.push_str("};");

    Mock::given(method("GET"))
        .and(path("/chunk-APP.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(app))
        .mount(&server)
        .await;

    server
}

/// Serve the token issuance endpoint with the given access token.
pub async fn issue_tokens(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/environments/prd/client_tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": access_token,
            "refreshToken": "refresh-1",
        })))
        .expect(1)
        .mount(server)
        .await;
}
