// =============================================================================
// INSTALLED-APP OAUTH FLOW
// =============================================================================
//
// Admin mode authenticates as a real Google user:
//
// 1. Read `client_secret.json` (downloaded from Google Cloud Console,
//    "OAuth client ID" of type "Desktop app").
// 2. Listen on a random localhost port and print the consent URL.
// 3. The browser redirects back to `http://localhost:<port>/?code=...&state=...`.
// 4. Exchange the code for an access + refresh token.
//
// There is no overall timeout: the flow waits until the user answers in the
// browser. Each connection is served on its own task, and one that sends no
// request line in time is dropped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::core::auth::{AuthError, OAuthFlow, StoredToken};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// How long a connection may take to send its request line.
const REQUEST_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Authorized</title></head>\
<body><h1>Authorization complete</h1><p>You can close this window.</p></body></html>";

// =============================================================================
// CLIENT SECRET FILE
// =============================================================================

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

/// The OAuth client registered for this application.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientConfig {
    /// Accepts both the "installed" and the "web" client layouts.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretFile =
            serde_json::from_str(json).map_err(|e| AuthError::ClientSecret(e.to_string()))?;
        file.installed.or(file.web).ok_or_else(|| {
            AuthError::ClientSecret("expected an \"installed\" or \"web\" section".to_string())
        })
    }
}

// =============================================================================
// CALLBACK PARSING
// =============================================================================

/// Query parameters of the redirect back to the local listener.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    fn is_oauth_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Parses an HTTP request line such as `GET /?code=abc&state=xyz HTTP/1.1`.
pub fn parse_callback(request_line: &str) -> Result<CallbackParams, AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::Authorization("malformed callback request".to_string()))?;

    let url = Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| AuthError::Authorization(format!("malformed callback URL: {}", e)))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}

/// Checks the redirect parameters and returns the authorization code.
pub fn validate_callback(params: CallbackParams, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = params.error {
        return Err(AuthError::Authorization(error));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::Authorization("state parameter mismatch".to_string()));
    }
    params
        .code
        .ok_or_else(|| AuthError::Authorization("no authorization code in callback".to_string()))
}

// =============================================================================
// TOKEN ENDPOINT
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Google only returns a refresh token on the first exchange; keep the
    /// previous one otherwise.
    fn into_stored(self, previous: &StoredToken) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| previous.refresh_token.clone()),
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| previous.scopes.clone()),
            ..previous.clone()
        }
    }
}

// =============================================================================
// FLOW
// =============================================================================

pub struct InstalledAppFlow {
    client: Client,
    secret_path: PathBuf,
    scopes: Vec<String>,
}

impl InstalledAppFlow {
    pub fn new(secret_path: impl AsRef<Path>, scopes: &[&str]) -> Self {
        Self {
            client: Client::new(),
            secret_path: secret_path.as_ref().to_path_buf(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn load_client_config(&self) -> Result<ClientConfig, AuthError> {
        let text = tokio::fs::read_to_string(&self.secret_path)
            .await
            .map_err(|e| {
                AuthError::ClientSecret(format!("{}: {}", self.secret_path.display(), e))
            })?;
        ClientConfig::from_json(&text)
    }

    /// The consent page URL the user has to open.
    pub fn authorization_url(
        &self,
        config: &ClientConfig,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, AuthError> {
        let scope = self.scopes.join(" ");
        Url::parse_with_params(
            &config.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AuthError::ClientSecret(format!("invalid auth_uri: {}", e)))
    }

    /// Accepts connections until the OAuth redirect arrives.
    async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
        let (tx, mut rx) = mpsc::channel(1);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) =
                        accepted.map_err(|e| AuthError::Authorization(e.to_string()))?;
                    tracing::debug!("OAuth callback connection from {}", peer);

                    let tx = tx.clone();
                    let expected_state = expected_state.to_string();
                    tokio::spawn(async move {
                        if let Some(result) = serve_callback(stream, &expected_state).await {
                            // The receiver is gone once another redirect won.
                            let _ = tx.send(result).await;
                        }
                    });
                }
                Some(result) = rx.recv() => return result,
            }
        }
    }

    async fn exchange_code(
        &self,
        config: &ClientConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, AuthError> {
        let response = self
            .client
            .post(&config.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Authorization(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Authorization(format!(
                "code exchange failed ({}): {}",
                status, text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Authorization(e.to_string()))?;

        let template = StoredToken {
            access_token: String::new(),
            refresh_token: None,
            expires_at: None,
            token_uri: config.token_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: self.scopes.clone(),
        };
        Ok(body.into_stored(&template))
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Answers one connection. Returns `None` when it was not the OAuth redirect.
async fn serve_callback(
    mut stream: TcpStream,
    expected_state: &str,
) -> Option<Result<String, AuthError>> {
    let request_line = match timeout(REQUEST_READ_TIMEOUT, read_request_line(&mut stream)).await {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            tracing::debug!("Dropping callback connection: {}", e);
            return None;
        }
        Err(_) => {
            tracing::debug!("Callback connection sent no request, closing it");
            return None;
        }
    };

    let Ok(params) = parse_callback(&request_line) else {
        respond(&mut stream, "400 Bad Request", "").await;
        return None;
    };

    // Browsers also ask for /favicon.ico and friends.
    if !params.is_oauth_redirect() {
        respond(&mut stream, "404 Not Found", "").await;
        return None;
    }

    let result = validate_callback(params, expected_state);
    match &result {
        Ok(_) => respond(&mut stream, "200 OK", SUCCESS_PAGE).await,
        Err(e) => {
            let body = format!("<html><body><h1>Authorization failed</h1><p>{}</p></body></html>", e);
            respond(&mut stream, "400 Bad Request", &body).await;
        }
    }
    Some(result)
}

async fn read_request_line(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| AuthError::Authorization(e.to_string()))?;
    Ok(line)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer OAuth callback: {}", e);
    }
}

#[async_trait]
impl OAuthFlow for InstalledAppFlow {
    fn has_client_secret(&self) -> bool {
        self.secret_path.exists()
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Refresh("token has no refresh credential".to_string()))?;

        let response = self
            .client
            .post(&token.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("{}: {}", status, text)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        tracing::info!("Refreshed administrator token");
        Ok(body.into_stored(token))
    }

    async fn authorize(&self) -> Result<StoredToken, AuthError> {
        let config = self.load_client_config().await?;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthError::Authorization(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Authorization(e.to_string()))?
            .port();
        let redirect_uri = format!("http://localhost:{}/", port);

        let state = random_state();
        let url = self.authorization_url(&config, &redirect_uri, &state)?;

        println!("Please visit this URL to authorize this application:\n{}", url);
        tracing::info!("Waiting for OAuth consent on port {}", port);

        let code = Self::wait_for_code(&listener, &state).await?;
        let token = self.exchange_code(&config, &code, &redirect_uri).await?;

        tracing::info!("Administrator authorization complete");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INSTALLED_JSON: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    fn previous() -> StoredToken {
        StoredToken {
            access_token: "old".to_string(),
            refresh_token: Some("1//keep".to_string()),
            expires_at: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
        }
    }

    #[test]
    fn test_client_config_installed_layout() {
        let config = ClientConfig::from_json(INSTALLED_JSON).unwrap();
        assert_eq!(config.client_id, "123.apps.googleusercontent.com");
        assert_eq!(config.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_client_config_web_layout_with_defaults() {
        let json = r#"{"web": {"client_id": "w", "client_secret": "s"}}"#;
        let config = ClientConfig::from_json(json).unwrap();
        assert_eq!(config.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn test_client_config_without_section_is_rejected() {
        let result = ClientConfig::from_json(r#"{"other": {}}"#);
        assert!(matches!(result, Err(AuthError::ClientSecret(_))));
    }

    #[test]
    fn test_parse_callback_with_code() {
        let params = parse_callback("GET /?state=abc&code=4%2F0Ab&scope=drive HTTP/1.1\r\n").unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_parse_callback_favicon_is_not_a_redirect() {
        let params = parse_callback("GET /favicon.ico HTTP/1.1").unwrap();
        assert!(!params.is_oauth_redirect());
    }

    #[test]
    fn test_parse_callback_rejects_garbage() {
        assert!(parse_callback("").is_err());
    }

    #[test]
    fn test_validate_callback() {
        let ok = CallbackParams {
            code: Some("c".to_string()),
            state: Some("s".to_string()),
            error: None,
        };
        assert_eq!(validate_callback(ok, "s").unwrap(), "c");

        let wrong_state = CallbackParams {
            code: Some("c".to_string()),
            state: Some("other".to_string()),
            error: None,
        };
        assert!(validate_callback(wrong_state, "s").is_err());

        let denied = CallbackParams {
            error: Some("access_denied".to_string()),
            ..Default::default()
        };
        match validate_callback(denied, "s") {
            Err(AuthError::Authorization(e)) => assert_eq!(e, "access_denied"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_authorization_url_carries_offline_access() {
        let flow = InstalledAppFlow::new("client_secret.json", &["https://www.googleapis.com/auth/drive"]);
        let config = ClientConfig::from_json(INSTALLED_JSON).unwrap();

        let url = flow
            .authorization_url(&config, "http://localhost:8080/", "xyz")
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8080/".to_string()
        )));
    }

    #[test]
    fn test_refresh_response_keeps_refresh_token() {
        let body = TokenResponse {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_in: Some(3599),
            scope: None,
        };
        let token = body.into_stored(&previous());

        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("1//keep"));
        assert_eq!(token.client_id, "id");
        assert!(token.is_valid(Utc::now()));
    }

    #[test]
    fn test_random_state_is_alphanumeric() {
        let state = random_state();
        assert_eq!(state.len(), 30);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state, random_state());
    }

    #[test]
    fn test_client_secret_presence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        let flow = InstalledAppFlow::new(&path, &[]);
        assert!(!flow.has_client_secret());

        std::fs::write(&path, INSTALLED_JSON).unwrap();
        assert!(flow.has_client_secret());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails_fast() {
        let flow = InstalledAppFlow::new("client_secret.json", &[]);
        let token = StoredToken {
            refresh_token: None,
            ..previous()
        };
        assert!(matches!(flow.refresh(&token).await, Err(AuthError::Refresh(_))));
    }

    async fn callback_listener(state: &'static str) -> (
        std::net::SocketAddr,
        tokio::task::JoinHandle<Result<String, AuthError>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter =
            tokio::spawn(async move { InstalledAppFlow::wait_for_code(&listener, state).await });
        (addr, waiter)
    }

    async fn send_request(addr: std::net::SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_the_redirect() {
        let (addr, waiter) = callback_listener("s").await;

        // Browsers open speculative connections and never write on them.
        let _idle = TcpStream::connect(addr).await.unwrap();
        let response = send_request(addr, "/?code=abc&state=s").await;

        let code = tokio::time::timeout(std::time::Duration::from_secs(3), waiter)
            .await
            .expect("redirect was not handled while another connection was idle")
            .unwrap()
            .unwrap();
        assert_eq!(code, "abc");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_stray_requests_are_answered_and_skipped() {
        let (addr, waiter) = callback_listener("s").await;

        let favicon = send_request(addr, "/favicon.ico").await;
        assert!(favicon.starts_with("HTTP/1.1 404"));

        send_request(addr, "/?code=xyz&state=s").await;
        assert_eq!(waiter.await.unwrap().unwrap(), "xyz");
    }

    #[tokio::test]
    async fn test_state_mismatch_fails_the_flow() {
        let (addr, waiter) = callback_listener("s").await;

        let response = send_request(addr, "/?code=xyz&state=forged").await;

        assert!(response.starts_with("HTTP/1.1 400"));
        assert!(matches!(
            waiter.await.unwrap(),
            Err(AuthError::Authorization(e)) if e.contains("state")
        ));
    }

    #[tokio::test]
    async fn test_refresh_posts_to_token_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let flow = InstalledAppFlow::new("client_secret.json", &[]);
        let token = StoredToken {
            token_uri: format!("{}/token", server.uri()),
            ..previous()
        };

        let refreshed = flow.refresh(&token).await.unwrap();

        assert_eq!(refreshed.access_token, "ya29.fresh");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("1//keep"));
        assert!(refreshed.is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_a_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let flow = InstalledAppFlow::new("client_secret.json", &[]);
        let token = StoredToken {
            token_uri: format!("{}/token", server.uri()),
            ..previous()
        };

        match flow.refresh(&token).await {
            Err(AuthError::Refresh(e)) => assert!(e.contains("invalid_grant"), "{e}"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_builds_a_stored_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2F0Ab"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.first",
                "refresh_token": "1//new",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/drive"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let flow = InstalledAppFlow::new("client_secret.json", &[]);
        let config = ClientConfig {
            token_uri: format!("{}/token", server.uri()),
            ..ClientConfig::from_json(INSTALLED_JSON).unwrap()
        };

        let token = flow
            .exchange_code(&config, "4/0Ab", "http://localhost:8080/")
            .await
            .unwrap();

        assert_eq!(token.access_token, "ya29.first");
        assert_eq!(token.refresh_token.as_deref(), Some("1//new"));
        assert_eq!(token.client_id, "123.apps.googleusercontent.com");
        assert_eq!(token.token_uri, config.token_uri);
        assert_eq!(token.scopes, vec!["https://www.googleapis.com/auth/drive"]);
    }
}
