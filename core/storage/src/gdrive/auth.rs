//! OAuth2 device-flow authentication and token management for Google Drive.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, DeviceAuthorizationUrl, DeviceCodeErrorResponse,
    DeviceCodeErrorResponseType, EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError,
    Scope, StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use drivekeeper_common::{Error, Result};

use super::token_store::{Credential, TokenStore};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// OAuth2 device authorization endpoint.
const GOOGLE_DEVICE_AUTH_URL: &str = "https://oauth2.googleapis.com/device/code";
/// Where OAuth clients are created.
const CLOUD_CONSOLE_URL: &str = "https://console.cloud.google.com/apis/credentials";

/// Google Drive OAuth2 scope. Limited to files created or opened by the app,
/// which is what the device flow permits.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Fallback token lifetime when the server omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: std::time::Duration = std::time::Duration::from_secs(3600);

type DeviceFlowClient =
    BasicClient<EndpointSet, EndpointSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 client registration read from a Google credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCredentials {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Layout of the file downloaded from the Cloud Console.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    installed: Option<AppCredentials>,
}

impl AppCredentials {
    /// Parse a credentials descriptor.
    ///
    /// Only "installed" (desktop / TV and limited input) clients are
    /// accepted, since those are the ones allowed to use the device flow.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_slice(data)
            .map_err(|e| Error::Authentication(format!("Cannot parse credentials file: {}", e)))?;

        file.installed.ok_or_else(|| {
            Error::Authentication(
                "Credentials file has no \"installed\" client; create a \"TV and limited input\" \
                 or desktop OAuth client"
                    .to_string(),
            )
        })
    }

    /// Read a credentials descriptor from disk.
    ///
    /// On failure a setup guide is printed for the operator, and the Cloud
    /// Console is opened when `open_browser` is set.
    pub fn load(path: &Path, open_browser: bool) -> Result<Self> {
        let result = std::fs::read(path)
            .map_err(|e| Error::Authentication(format!("Cannot read credentials file: {}", e)))
            .and_then(|data| Self::from_json(&data));

        if result.is_err() {
            show_setup_guide(path, open_browser);
        }
        result
    }
}

fn show_setup_guide(path: &Path, open_browser: bool) {
    tracing::warn!("Credentials file missing or invalid: {}", path.display());

    println!();
    println!("  Google Drive credentials file not found or unreadable");
    println!("  Expected path: {}", path.display());
    println!();
    println!("  1. Open the Google Cloud Console");
    println!("  2. Create or select a project and enable the Google Drive API");
    println!("  3. Create an OAuth client of type \"TV and limited input devices\"");
    println!("  4. Download the JSON file and save it at the path above");
    println!();

    if !open_browser || open::that(CLOUD_CONSOLE_URL).is_err() {
        println!("  Visit: {}", CLOUD_CONSOLE_URL);
        println!();
    }
}

/// A pending device authorization.
#[derive(Debug)]
pub struct DeviceAuthorization {
    details: StandardDeviceAuthorizationResponse,
}

impl DeviceAuthorization {
    /// URL the operator has to visit.
    pub fn verification_uri(&self) -> &str {
        self.details.verification_uri().url().as_str()
    }

    /// Code the operator has to enter.
    pub fn user_code(&self) -> &str {
        self.details.user_code().secret()
    }

    /// Minimum delay between token polls.
    pub fn interval(&self) -> std::time::Duration {
        self.details.interval()
    }

    /// Lifetime of the device code.
    pub fn expires_in(&self) -> std::time::Duration {
        self.details.expires_in()
    }
}

/// Source of fresh credentials when none can be loaded.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Obtain a new credential, interacting with the operator if needed.
    async fn authorize(&self) -> Result<Credential>;
}

/// OAuth2 device-flow manager for Google Drive.
pub struct AuthManager {
    client: DeviceFlowClient,
    http: oauth2::reqwest::Client,
    credentials: AppCredentials,
    open_browser: bool,
}

impl AuthManager {
    /// Create a new authentication manager.
    pub fn new(credentials: AppCredentials) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(credentials.auth_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(credentials.token_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_device_authorization_url(
                DeviceAuthorizationUrl::new(GOOGLE_DEVICE_AUTH_URL.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid device URL: {}", e)))?,
            );

        // Following redirects would expose the token endpoint to SSRF.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            credentials,
            open_browser: true,
        })
    }

    /// Enable or disable launching a browser during authorization.
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Get the client registration in use.
    pub fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    /// Request a device code and user code.
    pub async fn begin_device_authorization(&self) -> Result<DeviceAuthorization> {
        let details: StandardDeviceAuthorizationResponse = self
            .client
            .exchange_device_code()
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Failed to request device code: {}", e)))?;

        Ok(DeviceAuthorization { details })
    }

    /// Poll the token endpoint until the operator approves, denies, or the
    /// device code expires.
    pub async fn poll_device_token(&self, authorization: &DeviceAuthorization) -> Result<Credential> {
        let token = self
            .client
            .exchange_device_access_token(&authorization.details)
            .request_async(&self.http, tokio::time::sleep, None)
            .await
            .map_err(device_error)?;

        Ok(credential_from_response(&token, None))
    }

    /// Refresh an access token using the refresh token.
    ///
    /// # Errors
    /// - No refresh token in `credential`
    /// - Invalid or revoked refresh token
    /// - Network errors
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication("No refresh token available".to_string()))?;

        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        Ok(credential_from_response(&token, Some(refresh_token)))
    }
}

#[async_trait]
impl Authorizer for AuthManager {
    async fn authorize(&self) -> Result<Credential> {
        let authorization = self.begin_device_authorization().await?;
        show_device_prompt(&authorization, self.open_browser);

        let credential = self.poll_device_token(&authorization).await?;
        println!("  Authorization complete.");
        tracing::info!("Device authorization complete");

        Ok(credential)
    }
}

fn show_device_prompt(authorization: &DeviceAuthorization, open_browser: bool) {
    println!();
    println!("  Google Drive device authorization");
    println!();
    println!("  1. Visit: {}", authorization.verification_uri());
    println!("  2. Enter code: {}", authorization.user_code());
    println!();
    println!("  Waiting for authorization...");

    if open_browser && open::that(authorization.verification_uri()).is_err() {
        println!("  Could not open a browser, visit the URL above manually");
    }
}

fn device_error<RE>(err: RequestTokenError<RE, DeviceCodeErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    if let RequestTokenError::ServerResponse(response) = &err {
        match response.error() {
            DeviceCodeErrorResponseType::AccessDenied => {
                return Error::Authentication("Authorization was denied".to_string());
            }
            DeviceCodeErrorResponseType::ExpiredToken => {
                return Error::Authentication(
                    "Device code expired before authorization completed".to_string(),
                );
            }
            _ => {}
        }
    }
    Error::Authentication(format!("Device authorization failed: {}", err))
}

fn credential_from_response(token: &BasicTokenResponse, previous_refresh: Option<&str>) -> Credential {
    let expires_in = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
    let expiry = Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

    // Refresh responses usually omit the refresh token
    let refresh_token = token
        .refresh_token()
        .map(|t| t.secret().clone())
        .or_else(|| previous_refresh.map(str::to_string));

    Credential {
        access_token: token.access_token().secret().clone(),
        token_type: "Bearer".to_string(),
        refresh_token,
        expiry,
    }
}

/// Load the stored credential, or run `authorizer` and persist the result.
pub async fn obtain_credential(store: &TokenStore, authorizer: &dyn Authorizer) -> Result<Credential> {
    match store.load() {
        Ok(credential) => return Ok(credential),
        Err(e) if e.is_not_found() => {
            tracing::info!("No stored token, starting authorization");
        }
        Err(e) => {
            tracing::warn!("Stored token is unusable ({}), starting authorization", e);
        }
    }

    let credential = authorizer.authorize().await?;
    store.save(&credential)?;
    Ok(credential)
}

/// Full start-up authentication: read the client registration, load or
/// obtain a credential, and wrap it in an auto-refreshing [`TokenManager`].
pub async fn authenticate(
    credentials_file: &Path,
    store: TokenStore,
    open_browser: bool,
) -> Result<TokenManager> {
    let credentials = AppCredentials::load(credentials_file, open_browser)?;
    let auth_manager = AuthManager::new(credentials)?.with_browser(open_browser);

    let credential = obtain_credential(&store, &auth_manager).await?;

    Ok(TokenManager::new(auth_manager, credential).with_store(store))
}

/// Token manager that automatically refreshes expired tokens.
pub struct TokenManager {
    auth_manager: AuthManager,
    credential: tokio::sync::RwLock<Credential>,
    store: Option<TokenStore>,
}

impl TokenManager {
    /// Create a new token manager with an initial credential.
    pub fn new(auth_manager: AuthManager, credential: Credential) -> Self {
        Self {
            auth_manager,
            credential: tokio::sync::RwLock::new(credential),
            store: None,
        }
    }

    /// Persist refreshed credentials to `store`.
    pub fn with_store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - Token expired and cannot be refreshed
    /// - Token refresh failed
    pub async fn access_token(&self) -> Result<String> {
        let credential = self.credential.read().await;

        if !credential.needs_refresh() {
            return Ok(credential.access_token.clone());
        }

        drop(credential);

        let mut credential = self.credential.write().await;

        // Double-check after acquiring write lock
        if !credential.needs_refresh() {
            return Ok(credential.access_token.clone());
        }

        if !credential.can_refresh() {
            if credential.is_expired() {
                return Err(Error::Authentication(
                    "Token expired and no refresh token is available".to_string(),
                ));
            }
            return Ok(credential.access_token.clone());
        }

        tracing::info!("Refreshing expired access token");

        let refreshed = self.auth_manager.refresh(&credential).await?;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&refreshed) {
                tracing::warn!("Failed to persist refreshed token: {}", e);
            }
        }

        *credential = refreshed;

        Ok(credential.access_token.clone())
    }

    /// Get the current credential.
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }
}
