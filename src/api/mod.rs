pub mod endpoint;
pub mod error;
pub mod response;

use crate::model::{Resource, ResourceLinks};
pub use error::Error;
use reqwest::header::{self, HeaderMap, HeaderValue};
use response::links::Links;
use response::oauth_token::OauthToken;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::net::TcpStream;

pub const API_URL: &str = "https://www.getfresh.energy";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON object returned for a resource. Empty when nothing could be fetched.
pub type Payload = Map<String, Value>;

/// HTTP client bound to one GetFresh API surface.
#[derive(Debug, Clone)]
pub struct Client {
    api_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl Client {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = reqwest::ClientBuilder::new()
            .user_agent(endpoint::USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .or(Err(Error::InternalError))?;

        Ok(Client {
            api_url: api_url.trim_end_matches('/').to_owned(),
            timeout,
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// Map Non-2xx API response to Error
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::UNAUTHORIZED) => Error::Unauthorized(error.to_string()),
        _ => Error::ApiError(error.to_string()),
    }
}

/// Verify the API host accepts TCP connections within the client timeout.
pub async fn check_reachable(client: &Client) -> Result<(), Error> {
    let url = reqwest::Url::parse(&client.api_url)
        .map_err(|e| Error::ConfigError(format!("{}: {}", client.api_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::ConfigError(format!("No host in {}", client.api_url)))?;
    let port = url.port_or_known_default().unwrap_or(443);

    match tokio::time::timeout(client.timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(Error::UnreachableService(format!("{}:{}: {}", host, port, e))),
        Err(_) => Err(Error::UnreachableService(format!(
            "{}:{}: no connection within {:?}",
            host, port, client.timeout
        ))),
    }
}

/// Exchange `email` and `password` for a bearer token (OAuth password grant).
pub async fn authenticate(client: &Client, email: &str, password: &str) -> Result<String, Error> {
    let url = format!("{}{}", client.api_url, endpoint::TOKEN);
    let form = [
        ("grant_type", "password"),
        ("username", email),
        ("password", password),
    ];

    let response = client
        .client
        .post(url)
        .basic_auth(endpoint::CLIENT_ID, Some(endpoint::CLIENT_SECRET))
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::InvalidCredentials(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::InvalidCredentials(e.to_string()))?;

    serde_json::from_str::<OauthToken>(&body)
        .ok()
        .and_then(|t| t.access_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            Error::InvalidCredentials(format!(
                "No access_token received (server responded {})",
                status
            ))
        })
}

async fn get(client: &Client, url: &str, token: &str) -> Result<Value, Error> {
    client
        .client
        .get(url)
        .bearer_auth(token)
        .header(header::CONTENT_TYPE, "application/json")
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(|e| Error::ApiError(format!("Error reading API response: {}", e)))
        .map(|s| {
            log::trace!("url: {}, response_text: {}", url, s);
            serde_json::from_str::<Value>(&s).map_err(|e| Error::InvalidResponse(s, e.to_string()))
        })?
}

/// Fetch the discovery document and keep the links of known resources.
pub async fn links(client: &Client, token: &str) -> Result<ResourceLinks, Error> {
    let url = format!("{}{}", client.api_url, endpoint::LINKS);
    let value = get(client, &url, token).await?;

    let mut response = serde_json::from_value::<Links>(value.clone())
        .map_err(|e| Error::InvalidResponse(value.to_string(), e.to_string()))?;

    let mut links = ResourceLinks::default();
    for resource in Resource::ALL.iter() {
        if let Some(link) = response.links.remove(resource.name()) {
            links.insert(*resource, link.href);
        }
    }
    Ok(links)
}

/// Resolve `resource` through the discovery document and fetch it.
///
/// Failures of either request yield an empty payload. Only a rejected token is
/// returned as `Error::Unauthorized`, so the caller can drop it.
pub async fn resolve(client: &Client, token: &str, resource: Resource) -> Result<Payload, Error> {
    let links = match links(client, token).await {
        Ok(links) => links,
        Err(Error::Unauthorized(e)) => return Err(Error::Unauthorized(e)),
        Err(e) => {
            log::warn!("Unable to read links for {}: {:?}", resource, e);
            return Ok(Payload::new());
        }
    };

    let href = match links.get(resource) {
        Some(href) => href,
        None => {
            log::warn!("No link to {} in discovery document", resource);
            return Ok(Payload::new());
        }
    };

    match get(client, href, token).await {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(value) => {
            log::warn!("Unexpected {} payload: {}", resource, value);
            Ok(Payload::new())
        }
        Err(Error::Unauthorized(e)) => Err(Error::Unauthorized(e)),
        Err(e) => {
            log::warn!("Unable to read {}: {:?}", resource, e);
            Ok(Payload::new())
        }
    }
}
