use crate::error::ProviderError;
use reqwest::{header::HeaderMap, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum AuthStrategy {
    Bearer { token: String },
    Header { name: String, value: String },
    None,
}

/// Thin reqwest wrapper shared by the adapters: base-URL joining, default
/// auth headers and uniform error mapping.
#[derive(Clone)]
pub struct HttpProviderClient {
    http: Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl HttpProviderClient {
    pub fn new(
        timeout: Duration,
        base_url: Option<String>,
        default_base: &str,
        auth: AuthStrategy,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration {
                message: format!("failed to create HTTP client: {e}"),
            }
        })?;

        let mut default_headers = HeaderMap::new();

        match auth {
            AuthStrategy::Bearer { token } => {
                let value = format!("Bearer {token}").parse().map_err(|_| {
                    ProviderError::Configuration {
                        message: "API key contains non-header characters".to_string(),
                    }
                })?;
                default_headers.insert("Authorization", value);
            }
            AuthStrategy::Header { name, value } => {
                let header_name = name.parse::<reqwest::header::HeaderName>().map_err(|_| {
                    ProviderError::Configuration {
                        message: format!("invalid auth header name: {name}"),
                    }
                })?;
                let header_value = value.parse().map_err(|_| ProviderError::Configuration {
                    message: "API key contains non-header characters".to_string(),
                })?;
                default_headers.insert(header_name, header_value);
            }
            AuthStrategy::None => {}
        }

        let base_url = base_url.unwrap_or_else(|| default_base.to_string());

        Ok(Self {
            http,
            base_url,
            default_headers,
        })
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    pub async fn post_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TResp, ProviderError> {
        let url = self.build_url(path);
        let resp = self
            .http
            .request(Method::POST, url)
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_response(resp).await
    }

    pub async fn get_json<TResp: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<TResp, ProviderError> {
        let url = self.build_url(path);
        let resp = self
            .http
            .request(Method::GET, url)
            .headers(self.default_headers.clone())
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_response(resp).await
    }
}

async fn decode_response<TResp: DeserializeOwned>(resp: Response) -> Result<TResp, ProviderError> {
    if !resp.status().is_success() {
        return Err(map_error_response(resp).await);
    }
    let body = resp.text().await.map_err(map_transport_error)?;
    Ok(serde_json::from_str(&body)?)
}

/// Collapse reqwest transport failures to the typed error set.
pub fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(e)
    }
}

/// Map a non-success upstream response to a typed error.
///
/// The status code decides the kind; the message is pulled from common JSON
/// error envelopes when possible.
pub async fn map_error_response(resp: Response) -> ProviderError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").cloned().or_else(|| Some(e.clone())))
                .and_then(|m| m.as_str().map(|s| s.to_string()))
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            }
        });

    match status.as_u16() {
        401 | 403 => ProviderError::InvalidCredential,
        429 => ProviderError::RateLimited,
        500..=599 => ProviderError::Unavailable { message },
        code => ProviderError::Api { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpProviderClient {
        HttpProviderClient::new(
            Duration::from_secs(2),
            Some(server.uri()),
            "http://unused.invalid",
            AuthStrategy::Bearer {
                token: "test-token".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let cases = [
            (401, ErrorKind::InvalidCredential),
            (403, ErrorKind::InvalidCredential),
            (429, ErrorKind::UpstreamRateLimited),
            (503, ErrorKind::UpstreamUnavailable),
            (418, ErrorKind::UpstreamOther),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/check"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let err = client
                .get_json::<serde_json::Value>("/check")
                .await
                .unwrap_err();
            assert_eq!(err.kind(), expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn garbage_body_maps_to_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .get_json::<serde_json::Value>("/check")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMalformed);
    }

    #[tokio::test]
    async fn error_message_is_pulled_from_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"message": "model does not exist"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .get_json::<serde_json::Value>("/check")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model does not exist"));
    }
}
