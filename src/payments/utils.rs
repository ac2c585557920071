use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Authentication scheme for a provider request.
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Basic {
        username: &'a str,
        password: &'a str,
    },
}

/// Thin JSON client shared by the provider adapters.
///
/// Transport failures, timeouts, 5xx responses and 429s are retried with
/// exponential backoff; 4xx responses are surfaced immediately as provider
/// rejections. The timeout is supplied per call because initiation and
/// status polling run on different budgets.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PaymentError::Transport {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Auth<'_>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
        timeout: Duration,
    ) -> PaymentResult<T> {
        let text = self
            .request_text(method, url, auth, body, additional_headers, timeout)
            .await?;
        serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderRejected {
            provider: "http".to_string(),
            message: format!("invalid provider JSON response: {}", e),
            provider_code: None,
        })
    }

    /// Like [`request_json`] for endpoints that acknowledge with an empty
    /// 2xx body (MTN's request-to-pay returns `202 Accepted` with nothing).
    pub async fn request_accepted(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Auth<'_>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
        timeout: Duration,
    ) -> PaymentResult<()> {
        self.request_text(method, url, auth, body, additional_headers, timeout)
            .await
            .map(|_| ())
    }

    async fn request_text(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Auth<'_>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
        timeout: Duration,
    ) -> PaymentResult<String> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url).timeout(timeout);

            match &auth {
                Auth::None => {}
                Auth::Bearer(token) => request = request.bearer_auth(token),
                Auth::Basic { username, password } => {
                    request = request.basic_auth(username, Some(password))
                }
            }
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    PaymentError::Timeout {
                        message: format!("request to {} timed out", url),
                        timeout_secs: timeout.as_secs(),
                    }
                } else {
                    PaymentError::Transport {
                        message: format!("provider request failed: {}", e),
                    }
                }
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return Ok(text);
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimited {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_secs: None,
                        });
                    }

                    if status.is_server_error() {
                        if attempt < self.max_retries {
                            warn!(
                                status = %status,
                                attempt = attempt + 1,
                                "provider server error, retrying"
                            );
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::Transport {
                            message: format!("HTTP {}: {}", status, text),
                        });
                    }

                    return Err(PaymentError::ProviderRejected {
                        provider: "http".to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                    });
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if retryable && attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::Transport {
            message: "provider request failed".to_string(),
        }))
    }
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn hmac_verification_detects_invalid_signature() {
        let payload = br#"{"reference":"TX1","status":"TS"}"#;
        assert!(!verify_hmac_sha256_hex(
            payload,
            "secret",
            "not-a-valid-signature"
        ));
    }

    #[test]
    fn hmac_verification_accepts_matching_signature() {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let payload = br#"{"reference":"TX1"}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_hmac_sha256_hex(payload, "secret", &signature));
    }
}
