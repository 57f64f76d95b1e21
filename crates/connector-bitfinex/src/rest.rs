//! 서명 REST 클라이언트.
//!
//! 모든 호출은 먼저 일반 REST 토큰 버킷에서 토큰 하나를 소비합니다
//! (소진 시 블로킹). 인증 엔드포인트는 HMAC-SHA384 서명을 계산해
//! `bfx-apikey` / `bfx-nonce` / `bfx-signature` 헤더로 첨부합니다.
//!
//! 이 컴포넌트는 재시도하지 않습니다. 재시도 정책은 호출자 소관이며,
//! 비멱등 작업(주문 제출)은 절대 자동 재시도되지 않습니다.

use crate::config::BitfinexConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::rate_limit::TokenBucket;
use crate::signing::{rest_signature_payload, sign_hmac_sha384, NonceFactory};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Bitfinex 서명 REST 클라이언트.
pub struct BitfinexRestClient {
    config: BitfinexConfig,
    client: Client,
    bucket: Arc<TokenBucket>,
    nonce: NonceFactory,
}

impl BitfinexRestClient {
    /// 새 REST 클라이언트를 생성합니다.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ConnectorError::NetworkError`.
    pub fn new(config: BitfinexConfig) -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConnectorError::NetworkError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            config,
            client,
            bucket: Arc::new(TokenBucket::general_rest()),
            nonce: NonceFactory::new(),
        })
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &BitfinexConfig {
        &self.config
    }

    /// 인증 요청을 실행하고 응답 본문을 반환합니다.
    ///
    /// `endpoint`는 버전 접두어 없는 경로입니다 (예: "auth/r/orders").
    pub async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: &serde_json::Value,
    ) -> ConnectorResult<String> {
        self.bucket.acquire().await;

        let url = format!("{}/v2/{}", self.config.rest_url, endpoint);
        let body_text = body.to_string();

        let nonce = self.nonce.next();
        let payload = rest_signature_payload(endpoint, nonce, &body_text);
        let signature = sign_hmac_sha384(self.config.credentials.expose_secret(), &payload);

        debug!(%endpoint, %method, "Executing signed request");

        let response = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("bfx-apikey", &self.config.credentials.api_key)
            .header("bfx-nonce", nonce.to_string())
            .header("bfx-signature", signature)
            .body(body_text)
            .send()
            .await
            .map_err(ConnectorError::from)?;

        Self::handle_response(response).await
    }

    /// 서명 POST 요청 (역직렬화 포함).
    pub async fn signed_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> ConnectorResult<T> {
        let text = self.execute(endpoint, Method::POST, body).await?;
        Self::parse_body(&text)
    }

    /// 공개 API 요청 (인증 불필요).
    pub async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ConnectorResult<T> {
        self.bucket.acquire().await;

        let url = format!("{}/v2/{}", self.config.public_url, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(ConnectorError::from)?;

        let text = Self::handle_response(response).await?;
        Self::parse_body(&text)
    }

    /// API 응답 처리.
    ///
    /// 비정상 상태는 상태 코드와 거래소 원본 본문을 담은
    /// `RequestFailed`로 변환합니다.
    async fn handle_response(response: reqwest::Response) -> ConnectorResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::NetworkError(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            error!(status = status.as_u16(), %body, "Request failed");
            Err(ConnectorError::RequestFailed {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn parse_body<T: DeserializeOwned>(text: &str) -> ConnectorResult<T> {
        serde_json::from_str(text).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, text);
            ConnectorError::ParseError(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{AccountType, Credentials};

    fn test_config(rest_url: &str) -> BitfinexConfig {
        BitfinexConfig::new(Credentials::new("test_key", "test_secret"), AccountType::Cash)
            .with_rest_url(rest_url)
            .with_public_url(rest_url)
    }

    #[tokio::test]
    async fn test_signed_request_attaches_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/auth/r/orders")
            .match_header("bfx-apikey", "test_key")
            .match_header("bfx-nonce", mockito::Matcher::Regex(r"^\d+$".to_string()))
            .match_header(
                "bfx-signature",
                mockito::Matcher::Regex(r"^[0-9a-f]{96}$".to_string()),
            )
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = BitfinexRestClient::new(test_config(&server.url())).unwrap();
        let result: Vec<serde_json::Value> = client
            .signed_post("auth/r/orders", &serde_json::json!({}))
            .await
            .unwrap();

        assert!(result.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_carries_venue_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v2/auth/r/wallets")
            .with_status(500)
            .with_body(r#"["error",10100,"apikey: invalid"]"#)
            .create_async()
            .await;

        let client = BitfinexRestClient::new(test_config(&server.url())).unwrap();
        let err = client
            .execute("auth/r/wallets", Method::POST, &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ConnectorError::RequestFailed { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("10100"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_public_get_builds_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/candles/trade:1h:tBTCUSD/hist")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("limit".into(), "1000".into()),
                mockito::Matcher::UrlEncoded("sort".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = BitfinexRestClient::new(test_config(&server.url())).unwrap();
        let result: Vec<serde_json::Value> = client
            .public_get(
                "candles/trade:1h:tBTCUSD/hist",
                &[("limit", "1000".to_string()), ("sort", "1".to_string())],
            )
            .await
            .unwrap();

        assert!(result.is_empty());
        mock.assert_async().await;
    }
}
