//! Bitfinex 클라이언트 설정.

use connector_core::{AccountType, ConfigError, Credentials};

/// 인증 REST API 기본 URL.
const REST_URL: &str = "https://api.bitfinex.com";

/// 공개 REST API 기본 URL (캔들 등).
const PUBLIC_URL: &str = "https://api-pub.bitfinex.com";

/// WebSocket API URL.
const WS_URL: &str = "wss://api.bitfinex.com/ws/2";

/// Bitfinex 클라이언트 설정.
///
/// 기본 URL은 테스트에서 mock 서버로 교체할 수 있습니다.
#[derive(Debug, Clone)]
pub struct BitfinexConfig {
    /// API 자격증명
    pub credentials: Credentials,
    /// 계좌 유형 (현물/마진)
    pub account_type: AccountType,
    /// 인증 REST 기본 URL
    pub rest_url: String,
    /// 공개 REST 기본 URL
    pub public_url: String,
    /// WebSocket URL
    pub ws_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl BitfinexConfig {
    /// 새 설정을 생성합니다.
    pub fn new(credentials: Credentials, account_type: AccountType) -> Self {
        Self {
            credentials,
            account_type,
            rest_url: REST_URL.to_string(),
            public_url: PUBLIC_URL.to_string(),
            ws_url: WS_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// 환경 변수에서 생성합니다.
    ///
    /// # Errors
    /// 자격증명 환경 변수가 없으면 `ConfigError::MissingCredentials`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Credentials::from_env()?;
        let account_type = std::env::var("BITFINEX_ACCOUNT_TYPE")
            .ok()
            .and_then(|s| AccountType::parse(&s))
            .unwrap_or_default();

        Ok(Self::new(credentials, account_type))
    }

    /// 인증 REST 기본 URL을 교체합니다 (테스트용).
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    /// 공개 REST 기본 URL을 교체합니다 (테스트용).
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// WebSocket URL을 교체합니다.
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }
}
