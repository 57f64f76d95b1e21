//! 커넥터 설정 관리.
//!
//! API 자격증명은 환경 변수에서 읽습니다. 자격증명 부재는 시작 에러이며
//! 절대 조용히 넘어가지 않습니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 설정 에러.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// API 자격증명 누락
    #[error("Missing credentials: {0} is not set")]
    MissingCredentials(&'static str),
}

/// 계좌 유형.
///
/// 유형에 따라 사용 지갑과 거래소 주문 유형 토큰이 달라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// 현물 계좌
    Cash,
    /// 마진 계좌
    Margin,
}

impl AccountType {
    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" | "exchange" | "spot" => Some(AccountType::Cash),
            "margin" => Some(AccountType::Margin),
            _ => None,
        }
    }
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::Cash
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Cash => write!(f, "cash"),
            AccountType::Margin => write!(f, "margin"),
        }
    }
}

/// API 자격증명.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone)]
pub struct Credentials {
    /// API 키 (공개 키)
    pub api_key: String,
    /// API 시크릿
    api_secret: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("Credentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

impl Credentials {
    /// 새 자격증명을 생성합니다.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
        }
    }

    /// 환경 변수에서 생성합니다.
    ///
    /// # Errors
    /// `BITFINEX_API_KEY` 또는 `BITFINEX_API_SECRET`이 없으면
    /// `ConfigError::MissingCredentials`를 반환합니다.
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env 파일이 있으면 로드 (없으면 무시)
        let _ = dotenvy::dotenv();

        let api_key = std::env::var("BITFINEX_API_KEY")
            .map_err(|_| ConfigError::MissingCredentials("BITFINEX_API_KEY"))?;
        let api_secret = std::env::var("BITFINEX_API_SECRET")
            .map_err(|_| ConfigError::MissingCredentials("BITFINEX_API_SECRET"))?;

        Ok(Self::new(api_key, api_secret))
    }

    /// API 시크릿을 노출합니다 (서명 계산 전용).
    pub fn expose_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_credentials() {
        let creds = Credentials::new("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zv", "super_secret");
        let debug = format!("{:?}", creds);

        assert!(!debug.contains("super_secret"));
        assert!(!debug.contains("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zv"));
        assert!(debug.contains("vmPU"));
        assert!(debug.contains("E2zv"));
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!(AccountType::parse("cash"), Some(AccountType::Cash));
        assert_eq!(AccountType::parse("MARGIN"), Some(AccountType::Margin));
        assert_eq!(AccountType::parse("futures"), None);
    }
}
