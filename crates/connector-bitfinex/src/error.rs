//! 커넥터 에러 타입.

use thiserror::Error;

/// 커넥터 관련 에러.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 거래소 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 비정상 HTTP 응답 (거래소 원본 본문 포함)
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 자격증명 누락
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 단일 거래소 ID가 아닌 주문은 갱신 불가
    #[error("Order has {0} brokerage ids, update requires exactly one")]
    AmbiguousBrokerId(usize),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 커넥터 작업을 위한 Result 타입.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

impl ConnectorError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 판단은 호출자 몫입니다. 커넥터는 비멱등 작업(주문 제출)을
    /// 내부에서 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::NetworkError(_)
                | ConnectorError::Disconnected(_)
                | ConnectorError::Timeout(_)
                | ConnectorError::WebSocket(_)
        )
    }

    /// 재시도하면 안 되는 치명적 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectorError::Unauthorized(_)
                | ConnectorError::MissingCredentials(_)
                | ConnectorError::SymbolNotFound(_)
                | ConnectorError::OrderRejected(_)
                | ConnectorError::AmbiguousBrokerId(_)
        )
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectorError::Timeout(err.to_string())
        } else if err.is_connect() {
            ConnectorError::NetworkError(err.to_string())
        } else {
            ConnectorError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::ParseError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectorError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ConnectorError::WebSocket(err.to_string())
    }
}

impl From<connector_core::ConfigError> for ConnectorError {
    fn from(err: connector_core::ConfigError) -> Self {
        ConnectorError::MissingCredentials(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ConnectorError::NetworkError("reset".into()).is_retryable());
        assert!(ConnectorError::Timeout("auth".into()).is_retryable());
        assert!(!ConnectorError::SymbolNotFound("XYZ/USD".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ConnectorError::Unauthorized("bad key".into()).is_fatal());
        assert!(ConnectorError::AmbiguousBrokerId(2).is_fatal());
        assert!(!ConnectorError::Disconnected("closed".into()).is_fatal());
    }

    #[test]
    fn test_request_failed_carries_venue_body() {
        let err = ConnectorError::RequestFailed {
            status: 500,
            body: "[\"error\",10100,\"apikey: invalid\"]".into(),
        };
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("10100"));
    }
}
