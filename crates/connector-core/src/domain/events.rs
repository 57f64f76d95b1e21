//! 호스트 통지 이벤트 타입.
//!
//! 커넥터는 주문 상태 변경을 `OrderEvent`로, 경고/에러를
//! `BrokerageMessage`로 호스트 메시지 채널에 내보냅니다.

use crate::domain::order::OrderStatusKind;
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 상태 변경 통지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// 호스트 주문 ID
    pub order_id: i64,
    /// 변경 후 상태
    pub status: OrderStatusKind,
    /// 이번 이벤트의 체결 수량 (체결 이벤트가 아니면 0)
    pub fill_quantity: Quantity,
    /// 이번 이벤트의 체결 가격
    pub fill_price: Option<Price>,
    /// 부가 설명 (거부 사유 등)
    pub message: Option<String>,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    /// 상태 변경만 담은 이벤트를 생성합니다.
    pub fn status_change(order_id: i64, status: OrderStatusKind) -> Self {
        Self {
            order_id,
            status,
            fill_quantity: Decimal::ZERO,
            fill_price: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// 체결 이벤트를 생성합니다.
    pub fn fill(
        order_id: i64,
        status: OrderStatusKind,
        fill_quantity: Quantity,
        fill_price: Price,
    ) -> Self {
        Self {
            order_id,
            status,
            fill_quantity,
            fill_price: Some(fill_price),
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// 부가 설명을 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 메시지 심각도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSeverity {
    /// 정보성
    Info,
    /// 경고 (작업은 계속됨)
    Warning,
    /// 에러
    Error,
}

/// 호스트 메시지 채널로 내보내는 구조화된 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerageMessage {
    /// 심각도
    pub severity: MessageSeverity,
    /// 메시지 코드 (거래소 원본 코드 또는 내부 코드)
    pub code: String,
    /// 메시지 본문
    pub text: String,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl BrokerageMessage {
    /// 정보 메시지를 생성합니다.
    pub fn info(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageSeverity::Info, code, text)
    }

    /// 경고 메시지를 생성합니다.
    pub fn warning(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageSeverity::Warning, code, text)
    }

    /// 에러 메시지를 생성합니다.
    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageSeverity::Error, code, text)
    }

    fn new(
        severity: MessageSeverity,
        code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
