//! 주문 타입 및 상태.
//!
//! 이 모듈은 호스트와 커넥터가 공유하는 주문 관련 타입을 정의합니다:
//! - `OrderType` - 주문 유형 (시장가, 지정가, 스톱)
//! - `OrderStatusKind` - 주문 상태
//! - `Order` - 호스트 소유 주문의 캐시 미러
//!
//! 커넥터는 호스트의 권위 있는 주문 레코드를 소유하지 않습니다.
//! 여기의 `Order`는 캐시된 미러이며, 상태 변경은 `OrderEvent`로
//! 호스트에 통지되어 호스트 측에서 조정됩니다.

use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 유형.
///
/// 거래소가 지원하는 유형 중 커넥터가 노출하는 닫힌 집합입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문 - 현재 시장 가격으로 즉시 체결
    Market,
    /// 지정가 주문 - 지정 가격 이상/이하에서 체결
    Limit,
    /// 스톱 주문 - 트리거 가격 도달 시 시장가로 체결
    StopMarket,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::StopMarket => write!(f, "STOP_MARKET"),
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusKind {
    /// 주문 생성됨 (아직 제출되지 않음)
    New,
    /// 거래소에 제출됨 (미체결)
    Submitted,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
    /// 거래소에서 거부됨
    Invalid,
    /// 결과 불명 (세션 단절 시 미확인 주문)
    Unknown,
}

impl OrderStatusKind {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatusKind::Filled | OrderStatusKind::Cancelled | OrderStatusKind::Invalid
        )
    }

    /// 주문이 여전히 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatusKind::New | OrderStatusKind::Submitted | OrderStatusKind::PartiallyFilled
        )
    }
}

impl std::fmt::Display for OrderStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusKind::New => write!(f, "new"),
            OrderStatusKind::Submitted => write!(f, "submitted"),
            OrderStatusKind::PartiallyFilled => write!(f, "partially_filled"),
            OrderStatusKind::Filled => write!(f, "filled"),
            OrderStatusKind::Cancelled => write!(f, "cancelled"),
            OrderStatusKind::Invalid => write!(f, "invalid"),
            OrderStatusKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// 호스트 주문의 캐시 미러.
///
/// 수량은 부호 있는 값입니다: 양수 = 매수, 음수 = 매도.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// 호스트 주문 ID
    pub id: i64,
    /// 심볼
    pub symbol: Symbol,
    /// 부호 있는 주문 수량 (양수: 매수, 음수: 매도)
    pub quantity: Quantity,
    /// 주문 유형
    pub order_type: OrderType,
    /// 지정가 또는 스톱 트리거 가격 (시장가는 None)
    pub price: Option<Price>,
    /// 거래소가 부여한 주문 ID 목록
    pub broker_ids: Vec<String>,
    /// 현재 상태
    pub status: OrderStatusKind,
    /// 체결된 수량 (절대값)
    pub filled_quantity: Quantity,
    /// 평균 체결 가격
    pub average_fill_price: Option<Price>,
    /// 히든 주문 여부
    pub hidden: bool,
    /// 포스트온리 주문 여부
    pub post_only: bool,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 새 주문 미러를 생성합니다.
    pub fn new(id: i64, symbol: Symbol, quantity: Quantity, order_type: OrderType) -> Self {
        let now = Utc::now();
        Self {
            id,
            symbol,
            quantity,
            order_type,
            price: None,
            broker_ids: Vec::new(),
            status: OrderStatusKind::New,
            filled_quantity: Decimal::ZERO,
            average_fill_price: None,
            hidden: false,
            post_only: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 시장가 주문을 생성합니다.
    pub fn market(id: i64, symbol: Symbol, quantity: Quantity) -> Self {
        Self::new(id, symbol, quantity, OrderType::Market)
    }

    /// 지정가 주문을 생성합니다.
    pub fn limit(id: i64, symbol: Symbol, quantity: Quantity, price: Price) -> Self {
        let mut order = Self::new(id, symbol, quantity, OrderType::Limit);
        order.price = Some(price);
        order
    }

    /// 스톱 주문을 생성합니다.
    pub fn stop_market(id: i64, symbol: Symbol, quantity: Quantity, stop_price: Price) -> Self {
        let mut order = Self::new(id, symbol, quantity, OrderType::StopMarket);
        order.price = Some(stop_price);
        order
    }

    /// 히든 플래그를 설정합니다.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// 포스트온리 플래그를 설정합니다.
    pub fn with_post_only(mut self, post_only: bool) -> Self {
        self.post_only = post_only;
        self
    }

    /// 매수 주문 여부.
    pub fn is_buy(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// 절대 수량을 반환합니다.
    pub fn abs_quantity(&self) -> Quantity {
        self.quantity.abs()
    }

    /// 미체결 잔량을 반환합니다.
    pub fn remaining_quantity(&self) -> Quantity {
        self.abs_quantity() - self.filled_quantity
    }

    /// 거래소 주문 ID를 추가합니다 (중복 무시).
    pub fn add_broker_id(&mut self, broker_id: impl Into<String>) {
        let broker_id = broker_id.into();
        if !self.broker_ids.contains(&broker_id) {
            self.broker_ids.push(broker_id);
        }
    }
}
