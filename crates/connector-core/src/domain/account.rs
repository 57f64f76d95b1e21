//! 계좌 보유 자산 및 현금 잔고 타입.

use crate::types::{Price, Quantity, Symbol};
use serde::{Deserialize, Serialize};

/// 보유 포지션.
///
/// 수량은 부호 있는 값입니다: 양수 = 롱, 음수 = 숏.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// 상품 심볼
    pub symbol: Symbol,
    /// 부호 있는 보유 수량
    pub quantity: Quantity,
    /// 평균 진입 가격
    pub average_price: Price,
}

impl Holding {
    /// 새 보유 포지션을 생성합니다.
    pub fn new(symbol: Symbol, quantity: Quantity, average_price: Price) -> Self {
        Self {
            symbol,
            quantity,
            average_price,
        }
    }
}

/// 통화별 현금 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAmount {
    /// 통화 코드 (예: "BTC", "USD")
    pub currency: String,
    /// 부호 있는 잔고
    pub amount: Quantity,
}

impl CashAmount {
    /// 새 현금 잔고를 생성합니다.
    pub fn new(currency: impl Into<String>, amount: Quantity) -> Self {
        Self {
            currency: currency.into().to_uppercase(),
            amount,
        }
    }
}
