//! 주문 유형/상태 매핑과 주문 커맨드 페이로드 빌더.
//!
//! Bitfinex는 현물 지갑 주문에 `EXCHANGE ` 접두 토큰을, 마진 주문에
//! 민짜 토큰을 사용합니다. 계정 유형에 따라 같은 주문 유형이 다른
//! 토큰으로 직렬화됩니다.

use connector_core::{AccountType, Order, OrderStatusKind, OrderType};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::warn;

/// hidden 주문 플래그.
pub const FLAG_HIDDEN: i64 = 64;
/// post-only 주문 플래그.
pub const FLAG_POST_ONLY: i64 = 4096;

/// 주문 유형을 거래소 토큰으로 변환합니다.
pub fn order_type_token(order_type: OrderType, account_type: AccountType) -> &'static str {
    match (account_type, order_type) {
        (AccountType::Cash, OrderType::Market) => "EXCHANGE MARKET",
        (AccountType::Cash, OrderType::Limit) => "EXCHANGE LIMIT",
        (AccountType::Cash, OrderType::StopMarket) => "EXCHANGE STOP",
        (AccountType::Margin, OrderType::Market) => "MARKET",
        (AccountType::Margin, OrderType::Limit) => "LIMIT",
        (AccountType::Margin, OrderType::StopMarket) => "STOP",
    }
}

/// 거래소 토큰을 주문 유형으로 역변환합니다.
///
/// `EXCHANGE ` 접두를 벗긴 뒤 매칭하므로 현물/마진 토큰을 동일하게
/// 처리합니다. 지원하지 않는 토큰(TRAILING STOP, FOK 등)은 경고 후 None.
pub fn parse_order_type(token: &str) -> Option<OrderType> {
    let bare = token.strip_prefix("EXCHANGE ").unwrap_or(token);
    match bare {
        "MARKET" => Some(OrderType::Market),
        "LIMIT" => Some(OrderType::Limit),
        "STOP" => Some(OrderType::StopMarket),
        other => {
            warn!(token = other, "Unsupported order type token, skipping order");
            None
        }
    }
}

/// 거래소 상태 문자열을 상태 종류로 변환합니다.
///
/// Bitfinex 상태는 `"EXECUTED @ 8010.5(0.1)"`처럼 가격/수량 꼬리가
/// 붙으므로 접두 매칭으로 분류합니다.
pub fn parse_order_status(status: &str) -> OrderStatusKind {
    let upper = status.to_uppercase();
    if upper.starts_with("ACTIVE") {
        OrderStatusKind::Submitted
    } else if upper.starts_with("PARTIALLY FILLED") {
        OrderStatusKind::PartiallyFilled
    } else if upper.starts_with("EXECUTED") {
        OrderStatusKind::Filled
    } else if upper.contains("CANCELED") {
        // "CANCELED", "POSTONLY CANCELED", "INSUFFICIENT MARGIN was: PARTIALLY FILLED" 제외
        OrderStatusKind::Cancelled
    } else if upper.starts_with("RSN_") || upper.starts_with("INSUFFICIENT") {
        OrderStatusKind::Invalid
    } else {
        warn!(status, "Unrecognized order status string");
        OrderStatusKind::Unknown
    }
}

/// Decimal을 거래소가 기대하는 문자열 표기로 변환합니다.
fn amount_str(value: Decimal) -> String {
    value.normalize().to_string()
}

/// 신규 주문(`on`) 페이로드를 만듭니다.
///
/// amount 부호가 방향입니다 (양수 매수, 음수 매도). hidden/post-only는
/// 플래그 비트 합으로 실립니다.
pub fn new_order_payload(
    cid: i64,
    ticker: &str,
    order: &Order,
    account_type: AccountType,
) -> Value {
    let mut payload = json!({
        "cid": cid,
        "type": order_type_token(order.order_type, account_type),
        "symbol": ticker,
        "amount": amount_str(order.quantity),
    });

    if let Some(price) = order.price {
        payload["price"] = Value::String(amount_str(price));
    }

    let mut flags = 0i64;
    if order.hidden {
        flags |= FLAG_HIDDEN;
    }
    if order.post_only {
        flags |= FLAG_POST_ONLY;
    }
    if flags != 0 {
        payload["flags"] = json!(flags);
    }

    payload
}

/// 주문 갱신(`ou`) 페이로드를 만듭니다. 바꿀 필드만 싣습니다.
pub fn update_order_payload(
    venue_id: i64,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
) -> Value {
    let mut payload = json!({ "id": venue_id });
    if let Some(quantity) = quantity {
        payload["amount"] = Value::String(amount_str(quantity));
    }
    if let Some(price) = price {
        payload["price"] = Value::String(amount_str(price));
    }
    payload
}

/// 주문 취소(`oc`) 페이로드를 만듭니다.
pub fn cancel_order_payload(venue_id: i64) -> Value {
    json!({ "id": venue_id })
}
