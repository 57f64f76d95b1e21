//! 브로커리지 trait 정의.

use async_trait::async_trait;
use connector_core::{CashAmount, Holding, Order, OrderEvent};
use rust_decimal::Decimal;

use crate::error::ConnectorResult;

/// 호스트(알고리즘 엔진)가 보는 브로커리지 인터페이스.
///
/// 주문 제출/갱신/취소는 비동기 ack 모델입니다: 호출이 성공해도 주문은
/// 아직 수락된 것이 아니며, 결과는 [`next_order_event`](Self::next_order_event)
/// 로 흘러옵니다.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// 브로커리지 이름 반환.
    fn name(&self) -> &str;

    /// 연결 여부 확인.
    fn is_connected(&self) -> bool;

    /// 연결 및 인증.
    async fn connect(&mut self) -> ConnectorResult<()>;

    /// 연결 해제.
    async fn disconnect(&mut self) -> ConnectorResult<()>;

    // === 주문 작업 ===
    //
    // 반환값은 "요청이 거래소로 나갔는가"입니다. Ok(false)는 보낼 것이
    // 없어 보내지 않았다는 뜻이고(예: ack 전 취소), 에러는 전송 실패나
    // 설정 오류입니다.

    /// 새 주문 제출.
    async fn place_order(&self, order: &Order) -> ConnectorResult<bool>;

    /// 미체결 주문의 수량/가격 수정.
    ///
    /// 거래소 ID가 아직 없으면 보낼 대상이 없으므로 `Ok(false)`,
    /// 여러 개면 모호성 에러입니다.
    async fn update_order(
        &self,
        order: &Order,
        quantity: Option<Decimal>,
        price: Option<Decimal>,
    ) -> ConnectorResult<bool>;

    /// 주문 취소. ack 전이면 취소할 것이 없으므로 `Ok(false)`.
    async fn cancel_order(&self, order: &Order) -> ConnectorResult<bool>;

    /// 미체결 주문 조회 (거래소 측과 대사 포함).
    async fn get_open_orders(&self) -> ConnectorResult<Vec<Order>>;

    // === 계정 작업 ===

    /// 보유 종목 조회.
    async fn get_holdings(&self) -> ConnectorResult<Vec<Holding>>;

    /// 현금 잔고 조회.
    async fn get_cash_balances(&self) -> ConnectorResult<Vec<CashAmount>>;

    // === 이벤트 ===

    /// 다음 주문 이벤트를 꺼냅니다.
    async fn next_order_event(&mut self) -> Option<OrderEvent>;
}
