//! Bitfinex 브로커리지 파사드.
//!
//! REST 클라이언트, 스트림 세션, 주문 추적기, 계정 조회를 한데 묶어
//! [`Brokerage`] 계약을 구현합니다. 스트림 이벤트는 펌프 태스크가
//! 소비해 주문 이벤트/메시지 채널로 환원하고, 연결이 끊기면 백오프
//! 재연결과 주문 대사를 수행합니다.

use crate::account::{cash_balances, holdings, report_to_order, BitfinexAccount};
use crate::config::BitfinexConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::history::{BarSeries, BitfinexHistory};
use crate::messages::{command, envelope, StreamMessage};
use crate::orders::{cancel_order_payload, new_order_payload, parse_order_status, update_order_payload};
use crate::rest::BitfinexRestClient;
use crate::session::{reconnect_delay, BitfinexSession, SessionEvent};
use crate::symbol_map::{BitfinexSymbolMap, SymbolMapper};
use crate::tracker::OrderTracker;
use crate::traits::Brokerage;
use async_trait::async_trait;
use connector_core::{
    AccountType, BrokerageMessage, CashAmount, HistoryRequest, Holding, Order, OrderEvent,
    OrderStatusKind,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// 스트림 메시지 하나를 주문 이벤트/메시지로 환원합니다.
///
/// 소켓 없이 호출 가능한 순수 분배 함수입니다. 추적되지 않는 주문의
/// 보고(다른 세션 소유)는 경고 메시지로 호스트에 알리고 건너뜁니다.
pub(crate) fn dispatch_stream_message(
    tracker: &OrderTracker,
    mapper: &dyn SymbolMapper,
    message: StreamMessage,
) -> (Vec<OrderEvent>, Vec<BrokerageMessage>) {
    let mut events = Vec::new();
    let mut messages = Vec::new();

    match message {
        StreamMessage::OrderNew(report)
        | StreamMessage::OrderUpdate(report)
        | StreamMessage::OrderCancel(report) => {
            let status = parse_order_status(&report.status);
            if let Some(order) = tracker.apply_report(&report, status) {
                events.push(OrderEvent::status_change(order.id, order.status));
            } else if tracker.get_by_venue_id(report.order_id).is_none() {
                // 추적 테이블에 없는 주문 (다른 세션이나 웹 UI에서 낸 것)
                warn!(
                    venue_id = report.order_id,
                    cid = ?report.client_id,
                    "Order report matched no tracked order"
                );
                messages.push(BrokerageMessage::warning(
                    "UnmatchedOrderEvent",
                    format!(
                        "Order report for venue id {} matched no tracked order",
                        report.order_id
                    ),
                ));
            }
        }
        StreamMessage::TradeUpdate(trade) => {
            if let Some(order) = tracker.apply_trade(&trade) {
                events.push(OrderEvent::fill(
                    order.id,
                    order.status,
                    trade.exec_amount.abs(),
                    trade.exec_price,
                ));
            } else {
                warn!(
                    venue_id = trade.order_id,
                    trade_id = trade.trade_id,
                    "Fill matched no tracked order"
                );
                messages.push(BrokerageMessage::warning(
                    "UnmatchedOrderEvent",
                    format!(
                        "Fill for venue order id {} matched no tracked order",
                        trade.order_id
                    ),
                ));
            }
        }
        StreamMessage::Notification(notification) => {
            if notification.is_error() {
                let rejected = notification
                    .order
                    .as_ref()
                    .and_then(|o| o.client_id)
                    .and_then(|cid| tracker.reject(cid));
                if let Some(order) = rejected {
                    events.push(
                        OrderEvent::status_change(order.id, OrderStatusKind::Invalid)
                            .with_message(notification.text.clone()),
                    );
                }
                messages.push(BrokerageMessage::warning(
                    notification.kind,
                    notification.text,
                ));
            } else {
                debug!(kind = %notification.kind, "Notification: {}", notification.text);
            }
        }
        StreamMessage::OrderSnapshot(reports) => {
            let pairs = reports
                .iter()
                .filter_map(|report| {
                    let order = report_to_order(report, mapper)?;
                    Some((report.clone(), order))
                })
                .collect();
            let adopted = tracker.merge_open_orders(pairs);
            if !adopted.is_empty() {
                info!(count = adopted.len(), "Adopted open orders from snapshot");
            }
        }
        StreamMessage::ErrorEvent { code, message } => {
            messages.push(BrokerageMessage::error(code.to_string(), message));
        }
        StreamMessage::AuthAck { .. } | StreamMessage::Heartbeat | StreamMessage::Ignored => {}
    }

    (events, messages)
}

/// Bitfinex 브로커리지.
pub struct BitfinexBrokerage {
    config: BitfinexConfig,
    rest: Arc<BitfinexRestClient>,
    session: Arc<Mutex<BitfinexSession>>,
    tracker: Arc<OrderTracker>,
    mapper: Arc<BitfinexSymbolMap>,
    account: BitfinexAccount,
    history: BitfinexHistory,
    order_event_tx: mpsc::Sender<OrderEvent>,
    order_event_rx: mpsc::Receiver<OrderEvent>,
    message_tx: mpsc::Sender<BrokerageMessage>,
    message_rx: mpsc::Receiver<BrokerageMessage>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl BitfinexBrokerage {
    pub fn new(config: BitfinexConfig) -> ConnectorResult<Self> {
        let rest = Arc::new(BitfinexRestClient::new(config.clone())?);
        let session = Arc::new(Mutex::new(BitfinexSession::new(config.clone())));
        let (order_event_tx, order_event_rx) = mpsc::channel(1000);
        let (message_tx, message_rx) = mpsc::channel(1000);

        Ok(Self {
            config,
            account: BitfinexAccount::new(Arc::clone(&rest)),
            history: BitfinexHistory::new(Arc::clone(&rest)),
            rest,
            session,
            tracker: Arc::new(OrderTracker::new()),
            mapper: Arc::new(BitfinexSymbolMap::new()),
            order_event_tx,
            order_event_rx,
            message_tx,
            message_rx,
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// 환경 변수에서 설정을 읽어 생성합니다.
    pub fn from_env() -> ConnectorResult<Self> {
        Self::new(BitfinexConfig::from_env()?)
    }

    /// 과거 캔들 조회. 제공 불가 형태는 경고 후 `Ok(None)`.
    pub fn get_history(&self, request: &HistoryRequest) -> ConnectorResult<Option<BarSeries>> {
        self.history.get_history(request, &*self.mapper)
    }

    /// 다음 브로커리지 메시지(경고/에러)를 꺼냅니다.
    pub async fn next_message(&mut self) -> Option<BrokerageMessage> {
        self.message_rx.recv().await
    }

    fn ensure_connected(&self) -> ConnectorResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectorError::Disconnected(
                "Brokerage is not connected".to_string(),
            ))
        }
    }

    /// 거래소 미체결 주문과 로컬 테이블을 대사합니다.
    async fn reconcile_open_orders(&self) -> ConnectorResult<Vec<Order>> {
        let reports = self.account.open_orders(&*self.mapper).await?;
        let adopted = self.tracker.merge_open_orders(reports);
        if !adopted.is_empty() {
            info!(count = adopted.len(), "Adopted open orders from venue");
        }
        Ok(self.tracker.open_orders())
    }

    /// 세션 이벤트 펌프를 띄웁니다.
    fn spawn_event_pump(&self, mut events: mpsc::Receiver<SessionEvent>) {
        let session = Arc::clone(&self.session);
        let tracker = Arc::clone(&self.tracker);
        let mapper = Arc::clone(&self.mapper);
        let rest = Arc::clone(&self.rest);
        let order_tx = self.order_event_tx.clone();
        let message_tx = self.message_tx.clone();
        let connected = Arc::clone(&self.connected);
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Message(message) => {
                        let (order_events, messages) =
                            dispatch_stream_message(&tracker, &*mapper, message);
                        for event in order_events {
                            if order_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        for message in messages {
                            let _ = message_tx.send(message).await;
                        }
                    }
                    SessionEvent::Disconnected { reason } => {
                        connected.store(false, Ordering::SeqCst);
                        if shutdown.load(Ordering::SeqCst) {
                            debug!("Session closed after shutdown");
                            return;
                        }

                        warn!("Stream disconnected: {}", reason);
                        let _ = message_tx
                            .send(BrokerageMessage::warning("Disconnected", reason))
                            .await;

                        // 전송 후 ack를 못 받은 주문은 결과 불명
                        for order in tracker.mark_pending_unknown() {
                            let event =
                                OrderEvent::status_change(order.id, OrderStatusKind::Unknown)
                                    .with_message("Connection lost while order was in flight");
                            let _ = order_tx.send(event).await;
                        }

                        if !reconnect_loop(&session, &shutdown, &message_tx).await {
                            return;
                        }
                        connected.store(true, Ordering::SeqCst);
                        let _ = message_tx
                            .send(BrokerageMessage::info("Reconnected", "Stream re-established"))
                            .await;

                        // 끊긴 사이의 체결/취소를 REST로 따라잡기
                        let account = BitfinexAccount::new(Arc::clone(&rest));
                        match account.open_orders(&*mapper).await {
                            Ok(reports) => {
                                let adopted = tracker.merge_open_orders(reports);
                                if !adopted.is_empty() {
                                    info!(
                                        count = adopted.len(),
                                        "Adopted open orders after reconnect"
                                    );
                                }
                            }
                            Err(e) => {
                                warn!("Open order reconciliation failed: {}", e);
                            }
                        }
                    }
                }
            }
        });
    }
}

/// 백오프 재연결. 성공하면 true, 치명적 실패나 종료 요청이면 false.
async fn reconnect_loop(
    session: &Mutex<BitfinexSession>,
    shutdown: &AtomicBool,
    message_tx: &mpsc::Sender<BrokerageMessage>,
) -> bool {
    for attempt in 0u32.. {
        tokio::time::sleep(reconnect_delay(attempt)).await;
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }

        let mut session = session.lock().await;
        session.reset();
        match session.connect().await {
            Ok(()) => {
                if let Err(e) = session.run() {
                    error!("Failed to start session tasks: {}", e);
                    continue;
                }
                return true;
            }
            Err(e) if e.is_fatal() => {
                error!("Reconnect failed fatally: {}", e);
                let _ = message_tx
                    .send(BrokerageMessage::error("ReconnectFailed", e.to_string()))
                    .await;
                return false;
            }
            Err(e) => {
                warn!(attempt, "Reconnect attempt failed: {}", e);
            }
        }
    }
    false
}

#[async_trait]
impl Brokerage for BitfinexBrokerage {
    fn name(&self) -> &str {
        "Bitfinex"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&mut self) -> ConnectorResult<()> {
        self.shutdown.store(false, Ordering::SeqCst);

        let events = {
            let mut session = self.session.lock().await;
            session.reset();
            session.connect().await?;
            session.run()?;
            session.take_events()
        };
        self.connected.store(true, Ordering::SeqCst);

        // 수신기는 세션 생애 동안 하나뿐이므로 펌프도 한 번만 뜸
        if let Some(events) = events {
            self.spawn_event_pump(events);
        }

        self.reconcile_open_orders().await?;
        info!(account_type = %self.config.account_type, "Bitfinex brokerage connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> ConnectorResult<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.session.lock().await.reset();
        info!("Bitfinex brokerage disconnected");
        Ok(())
    }

    async fn place_order(&self, order: &Order) -> ConnectorResult<bool> {
        self.ensure_connected()?;
        let ticker = self.mapper.to_venue(&order.symbol)?;

        let cid = self.tracker.next_cid();
        self.tracker.register(cid, order.clone());

        let payload = new_order_payload(cid, &ticker, order, self.config.account_type);
        debug!(cid, order_id = order.id, %ticker, "Placing order");
        self.session
            .lock()
            .await
            .send_command(envelope(command::NEW, payload))
            .await?;
        Ok(true)
    }

    async fn update_order(
        &self,
        order: &Order,
        quantity: Option<Decimal>,
        price: Option<Decimal>,
    ) -> ConnectorResult<bool> {
        self.ensure_connected()?;

        let venue_ids = self.tracker.venue_ids_for_host(order.id);
        let venue_id = match venue_ids.as_slice() {
            [id] => *id,
            [] => {
                warn!(order_id = order.id, "Update before venue ack, nothing to modify");
                return Ok(false);
            }
            many => return Err(ConnectorError::AmbiguousBrokerId(many.len())),
        };

        debug!(order_id = order.id, venue_id, "Updating order");
        self.session
            .lock()
            .await
            .send_command(envelope(
                command::UPDATE,
                update_order_payload(venue_id, quantity, price),
            ))
            .await?;
        Ok(true)
    }

    async fn cancel_order(&self, order: &Order) -> ConnectorResult<bool> {
        self.ensure_connected()?;

        let venue_ids = self.tracker.venue_ids_for_host(order.id);
        if venue_ids.is_empty() {
            // ack 전이라 거래소에는 아직 취소할 것이 없음
            warn!(order_id = order.id, "Cancel before venue ack, order not yet submitted");
            return Ok(false);
        }

        let session = self.session.lock().await;
        for venue_id in venue_ids {
            debug!(order_id = order.id, venue_id, "Cancelling order");
            session
                .send_command(envelope(command::CANCEL, cancel_order_payload(venue_id)))
                .await?;
        }
        Ok(true)
    }

    async fn get_open_orders(&self) -> ConnectorResult<Vec<Order>> {
        self.reconcile_open_orders().await
    }

    async fn get_holdings(&self) -> ConnectorResult<Vec<Holding>> {
        let positions = if self.config.account_type == AccountType::Margin {
            self.account.positions().await?
        } else {
            Vec::new()
        };
        Ok(holdings(self.config.account_type, &positions, &*self.mapper))
    }

    async fn get_cash_balances(&self) -> ConnectorResult<Vec<CashAmount>> {
        let wallets = self.account.wallets().await?;
        let positions = if self.config.account_type == AccountType::Margin {
            self.account.positions().await?
        } else {
            Vec::new()
        };
        Ok(cash_balances(
            self.config.account_type,
            &wallets,
            &positions,
            &*self.mapper,
        ))
    }

    async fn next_order_event(&mut self) -> Option<OrderEvent> {
        self.order_event_rx.recv().await
    }
}
