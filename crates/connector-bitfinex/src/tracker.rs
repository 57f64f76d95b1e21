//! 주문 상관관계 추적기.
//!
//! 클라이언트 상관 ID(cid)를 발급하고, cid ↔ 거래소 주문 ID ↔ 호스트
//! 주문을 단일 뮤텍스 아래에서 묶어 관리합니다. 스트림 이벤트와 REST
//! 폴링 결과가 모두 이 테이블을 거쳐 호스트 주문 상태로 환원됩니다.

use crate::messages::{OrderReport, TradeReport};
use connector_core::{Order, OrderStatusKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// 추적 중인 주문 한 건.
#[derive(Debug, Clone)]
pub struct TrackedOrder {
    /// 호스트 주문 (상태/체결 누적치 포함)
    pub order: Order,
    /// 클라이언트 상관 ID
    pub cid: i64,
    /// 거래소 주문 ID (ack 전에는 None)
    pub venue_id: Option<i64>,
}

impl TrackedOrder {
    /// 전송 후 ack 대기 중인지 여부.
    pub fn is_pending(&self) -> bool {
        self.venue_id.is_none() && !self.order.status.is_final()
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    by_cid: HashMap<i64, TrackedOrder>,
    venue_to_cid: HashMap<i64, i64>,
}

/// 종결 주문 보존 상한.
///
/// 종결 항목은 지연 도착한 보고가 상태를 되돌리지 못하게 막는 가드로
/// 남겨두되, 세션이 오래 살아도 테이블이 무한히 자라지 않도록 상한을
/// 넘으면 가장 오래된 것부터 솎아냅니다.
const TERMINAL_RETENTION: usize = 1024;

fn prune_terminal(state: &mut TrackerState) {
    let mut terminal: Vec<(i64, chrono::DateTime<chrono::Utc>)> = state
        .by_cid
        .values()
        .filter(|t| t.order.status.is_final())
        .map(|t| (t.cid, t.order.updated_at))
        .collect();
    if terminal.len() <= TERMINAL_RETENTION {
        return;
    }

    // 동일 밀리초 안의 순서는 cid 증가 순으로 판정
    terminal.sort_by_key(|&(cid, at)| (at, cid));
    let excess = terminal.len() - TERMINAL_RETENTION;
    for (cid, _) in terminal.into_iter().take(excess) {
        if let Some(evicted) = state.by_cid.remove(&cid) {
            if let Some(venue_id) = evicted.venue_id {
                state.venue_to_cid.remove(&venue_id);
            }
        }
    }
}

/// 상관 ID 발급기 + 주문 테이블.
///
/// cid는 원자적으로 증가하며 프로세스 생애 동안 재사용되지 않습니다.
/// 밀리초 타임스탬프에서 시작해 재시작 간 충돌도 피합니다.
#[derive(Debug)]
pub struct OrderTracker {
    next_cid: AtomicI64,
    state: Mutex<TrackerState>,
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderTracker {
    pub fn new() -> Self {
        Self {
            next_cid: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// 새 상관 ID를 발급합니다.
    pub fn next_cid(&self) -> i64 {
        self.next_cid.fetch_add(1, Ordering::SeqCst)
    }

    /// 전송 직전의 주문을 등록합니다. ack가 오기 전까지 pending 상태입니다.
    pub fn register(&self, cid: i64, order: Order) {
        let mut state = self.state.lock().unwrap();
        state.by_cid.insert(
            cid,
            TrackedOrder {
                order,
                cid,
                venue_id: None,
            },
        );
    }

    /// cid로 주문을 조회합니다.
    pub fn get_by_cid(&self, cid: i64) -> Option<TrackedOrder> {
        self.state.lock().unwrap().by_cid.get(&cid).cloned()
    }

    /// 거래소 주문 ID로 주문을 조회합니다.
    pub fn get_by_venue_id(&self, venue_id: i64) -> Option<TrackedOrder> {
        let state = self.state.lock().unwrap();
        let cid = state.venue_to_cid.get(&venue_id)?;
        state.by_cid.get(cid).cloned()
    }

    /// 호스트 주문 ID로 거래소 주문 ID를 찾습니다.
    ///
    /// 동일 호스트 ID에 거래소 ID가 여러 개 매핑되면 모호성 에러 처리를
    /// 위해 개수를 반환합니다.
    pub fn venue_ids_for_host(&self, host_id: i64) -> Vec<i64> {
        let state = self.state.lock().unwrap();
        state
            .by_cid
            .values()
            .filter(|t| t.order.id == host_id)
            .filter_map(|t| t.venue_id)
            .collect()
    }

    /// 주문 보고를 반영하고 갱신된 주문 사본을 반환합니다.
    ///
    /// 거래소 ID 우선, 없으면 cid로 해석합니다. 어느 쪽으로도 찾지
    /// 못하면 None (외부 세션에서 낸 주문 등).
    pub fn apply_report(
        &self,
        report: &OrderReport,
        status: OrderStatusKind,
    ) -> Option<Order> {
        let mut state = self.state.lock().unwrap();

        let cid = state
            .venue_to_cid
            .get(&report.order_id)
            .copied()
            .or_else(|| {
                report
                    .client_id
                    .filter(|cid| state.by_cid.contains_key(cid))
            })?;

        // 최초 ack에서 거래소 ID를 연결
        state.venue_to_cid.insert(report.order_id, cid);

        let tracked = state.by_cid.get_mut(&cid)?;
        if tracked.venue_id.is_none() {
            tracked.venue_id = Some(report.order_id);
            tracked
                .order
                .add_broker_id(report.order_id.to_string());
            debug!(cid, venue_id = report.order_id, "Order acknowledged");
        }

        // 종결 상태는 되돌리지 않음 (지연 도착한 ACTIVE 등 무시)
        if tracked.order.status.is_final() && !status.is_final() {
            debug!(
                cid,
                ?status,
                current = ?tracked.order.status,
                "Stale order report ignored"
            );
            return None;
        }

        tracked.order.status = status;
        if let Some(avg) = report.price_avg.filter(|p| !p.is_zero()) {
            tracked.order.average_fill_price = Some(avg);
        }
        tracked.order.filled_quantity =
            (report.amount_orig - report.amount).abs();
        tracked.order.updated_at = chrono::Utc::now();

        let order = tracked.order.clone();
        if status.is_final() {
            prune_terminal(&mut state);
        }
        Some(order)
    }

    /// 체결 보고를 반영하고 갱신된 주문 사본을 반환합니다.
    pub fn apply_trade(&self, trade: &TradeReport) -> Option<Order> {
        let mut state = self.state.lock().unwrap();
        let cid = state.venue_to_cid.get(&trade.order_id).copied()?;
        let tracked = state.by_cid.get_mut(&cid)?;

        tracked.order.filled_quantity += trade.exec_amount.abs();
        if tracked.order.filled_quantity >= tracked.order.abs_quantity() {
            tracked.order.status = OrderStatusKind::Filled;
        } else if tracked.order.status.is_active() {
            tracked.order.status = OrderStatusKind::PartiallyFilled;
        }
        tracked.order.updated_at = chrono::Utc::now();

        let order = tracked.order.clone();
        if order.status.is_final() {
            prune_terminal(&mut state);
        }
        Some(order)
    }

    /// cid로 주문을 거부 처리합니다 (거부 알림 수신 시).
    pub fn reject(&self, cid: i64) -> Option<Order> {
        let mut state = self.state.lock().unwrap();
        let tracked = state.by_cid.get_mut(&cid)?;
        tracked.order.status = OrderStatusKind::Invalid;
        tracked.order.updated_at = chrono::Utc::now();
        let order = tracked.order.clone();
        prune_terminal(&mut state);
        Some(order)
    }

    /// 연결 단절 시 ack 대기 중인 주문을 전부 Unknown으로 전환합니다.
    ///
    /// 조용히 사라지는 주문이 없도록 전환된 주문 목록을 반환해
    /// 호스트에 이벤트로 흘려보냅니다.
    pub fn mark_pending_unknown(&self) -> Vec<Order> {
        let mut state = self.state.lock().unwrap();
        let mut orphaned = Vec::new();

        for tracked in state.by_cid.values_mut() {
            if tracked.is_pending() {
                warn!(
                    cid = tracked.cid,
                    "Order was in flight during disconnect, status unknown"
                );
                tracked.order.status = OrderStatusKind::Unknown;
                tracked.order.updated_at = chrono::Utc::now();
                orphaned.push(tracked.order.clone());
            }
        }

        orphaned
    }

    /// REST 미체결 주문 폴링 결과를 로컬 테이블과 병합합니다.
    ///
    /// 로컬에서 추적 중인 주문은 로컬 상태가 이기고, 거래소에만 있는
    /// 주문(다른 세션에서 낸 것)은 새로 편입됩니다. 편입된 주문 목록을
    /// 반환합니다.
    pub fn merge_open_orders(
        &self,
        reports: Vec<(OrderReport, Order)>,
    ) -> Vec<Order> {
        let mut state = self.state.lock().unwrap();
        let mut adopted = Vec::new();

        for (report, order) in reports {
            if state.venue_to_cid.contains_key(&report.order_id) {
                continue;
            }
            if let Some(cid) = report.client_id {
                if state.by_cid.contains_key(&cid) {
                    // 로컬 상관이 우선: ack로 처리하도록 남겨둠
                    continue;
                }
            }

            let cid = report
                .client_id
                .unwrap_or_else(|| self.next_cid.fetch_add(1, Ordering::SeqCst));
            state.venue_to_cid.insert(report.order_id, cid);
            state.by_cid.insert(
                cid,
                TrackedOrder {
                    order: order.clone(),
                    cid,
                    venue_id: Some(report.order_id),
                },
            );
            adopted.push(order);
        }

        adopted
    }

    /// 종결되지 않은 주문 목록.
    pub fn open_orders(&self) -> Vec<Order> {
        let state = self.state.lock().unwrap();
        state
            .by_cid
            .values()
            .filter(|t| !t.order.status.is_final())
            .map(|t| t.order.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::Symbol;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn limit_order(id: i64, qty: Decimal) -> Order {
        Order::limit(id, Symbol::crypto("BTC", "USD"), qty, dec!(30000))
    }

    fn report(venue_id: i64, cid: i64, remaining: Decimal, orig: Decimal) -> OrderReport {
        OrderReport {
            order_id: venue_id,
            client_id: Some(cid),
            symbol: "tBTCUSD".to_string(),
            amount: remaining,
            amount_orig: orig,
            order_type: "EXCHANGE LIMIT".to_string(),
            status: "ACTIVE".to_string(),
            price: Some(dec!(30000)),
            price_avg: None,
        }
    }

    #[test]
    fn test_cid_allocation_is_unique() {
        let tracker = OrderTracker::new();
        let a = tracker.next_cid();
        let b = tracker.next_cid();
        assert!(b > a);
    }

    #[test]
    fn test_ack_links_venue_id() {
        let tracker = OrderTracker::new();
        let cid = tracker.next_cid();
        tracker.register(cid, limit_order(7, dec!(0.5)));

        let updated = tracker
            .apply_report(&report(900, cid, dec!(0.5), dec!(0.5)), OrderStatusKind::Submitted)
            .unwrap();

        assert_eq!(updated.status, OrderStatusKind::Submitted);
        assert_eq!(updated.broker_ids, vec!["900".to_string()]);
        assert_eq!(tracker.get_by_venue_id(900).unwrap().cid, cid);
        assert_eq!(tracker.venue_ids_for_host(7), vec![900]);
    }

    #[test]
    fn test_trade_accumulates_fills() {
        let tracker = OrderTracker::new();
        let cid = tracker.next_cid();
        tracker.register(cid, limit_order(1, dec!(0.5)));
        tracker
            .apply_report(&report(900, cid, dec!(0.5), dec!(0.5)), OrderStatusKind::Submitted)
            .unwrap();

        let trade = TradeReport {
            trade_id: 1,
            symbol: "tBTCUSD".to_string(),
            order_id: 900,
            exec_amount: dec!(0.2),
            exec_price: dec!(30000),
        };
        let partial = tracker.apply_trade(&trade).unwrap();
        assert_eq!(partial.status, OrderStatusKind::PartiallyFilled);
        assert_eq!(partial.filled_quantity, dec!(0.2));

        let trade2 = TradeReport {
            exec_amount: dec!(0.3),
            trade_id: 2,
            ..trade
        };
        let full = tracker.apply_trade(&trade2).unwrap();
        assert_eq!(full.status, OrderStatusKind::Filled);
        assert_eq!(full.filled_quantity, dec!(0.5));
    }

    #[test]
    fn test_final_status_not_reverted() {
        let tracker = OrderTracker::new();
        let cid = tracker.next_cid();
        tracker.register(cid, limit_order(1, dec!(0.5)));
        tracker
            .apply_report(&report(900, cid, dec!(0), dec!(0.5)), OrderStatusKind::Filled)
            .unwrap();

        // 뒤늦게 도착한 ACTIVE 보고는 무시
        let stale = tracker.apply_report(
            &report(900, cid, dec!(0.5), dec!(0.5)),
            OrderStatusKind::Submitted,
        );
        assert!(stale.is_none());
        assert_eq!(
            tracker.get_by_cid(cid).unwrap().order.status,
            OrderStatusKind::Filled
        );
    }

    #[test]
    fn test_disconnect_marks_pending_unknown() {
        let tracker = OrderTracker::new();
        let acked_cid = tracker.next_cid();
        let pending_cid = tracker.next_cid();
        tracker.register(acked_cid, limit_order(1, dec!(0.5)));
        tracker.register(pending_cid, limit_order(2, dec!(1)));
        tracker
            .apply_report(
                &report(900, acked_cid, dec!(0.5), dec!(0.5)),
                OrderStatusKind::Submitted,
            )
            .unwrap();

        let orphaned = tracker.mark_pending_unknown();

        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].id, 2);
        assert_eq!(orphaned[0].status, OrderStatusKind::Unknown);
        // ack된 주문은 건드리지 않음
        assert_eq!(
            tracker.get_by_cid(acked_cid).unwrap().order.status,
            OrderStatusKind::Submitted
        );
    }

    #[test]
    fn test_merge_prefers_local_state() {
        let tracker = OrderTracker::new();
        let cid = tracker.next_cid();
        tracker.register(cid, limit_order(1, dec!(0.5)));
        tracker
            .apply_report(&report(900, cid, dec!(0.5), dec!(0.5)), OrderStatusKind::Submitted)
            .unwrap();

        // 거래소에만 있는 주문은 편입, 로컬 추적 주문은 그대로
        let foreign_report = report(901, 555, dec!(1), dec!(1));
        let mut foreign_order = limit_order(0, dec!(1));
        foreign_order.status = OrderStatusKind::Submitted;
        foreign_order.add_broker_id("901".to_string());

        let adopted = tracker.merge_open_orders(vec![
            (report(900, cid, dec!(0.5), dec!(0.5)), limit_order(1, dec!(0.5))),
            (foreign_report, foreign_order),
        ]);

        assert_eq!(adopted.len(), 1);
        assert_eq!(adopted[0].broker_ids, vec!["901".to_string()]);
        assert_eq!(tracker.open_orders().len(), 2);
        assert!(tracker.get_by_venue_id(901).is_some());
    }

    #[test]
    fn test_terminal_entries_pruned_at_cap() {
        let tracker = OrderTracker::new();
        let first_cid = tracker.next_cid();
        tracker.register(first_cid, limit_order(1, dec!(0.5)));
        tracker
            .apply_report(
                &report(10_000, first_cid, dec!(0), dec!(0.5)),
                OrderStatusKind::Filled,
            )
            .unwrap();

        for i in 1..=(TERMINAL_RETENTION as i64 + 8) {
            let cid = tracker.next_cid();
            tracker.register(cid, limit_order(i + 1, dec!(0.5)));
            tracker
                .apply_report(
                    &report(10_000 + i, cid, dec!(0), dec!(0.5)),
                    OrderStatusKind::Filled,
                )
                .unwrap();
        }

        // 가장 오래된 종결 항목부터 테이블에서 빠짐
        assert!(tracker.get_by_cid(first_cid).is_none());
        assert!(tracker.get_by_venue_id(10_000).is_none());
        // 최근 종결 항목은 지연 보고 가드로 남아 있음
        assert!(tracker
            .get_by_venue_id(10_000 + TERMINAL_RETENTION as i64 + 8)
            .is_some());
    }

    #[test]
    fn test_foreign_report_returns_none() {
        let tracker = OrderTracker::new();
        let foreign = report(999, 123456, dec!(1), dec!(1));
        assert!(tracker
            .apply_report(&foreign, OrderStatusKind::Submitted)
            .is_none());
    }
}
