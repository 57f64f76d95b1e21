//! 계정 조회와 대사(reconciliation).
//!
//! 지갑/포지션/미체결 주문을 REST로 읽어 호스트 도메인 타입으로
//! 환원합니다. 마진 계정의 포지션은 통화 스왑으로 해석해 합성 지갑
//! 레그(기초 통화 +수량, 결제 통화 -수량×기준가)를 잔고에 더합니다.

use crate::error::ConnectorResult;
use crate::messages::{parse_order_report, OrderReport};
use crate::orders::{parse_order_status, parse_order_type};
use crate::rest::BitfinexRestClient;
use crate::symbol_map::SymbolMapper;
use connector_core::{AccountType, CashAmount, Holding, Order};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// 지갑 한 줄: [WALLET_TYPE, CURRENCY, BALANCE, UNSETTLED, AVAILABLE, ...].
#[derive(Debug, Clone, PartialEq)]
pub struct WalletEntry {
    pub wallet_type: String,
    pub currency: String,
    pub balance: Decimal,
}

/// 포지션 한 줄: [SYMBOL, STATUS, AMOUNT, BASE_PRICE, ...].
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    pub ticker: String,
    pub amount: Decimal,
    pub base_price: Decimal,
}

fn decimal_field(values: &[Value], idx: usize) -> Option<Decimal> {
    match values.get(idx)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn parse_wallet_row(values: &[Value]) -> Option<WalletEntry> {
    if values.len() < 3 {
        warn!(fields = values.len(), "Wallet row has too few fields");
        return None;
    }
    Some(WalletEntry {
        wallet_type: values[0].as_str()?.to_string(),
        currency: values[1].as_str()?.to_uppercase(),
        balance: decimal_field(values, 2)?,
    })
}

/// ACTIVE가 아닌 포지션(청산 이력 등)은 걸러냅니다.
pub fn parse_position_row(values: &[Value]) -> Option<PositionEntry> {
    if values.len() < 4 {
        warn!(fields = values.len(), "Position row has too few fields");
        return None;
    }
    let status = values[1].as_str()?;
    if !status.eq_ignore_ascii_case("ACTIVE") {
        return None;
    }
    Some(PositionEntry {
        ticker: values[0].as_str()?.to_string(),
        amount: decimal_field(values, 2)?,
        base_price: decimal_field(values, 3)?,
    })
}

/// 계정 유형이 쓰는 지갑 이름.
fn wallet_name(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Cash => "exchange",
        AccountType::Margin => "margin",
    }
}

/// 지갑 잔고를 현금 잔고로 환원합니다.
///
/// 마진 계정은 열린 포지션마다 합성 레그 두 개를 더합니다:
/// 기초 통화 `+amount`, 결제 통화 `-amount × base_price`. 동일 통화의
/// 레그는 가산 병합됩니다.
pub fn cash_balances(
    account_type: AccountType,
    wallets: &[WalletEntry],
    positions: &[PositionEntry],
    mapper: &dyn SymbolMapper,
) -> Vec<CashAmount> {
    let mut balances: HashMap<String, Decimal> = HashMap::new();

    for wallet in wallets {
        if wallet.wallet_type == wallet_name(account_type) {
            *balances.entry(wallet.currency.clone()).or_default() += wallet.balance;
        }
    }

    if account_type == AccountType::Margin {
        for position in positions {
            let symbol = match mapper.from_venue(&position.ticker) {
                Ok(symbol) => symbol,
                Err(_) => {
                    warn!(ticker = %position.ticker, "Unmappable position ticker, skipping");
                    continue;
                }
            };
            *balances.entry(symbol.base.clone()).or_default() += position.amount;
            *balances.entry(symbol.quote.clone()).or_default() -=
                position.amount * position.base_price;
        }
    }

    let mut result: Vec<CashAmount> = balances
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(currency, amount)| CashAmount::new(currency, amount))
        .collect();
    result.sort_by(|a, b| a.currency.cmp(&b.currency));
    result
}

/// 포지션을 보유 종목으로 환원합니다. 현물 계정은 보유가 현금 장부로
/// 표현되므로 빈 목록입니다.
pub fn holdings(
    account_type: AccountType,
    positions: &[PositionEntry],
    mapper: &dyn SymbolMapper,
) -> Vec<Holding> {
    if account_type == AccountType::Cash {
        return Vec::new();
    }

    positions
        .iter()
        .filter_map(|position| {
            let symbol = mapper
                .from_venue(&position.ticker)
                .map_err(|_| {
                    warn!(ticker = %position.ticker, "Unmappable position ticker, skipping")
                })
                .ok()?;
            Some(Holding::new(symbol, position.amount, position.base_price))
        })
        .collect()
}

/// REST 주문 배열을 호스트 주문으로 환원합니다.
///
/// 다른 세션에서 낸 주문이라 호스트 ID가 없으면 0으로 편입합니다.
/// 지원하지 않는 주문 유형이나 심볼은 경고 후 건너뜁니다.
pub fn report_to_order(report: &OrderReport, mapper: &dyn SymbolMapper) -> Option<Order> {
    let symbol = mapper
        .from_venue(&report.symbol)
        .map_err(|_| warn!(ticker = %report.symbol, "Unmappable order ticker, skipping"))
        .ok()?;
    let order_type = parse_order_type(&report.order_type)?;

    let mut order = Order::new(0, symbol, report.amount_orig, order_type);
    order.price = report.price;
    order.status = parse_order_status(&report.status);
    order.filled_quantity = (report.amount_orig - report.amount).abs();
    order.average_fill_price = report.price_avg.filter(|p| !p.is_zero());
    order.add_broker_id(report.order_id.to_string());
    Some(order)
}

// ============================================================================
// REST 조회
// ============================================================================

/// 계정 REST 조회 묶음.
pub struct BitfinexAccount {
    rest: std::sync::Arc<BitfinexRestClient>,
}

impl BitfinexAccount {
    pub fn new(rest: std::sync::Arc<BitfinexRestClient>) -> Self {
        Self { rest }
    }

    /// 전체 지갑 잔고를 조회합니다.
    pub async fn wallets(&self) -> ConnectorResult<Vec<WalletEntry>> {
        let rows: Vec<Vec<Value>> = self
            .rest
            .signed_post("auth/r/wallets", &Value::Object(Default::default()))
            .await?;
        Ok(rows.iter().filter_map(|row| parse_wallet_row(row)).collect())
    }

    /// 열린 포지션을 조회합니다.
    pub async fn positions(&self) -> ConnectorResult<Vec<PositionEntry>> {
        let rows: Vec<Vec<Value>> = self
            .rest
            .signed_post("auth/r/positions", &Value::Object(Default::default()))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| parse_position_row(row))
            .collect())
    }

    /// 미체결 주문을 조회합니다 (주문 대사용 원본 보고 포함).
    pub async fn open_orders(
        &self,
        mapper: &dyn SymbolMapper,
    ) -> ConnectorResult<Vec<(OrderReport, Order)>> {
        let rows: Vec<Vec<Value>> = self
            .rest
            .signed_post("auth/r/orders", &Value::Object(Default::default()))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| parse_order_report(row))
            .filter_map(|report| {
                let order = report_to_order(&report, mapper)?;
                Some((report, order))
            })
            .collect())
    }
}
