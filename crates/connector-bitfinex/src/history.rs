//! 과거 캔들 백필 엔진.
//!
//! `candles/trade:{해상도}:{티커}/hist` 엔드포인트를 오름차순으로
//! 페이지네이션합니다. 요청 경계는 해상도 경계로 내림하고, 끝 경계에
//! 걸친 캔들은 버립니다 (끝은 배타적). 빈 페이지가 오면 경고 후
//! 중단합니다.

use crate::error::{ConnectorError, ConnectorResult};
use crate::rest::BitfinexRestClient;
use crate::symbol_map::SymbolMapper;
use connector_core::{Bar, HistoryRequest, Resolution, Symbol, TickType};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// 페이지당 최대 캔들 수 (거래소 상한).
const PAGE_LIMIT: usize = 1000;

/// 캔들 한 줄: [MTS, OPEN, CLOSE, HIGH, LOW, VOLUME].
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub mts: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

fn decimal_field(values: &[Value], idx: usize) -> Option<Decimal> {
    match values.get(idx)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn parse_candle(values: &[Value]) -> Option<Candle> {
    if values.len() < 6 {
        warn!(fields = values.len(), "Candle row has too few fields");
        return None;
    }
    Some(Candle {
        mts: values[0].as_i64()?,
        open: decimal_field(values, 1)?,
        close: decimal_field(values, 2)?,
        high: decimal_field(values, 3)?,
        low: decimal_field(values, 4)?,
        volume: decimal_field(values, 5)?,
    })
}

impl Candle {
    fn into_bar(self, symbol: Symbol, resolution: Resolution) -> Option<Bar> {
        let open_time = chrono::DateTime::from_timestamp_millis(self.mts)?;
        Some(Bar::new(
            symbol,
            resolution,
            open_time,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ))
    }
}

/// 과거 데이터 조회 진입점.
pub struct BitfinexHistory {
    rest: Arc<BitfinexRestClient>,
}

impl BitfinexHistory {
    pub fn new(rest: Arc<BitfinexRestClient>) -> Self {
        Self { rest }
    }

    /// 요청을 검증하고 바 시리즈를 만듭니다.
    ///
    /// 거래소가 제공하지 않는 형태(호가 틱, 초 미만 해상도, 비암호화폐
    /// 심볼)는 경고 후 `Ok(None)`입니다. 매핑 자체가 불가능한 심볼은
    /// 하드 실패로 돌려 잘못된 설정이 조용히 넘어가지 않게 합니다.
    pub fn get_history(
        &self,
        request: &HistoryRequest,
        mapper: &dyn SymbolMapper,
    ) -> ConnectorResult<Option<BarSeries>> {
        if request.tick_type != TickType::Trade {
            warn!(
                symbol = %request.symbol,
                "Quote history is not available, skipping request"
            );
            return Ok(None);
        }
        let Some(token) = request.resolution.to_bitfinex_token() else {
            warn!(
                symbol = %request.symbol,
                resolution = ?request.resolution,
                "Resolution not available as candles, skipping request"
            );
            return Ok(None);
        };
        if !request.symbol.is_crypto() {
            warn!(
                symbol = %request.symbol,
                "Only crypto symbols have history here, skipping request"
            );
            return Ok(None);
        }

        let ticker = mapper.to_venue(&request.symbol)?;

        let period = request.resolution.as_millis();
        let start = request
            .resolution
            .floor_millis(request.start_utc.timestamp_millis());
        let end = request
            .resolution
            .floor_millis(request.end_utc.timestamp_millis());

        if start >= end {
            warn!(
                symbol = %request.symbol,
                start, end,
                "Empty history window after flooring, skipping request"
            );
            return Ok(None);
        }

        Ok(Some(BarSeries {
            rest: Arc::clone(&self.rest),
            symbol: request.symbol.clone(),
            resolution: request.resolution,
            endpoint: format!("candles/trade:{}:{}/hist", token, ticker),
            period,
            cursor: start,
            end,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// 지연 페이지네이션 바 스트림.
///
/// [`next`](Self::next)가 버퍼를 비우면 다음 페이지를 가져옵니다.
/// 커서는 받은 마지막 캔들의 열림 시각 + 주기로 전진하며, 캔들은
/// 시각 오름차순으로 정확히 한 번씩만 나옵니다.
pub struct BarSeries {
    rest: Arc<BitfinexRestClient>,
    symbol: Symbol,
    resolution: Resolution,
    endpoint: String,
    period: i64,
    cursor: i64,
    end: i64,
    buffer: VecDeque<Bar>,
    exhausted: bool,
}

impl BarSeries {
    /// 다음 바를 반환합니다. 범위가 끝나면 `Ok(None)`.
    pub async fn next(&mut self) -> ConnectorResult<Option<Bar>> {
        loop {
            if let Some(bar) = self.buffer.pop_front() {
                return Ok(Some(bar));
            }
            if self.exhausted || self.cursor >= self.end {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> ConnectorResult<()> {
        // 끝은 배타적이므로 경계 캔들은 요청에서 제외
        let page_end = self.end - 1;
        let rows: Vec<Vec<Value>> = self
            .rest
            .public_get(
                &self.endpoint,
                &[
                    ("limit", PAGE_LIMIT.to_string()),
                    ("sort", "1".to_string()),
                    ("start", self.cursor.to_string()),
                    ("end", page_end.to_string()),
                ],
            )
            .await?;

        if rows.is_empty() {
            if self.cursor < self.end {
                warn!(
                    symbol = %self.symbol,
                    cursor = self.cursor,
                    end = self.end,
                    "History ended before requested end"
                );
            }
            self.exhausted = true;
            return Ok(());
        }

        let mut last_mts = None;
        for row in &rows {
            let Some(candle) = parse_candle(row) else {
                continue;
            };
            // 커서 이전/끝 경계 이후 캔들은 버림
            if candle.mts < self.cursor || candle.mts >= self.end {
                continue;
            }
            last_mts = Some(candle.mts);
            let bar = candle
                .clone()
                .into_bar(self.symbol.clone(), self.resolution)
                .ok_or_else(|| {
                    ConnectorError::ParseError(format!("Invalid candle timestamp: {}", candle.mts))
                })?;
            self.buffer.push_back(bar);
        }

        match last_mts {
            Some(mts) => self.cursor = mts + self.period,
            // 페이지 전체가 걸러진 경우 (경계 캔들뿐)
            None => self.exhausted = true,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_candle_row() {
        let row: Vec<Value> =
            serde_json::from_str("[1571400000000,30000,30100,30200,29900,12.5]").unwrap();
        assert_eq!(
            parse_candle(&row),
            Some(Candle {
                mts: 1571400000000,
                open: dec!(30000),
                close: dec!(30100),
                high: dec!(30200),
                low: dec!(29900),
                volume: dec!(12.5),
            })
        );
    }

    #[test]
    fn test_candle_to_bar_field_order() {
        // 거래소 순서는 OCHL, 바는 OHLC
        let candle = Candle {
            mts: 1571400000000,
            open: dec!(1),
            close: dec!(2),
            high: dec!(3),
            low: dec!(4),
            volume: dec!(5),
        };
        let bar = candle
            .into_bar(Symbol::crypto("BTC", "USD"), Resolution::Minute)
            .unwrap();
        assert_eq!(bar.open, dec!(1));
        assert_eq!(bar.close, dec!(2));
        assert_eq!(bar.high, dec!(3));
        assert_eq!(bar.low, dec!(4));
        assert_eq!(
            bar.close_time - bar.open_time,
            chrono::Duration::minutes(1)
        );
    }

    #[test]
    fn test_short_candle_row_skipped() {
        let row: Vec<Value> = serde_json::from_str("[1571400000000,30000]").unwrap();
        assert_eq!(parse_candle(&row), None);
    }
}
