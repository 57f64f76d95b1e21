//! 과거 캔들 백필 통합 테스트.
//!
//! mockito 서버로 캔들 엔드포인트를 흉내 내어 페이지네이션, 경계
//! 처리, 조기 종료를 검증합니다.

use connector_bitfinex::{BitfinexConfig, BitfinexRestClient, BitfinexSymbolMap, BitfinexHistory};
use connector_core::{AccountType, Credentials, HistoryRequest, Resolution, Symbol, TickType};
use mockito::Matcher;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// 1분 경계에 정렬된 기준 시각.
const T0: i64 = 1_571_400_000_000;
const MINUTE: i64 = 60_000;

fn history_with(server: &mockito::ServerGuard) -> BitfinexHistory {
    let config = BitfinexConfig::new(Credentials::new("key", "secret"), AccountType::Cash)
        .with_public_url(server.url());
    let rest = Arc::new(BitfinexRestClient::new(config).unwrap());
    BitfinexHistory::new(rest)
}

fn minute_request(start: i64, end: i64) -> HistoryRequest {
    HistoryRequest::trade(
        Symbol::crypto("BTC", "USD"),
        Resolution::Minute,
        chrono::DateTime::from_timestamp_millis(start).unwrap(),
        chrono::DateTime::from_timestamp_millis(end).unwrap(),
    )
}

fn candle(mts: i64, price: i64) -> String {
    format!("[{},{},{},{},{},1.5]", mts, price, price + 10, price + 20, price - 20)
}

#[tokio::test]
async fn test_backfill_paginates_and_drops_end_boundary() {
    let mut server = mockito::Server::new_async().await;

    // 1페이지: 처음 두 캔들
    let page1 = server
        .mock("GET", "/v2/candles/trade:1m:tBTCUSD/hist")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sort".into(), "1".into()),
            Matcher::UrlEncoded("limit".into(), "1000".into()),
            Matcher::UrlEncoded("start".into(), T0.to_string()),
        ]))
        .with_body(format!("[{},{}]", candle(T0, 30000), candle(T0 + MINUTE, 30100)))
        .create_async()
        .await;

    // 2페이지: 나머지 + 끝 경계 캔들 (버려져야 함)
    let page2 = server
        .mock("GET", "/v2/candles/trade:1m:tBTCUSD/hist")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), (T0 + 2 * MINUTE).to_string()),
        ]))
        .with_body(format!(
            "[{},{},{}]",
            candle(T0 + 2 * MINUTE, 30200),
            candle(T0 + 3 * MINUTE, 30300),
            candle(T0 + 4 * MINUTE, 30400)
        ))
        .create_async()
        .await;

    let history = history_with(&server);
    let request = minute_request(T0, T0 + 4 * MINUTE);
    let mut series = history
        .get_history(&request, &BitfinexSymbolMap::new())
        .unwrap()
        .expect("series should be available");

    let mut bars = Vec::new();
    while let Some(bar) = series.next().await.unwrap() {
        bars.push(bar);
    }

    page1.assert_async().await;
    page2.assert_async().await;

    // 끝 경계(T0+4분) 캔들은 제외되어 4개
    assert_eq!(bars.len(), 4);
    for (i, bar) in bars.iter().enumerate() {
        assert_eq!(bar.open_time.timestamp_millis(), T0 + i as i64 * MINUTE);
        assert_eq!(bar.close_time.timestamp_millis(), T0 + (i as i64 + 1) * MINUTE);
    }
    assert_eq!(bars[0].open, dec!(30000));
    assert_eq!(bars[0].close, dec!(30010));
    assert_eq!(bars[0].high, dec!(30020));
    assert_eq!(bars[0].low, dec!(29980));
    assert_eq!(bars[3].open, dec!(30300));
}

#[tokio::test]
async fn test_backfill_stops_on_empty_page() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/v2/candles/trade:1m:tBTCUSD/hist")
        .match_query(Matcher::AllOf(vec![Matcher::UrlEncoded(
            "start".into(),
            T0.to_string(),
        )]))
        .with_body(format!("[{},{}]", candle(T0, 30000), candle(T0 + MINUTE, 30100)))
        .create_async()
        .await;

    // 거래소가 더 줄 게 없음: 빈 페이지
    server
        .mock("GET", "/v2/candles/trade:1m:tBTCUSD/hist")
        .match_query(Matcher::AllOf(vec![Matcher::UrlEncoded(
            "start".into(),
            (T0 + 2 * MINUTE).to_string(),
        )]))
        .with_body("[]")
        .create_async()
        .await;

    let history = history_with(&server);
    // 요청 범위는 10분이지만 데이터는 2분치뿐
    let request = minute_request(T0, T0 + 10 * MINUTE);
    let mut series = history
        .get_history(&request, &BitfinexSymbolMap::new())
        .unwrap()
        .unwrap();

    let mut bars = Vec::new();
    while let Some(bar) = series.next().await.unwrap() {
        bars.push(bar);
    }

    assert_eq!(bars.len(), 2);
}

#[tokio::test]
async fn test_boundaries_floored_to_resolution() {
    let mut server = mockito::Server::new_async().await;

    // 요청이 37초/22초로 어긋나 있어도 분 경계로 내림되어야 함
    let mock = server
        .mock("GET", "/v2/candles/trade:1m:tBTCUSD/hist")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), T0.to_string()),
            Matcher::UrlEncoded("end".into(), (T0 + 2 * MINUTE - 1).to_string()),
        ]))
        .with_body(format!("[{}]", candle(T0, 30000)))
        .create_async()
        .await;

    let history = history_with(&server);
    let request = minute_request(T0 + 37_000, T0 + 2 * MINUTE + 22_000);
    let mut series = history
        .get_history(&request, &BitfinexSymbolMap::new())
        .unwrap()
        .unwrap();

    let bar = series.next().await.unwrap().unwrap();
    assert_eq!(bar.open_time.timestamp_millis(), T0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unsupported_shapes_return_none() {
    let server = mockito::Server::new_async().await;
    let history = history_with(&server);

    // 틱 해상도는 캔들로 제공되지 않음
    let tick = HistoryRequest::trade(
        Symbol::crypto("BTC", "USD"),
        Resolution::Tick,
        chrono::DateTime::from_timestamp_millis(T0).unwrap(),
        chrono::DateTime::from_timestamp_millis(T0 + MINUTE).unwrap(),
    );
    assert!(history
        .get_history(&tick, &BitfinexSymbolMap::new())
        .unwrap()
        .is_none());

    // 호가 이력 없음
    let mut quote = minute_request(T0, T0 + MINUTE);
    quote.tick_type = TickType::Quote;
    assert!(history
        .get_history(&quote, &BitfinexSymbolMap::new())
        .unwrap()
        .is_none());

    // 비암호화폐 심볼 없음
    let mut stock = minute_request(T0, T0 + MINUTE);
    stock.symbol = Symbol::stock("AAPL", "USD");
    assert!(history
        .get_history(&stock, &BitfinexSymbolMap::new())
        .unwrap()
        .is_none());

    // 내림 후 빈 구간
    let empty = minute_request(T0 + 1_000, T0 + 2_000);
    assert!(history
        .get_history(&empty, &BitfinexSymbolMap::new())
        .unwrap()
        .is_none());
}
