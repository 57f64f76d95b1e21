//! Bitfinex 와이어 메시지 코덱.
//!
//! Bitfinex WebSocket 프레임은 위치 기반 JSON 배열입니다. 주문 커맨드는
//! `[0, "on"|"ou"|"oc", null, payload]` 봉투로 감싸 보내고, 수신 프레임은
//! 채널 0의 태그(`on`/`ou`/`oc`/`tu`/`n`/`hb` 등)로 분기해 디코딩합니다.
//!
//! 필드 위치는 거래소 문서의 순서를 그대로 따릅니다. 필드가 부족한
//! 프레임은 경고 후 무시되며 치명적이지 않습니다.

use crate::error::{ConnectorError, ConnectorResult};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

/// 아웃바운드 주문 커맨드 코드.
pub mod command {
    /// 신규 주문
    pub const NEW: &str = "on";
    /// 주문 갱신
    pub const UPDATE: &str = "ou";
    /// 주문 취소
    pub const CANCEL: &str = "oc";
}

/// 주문 커맨드를 봉투로 감싸 직렬화합니다: `[0, code, null, payload]`.
pub fn envelope(code: &str, payload: Value) -> String {
    serde_json::json!([0, code, Value::Null, payload]).to_string()
}

// ============================================================================
// 수신 메시지 타입
// ============================================================================

/// 거래소가 보고한 주문 상태 (주문 배열 디코딩 결과).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReport {
    /// 거래소 주문 ID
    pub order_id: i64,
    /// 클라이언트 상관 ID (신규 주문 ack에만 유의미)
    pub client_id: Option<i64>,
    /// 거래소 심볼 (예: "tBTCUSD")
    pub symbol: String,
    /// 부호 있는 잔여 수량
    pub amount: Decimal,
    /// 부호 있는 원 주문 수량
    pub amount_orig: Decimal,
    /// 거래소 주문 유형 토큰 (예: "EXCHANGE LIMIT")
    pub order_type: String,
    /// 거래소 상태 문자열 (예: "ACTIVE", "EXECUTED @ ...")
    pub status: String,
    /// 주문 가격
    pub price: Option<Decimal>,
    /// 평균 체결 가격
    pub price_avg: Option<Decimal>,
}

/// 체결 보고.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReport {
    /// 체결 ID
    pub trade_id: i64,
    /// 거래소 심볼
    pub symbol: String,
    /// 거래소 주문 ID
    pub order_id: i64,
    /// 부호 있는 체결 수량
    pub exec_amount: Decimal,
    /// 체결 가격
    pub exec_price: Decimal,
}

/// 알림 프레임 (`n` 태그): 주문 요청의 수락/거부 결과를 담습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// 알림 유형 (예: "on-req", "oc-req")
    pub kind: String,
    /// 상태 ("SUCCESS" | "ERROR" | ...)
    pub status: String,
    /// 설명 텍스트
    pub text: String,
    /// 대상 주문 (주문 관련 알림인 경우)
    pub order: Option<OrderReport>,
}

impl Notification {
    /// 거부 알림 여부.
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("ERROR")
    }
}

/// 디코딩된 수신 스트림 메시지.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// 인증 응답
    AuthAck {
        success: bool,
        code: Option<i64>,
        message: Option<String>,
    },
    /// 하트비트
    Heartbeat,
    /// 요청 수락/거부 알림
    Notification(Notification),
    /// 미체결 주문 스냅샷 (인증 직후 수신)
    OrderSnapshot(Vec<OrderReport>),
    /// 신규 주문 ack
    OrderNew(OrderReport),
    /// 주문 갱신 ack
    OrderUpdate(OrderReport),
    /// 주문 취소 ack (거래소 측 취소 포함)
    OrderCancel(OrderReport),
    /// 체결 이벤트
    TradeUpdate(TradeReport),
    /// 에러 이벤트
    ErrorEvent { code: i64, message: String },
    /// 알 필요 없는 프레임 (info, 지갑/포지션 스냅샷 등)
    Ignored,
}

// ============================================================================
// 디코딩
// ============================================================================

fn i64_at(values: &[Value], idx: usize) -> Option<i64> {
    values.get(idx)?.as_i64()
}

fn str_at(values: &[Value], idx: usize) -> Option<String> {
    values.get(idx)?.as_str().map(|s| s.to_string())
}

/// 숫자 또는 문자열 필드를 Decimal로 변환합니다.
///
/// JSON 숫자는 원문 표기로 파싱해 부동소수점 경유 손실을 피합니다.
fn decimal_at(values: &[Value], idx: usize) -> Option<Decimal> {
    match values.get(idx)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// 주문 배열을 디코딩합니다.
///
/// 필드 순서: [ID, GID, CID, SYMBOL, MTS_CREATE, MTS_UPDATE, AMOUNT,
/// AMOUNT_ORIG, TYPE, ..., STATUS(13), ..., PRICE(16), PRICE_AVG(17)].
pub fn parse_order_report(values: &[Value]) -> Option<OrderReport> {
    if values.len() < 18 {
        warn!(fields = values.len(), "Order report has too few fields");
        return None;
    }

    Some(OrderReport {
        order_id: i64_at(values, 0)?,
        client_id: i64_at(values, 2),
        symbol: str_at(values, 3)?,
        amount: decimal_at(values, 6).unwrap_or(Decimal::ZERO),
        amount_orig: decimal_at(values, 7).unwrap_or(Decimal::ZERO),
        order_type: str_at(values, 8)?,
        status: str_at(values, 13)?,
        price: decimal_at(values, 16),
        price_avg: decimal_at(values, 17),
    })
}

/// 체결 배열을 디코딩합니다.
///
/// 필드 순서: [ID, PAIR, MTS_CREATE, ORDER_ID, EXEC_AMOUNT, EXEC_PRICE, ...].
pub fn parse_trade_report(values: &[Value]) -> Option<TradeReport> {
    if values.len() < 6 {
        warn!(fields = values.len(), "Trade report has too few fields");
        return None;
    }

    Some(TradeReport {
        trade_id: i64_at(values, 0)?,
        symbol: str_at(values, 1)?,
        order_id: i64_at(values, 3)?,
        exec_amount: decimal_at(values, 4)?,
        exec_price: decimal_at(values, 5)?,
    })
}

/// 알림 배열을 디코딩합니다.
///
/// 필드 순서: [MTS, TYPE, MESSAGE_ID, null, NOTIFY_INFO, CODE, STATUS, TEXT].
fn parse_notification(values: &[Value]) -> Option<Notification> {
    if values.len() < 8 {
        warn!(fields = values.len(), "Notification has too few fields");
        return None;
    }

    let order = values
        .get(4)
        .and_then(|v| v.as_array())
        .filter(|info| info.len() >= 18)
        .and_then(|info| parse_order_report(info));

    Some(Notification {
        kind: str_at(values, 1)?,
        status: str_at(values, 6).unwrap_or_default(),
        text: str_at(values, 7).unwrap_or_default(),
        order,
    })
}

/// 수신 프레임 하나를 디코딩합니다.
pub fn parse_frame(text: &str) -> ConnectorResult<StreamMessage> {
    let value: Value = serde_json::from_str(text)?;

    match &value {
        // 이벤트 객체: info / auth / error
        Value::Object(map) => {
            let event = map.get("event").and_then(|v| v.as_str()).unwrap_or("");
            match event {
                "auth" => {
                    let success = map
                        .get("status")
                        .and_then(|v| v.as_str())
                        .map(|s| s.eq_ignore_ascii_case("OK"))
                        .unwrap_or(false);
                    Ok(StreamMessage::AuthAck {
                        success,
                        code: map.get("code").and_then(|v| v.as_i64()),
                        message: map.get("msg").and_then(|v| v.as_str()).map(String::from),
                    })
                }
                "error" => Ok(StreamMessage::ErrorEvent {
                    code: map.get("code").and_then(|v| v.as_i64()).unwrap_or(0),
                    message: map
                        .get("msg")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                }),
                // info, subscribed 등은 무시
                _ => Ok(StreamMessage::Ignored),
            }
        }
        // 채널 프레임: [channel, tag, payload]
        Value::Array(frame) => {
            if frame.len() < 2 {
                return Err(ConnectorError::ParseError(format!(
                    "Frame too short: {}",
                    text
                )));
            }

            let tag = frame[1].as_str().unwrap_or("");
            let payload = frame.get(2).and_then(|v| v.as_array());

            match tag {
                "hb" => Ok(StreamMessage::Heartbeat),
                "n" => Ok(payload
                    .and_then(|p| parse_notification(p))
                    .map(StreamMessage::Notification)
                    .unwrap_or(StreamMessage::Ignored)),
                "os" => {
                    let orders = payload
                        .map(|rows| {
                            rows.iter()
                                .filter_map(|row| row.as_array())
                                .filter_map(|row| parse_order_report(row))
                                .collect()
                        })
                        .unwrap_or_default();
                    Ok(StreamMessage::OrderSnapshot(orders))
                }
                "on" => Ok(payload
                    .and_then(|p| parse_order_report(p))
                    .map(StreamMessage::OrderNew)
                    .unwrap_or(StreamMessage::Ignored)),
                "ou" => Ok(payload
                    .and_then(|p| parse_order_report(p))
                    .map(StreamMessage::OrderUpdate)
                    .unwrap_or(StreamMessage::Ignored)),
                "oc" => Ok(payload
                    .and_then(|p| parse_order_report(p))
                    .map(StreamMessage::OrderCancel)
                    .unwrap_or(StreamMessage::Ignored)),
                "tu" => Ok(payload
                    .and_then(|p| parse_trade_report(p))
                    .map(StreamMessage::TradeUpdate)
                    .unwrap_or(StreamMessage::Ignored)),
                // te는 tu가 뒤따르므로 무시, 지갑/포지션 스냅샷 등도 무시
                _ => Ok(StreamMessage::Ignored),
            }
        }
        _ => Err(ConnectorError::ParseError(format!(
            "Unexpected frame shape: {}",
            text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_row(id: i64, cid: i64, status: &str) -> String {
        format!(
            r#"[{},null,{},"tBTCUSD",1574002616619,1574002616619,0.5,0.5,"EXCHANGE LIMIT",null,null,null,0,"{}",null,null,8000,0,0,0,null,null,null,0,0,null,null,null,"API>BFX",null,null,null]"#,
            id, cid, status
        )
    }

    #[test]
    fn test_envelope_shape() {
        let text = envelope(command::NEW, serde_json::json!({"cid": 1}));
        let value: Value = serde_json::from_str(&text).unwrap();
        let frame = value.as_array().unwrap();

        assert_eq!(frame[0], 0);
        assert_eq!(frame[1], "on");
        assert!(frame[2].is_null());
        assert_eq!(frame[3]["cid"], 1);
    }

    #[test]
    fn test_parse_heartbeat() {
        assert_eq!(parse_frame(r#"[0,"hb"]"#).unwrap(), StreamMessage::Heartbeat);
    }

    #[test]
    fn test_parse_auth_ack() {
        let ok = parse_frame(r#"{"event":"auth","status":"OK","chanId":0,"userId":1}"#).unwrap();
        assert_eq!(
            ok,
            StreamMessage::AuthAck {
                success: true,
                code: None,
                message: None
            }
        );

        let failed =
            parse_frame(r#"{"event":"auth","status":"FAILED","code":10100,"msg":"apikey: invalid"}"#)
                .unwrap();
        match failed {
            StreamMessage::AuthAck { success, code, .. } => {
                assert!(!success);
                assert_eq!(code, Some(10100));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_new_ack() {
        let frame = format!(r#"[0,"on",{}]"#, order_row(1187238111, 42, "ACTIVE"));
        match parse_frame(&frame).unwrap() {
            StreamMessage::OrderNew(report) => {
                assert_eq!(report.order_id, 1187238111);
                assert_eq!(report.client_id, Some(42));
                assert_eq!(report.symbol, "tBTCUSD");
                assert_eq!(report.amount_orig, dec!(0.5));
                assert_eq!(report.order_type, "EXCHANGE LIMIT");
                assert_eq!(report.status, "ACTIVE");
                assert_eq!(report.price, Some(dec!(8000)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_snapshot() {
        let frame = format!(
            r#"[0,"os",[{},{}]]"#,
            order_row(1, 10, "ACTIVE"),
            order_row(2, 11, "PARTIALLY FILLED @ 8000.0(0.2)")
        );
        match parse_frame(&frame).unwrap() {
            StreamMessage::OrderSnapshot(orders) => {
                assert_eq!(orders.len(), 2);
                assert_eq!(orders[1].order_id, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_trade_update() {
        let frame = r#"[0,"tu",[402088407,"tBTCUSD",1574003975602,1187238111,0.1,8010.5,"EXCHANGE LIMIT",8000,-1,-0.08,"USD"]]"#;
        match parse_frame(frame).unwrap() {
            StreamMessage::TradeUpdate(trade) => {
                assert_eq!(trade.order_id, 1187238111);
                assert_eq!(trade.exec_amount, dec!(0.1));
                assert_eq!(trade.exec_price, dec!(8010.5));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_notification() {
        let frame = r#"[0,"n",[1575282446099,"on-req",null,null,[0,null,42,"tBTCUSD",null,null,1,1,"EXCHANGE LIMIT",null,null,null,null,null,null,null,30000,null,0,0,null,null,null,0,null,null,null,null,null,null,null,null],null,"ERROR","Invalid order: not enough exchange balance"]]"#;
        match parse_frame(frame).unwrap() {
            StreamMessage::Notification(n) => {
                assert_eq!(n.kind, "on-req");
                assert!(n.is_error());
                assert!(n.text.contains("not enough exchange balance"));
                // 주문 배열이 함께 실려 cid를 복구할 수 있음
                assert_eq!(n.order.as_ref().and_then(|o| o.client_id), Some(42));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_short_order_report_is_skipped() {
        // 필드가 부족한 주문 배열은 None (경고 후 스킵)
        let frame = r#"[0,"on",[1,null,2]]"#;
        assert_eq!(parse_frame(frame).unwrap(), StreamMessage::Ignored);
    }

    #[test]
    fn test_unknown_frames_ignored() {
        assert_eq!(
            parse_frame(r#"{"event":"info","version":2}"#).unwrap(),
            StreamMessage::Ignored
        );
        assert_eq!(
            parse_frame(r#"[0,"ws",[]]"#).unwrap(),
            StreamMessage::Ignored
        );
    }
}
