//! 요청 서명 및 nonce 생성.
//!
//! Bitfinex 인증 요청은 계정 시크릿을 키로 한 HMAC-SHA384 서명과
//! 순증가 nonce를 요구합니다. nonce는 벽시계 마이크로초에서 유도하되
//! 같은 시각에 연속 호출돼도 절대 감소하지 않습니다.

use hmac::{Hmac, Mac};
use sha2::Sha384;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha384 = Hmac<Sha384>;

/// 프로세스 수명 동안 순증가하는 nonce 팩토리.
#[derive(Debug)]
pub struct NonceFactory {
    last: AtomicI64,
}

impl NonceFactory {
    /// 새 nonce 팩토리를 생성합니다.
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// 다음 nonce를 반환합니다.
    ///
    /// 벽시계 마이크로초와 `이전 값 + 1` 중 큰 쪽을 택해
    /// 빠른 연속 호출에서도 순증가를 보장합니다.
    pub fn next(&self) -> i64 {
        let now_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);

        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now_us.max(prev + 1))
            })
            .map(|prev| now_us.max(prev + 1))
            .unwrap_or(now_us)
    }
}

impl Default for NonceFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// HMAC-SHA384 서명을 계산해 16진수 문자열로 반환합니다.
pub fn sign_hmac_sha384(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// REST 서명 대상 규범 문자열을 만듭니다.
///
/// 형식: `/api/v2/{endpoint}{nonce}{body}` (Bitfinex v2 인증 스킴).
pub fn rest_signature_payload(endpoint: &str, nonce: i64, body: &str) -> String {
    format!("/api/v2/{}{}{}", endpoint, nonce, body)
}
