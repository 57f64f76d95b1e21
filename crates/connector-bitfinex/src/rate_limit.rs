//! API 요청 속도 제한.
//!
//! 거래소 표면별로 하나의 토큰 버킷을 둡니다:
//! - 일반 REST 호출 (분당 90회, Bitfinex 문서 기준)
//! - WebSocket 연결/핸드셰이크 시도 (분당 5회, 밴 방지)
//!
//! 토큰 소진은 에러가 아니라 대기입니다. `acquire()`는 토큰이 생길
//! 때까지 호출 태스크를 블로킹하며 절대 실패하지 않습니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// 일반 REST 호출 한도 (분당 요청 수).
const REST_REQUESTS_PER_MINUTE: u32 = 90;

/// 연결 핸드셰이크 한도 (분당 시도 수).
const CONNECTION_ATTEMPTS_PER_MINUTE: u32 = 5;

#[derive(Debug)]
struct BucketState {
    /// 현재 사용 가능한 토큰 수
    tokens: u32,
    /// 마지막 리필 시각
    last_refill: Instant,
}

/// 고정 용량/고정 리필 토큰 버킷.
///
/// 용량만큼의 버스트를 허용하고, `refill_interval`마다 토큰을 하나씩
/// 되돌려줍니다.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_interval: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// 새 토큰 버킷을 생성합니다.
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 일반 REST 호출용 버킷.
    pub fn general_rest() -> Self {
        Self::new(
            REST_REQUESTS_PER_MINUTE,
            Duration::from_secs(60) / REST_REQUESTS_PER_MINUTE,
        )
    }

    /// 연결 핸드셰이크용 버킷.
    pub fn connections() -> Self {
        Self::new(
            CONNECTION_ATTEMPTS_PER_MINUTE,
            Duration::from_secs(60) / CONNECTION_ATTEMPTS_PER_MINUTE,
        )
    }

    /// 토큰 하나를 소비합니다. 소진 시 리필까지 대기합니다.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                if state.tokens > 0 {
                    state.tokens -= 1;
                    return;
                }

                // 다음 토큰까지 남은 시간
                self.refill_interval
                    .saturating_sub(state.last_refill.elapsed())
            };

            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// 경과 시간에 비례해 토큰을 되돌립니다.
    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed();
        let refills = (elapsed.as_nanos() / self.refill_interval.as_nanos().max(1)) as u32;

        if refills > 0 {
            state.tokens = (state.tokens + refills).min(self.capacity);
            state.last_refill += self.refill_interval * refills;
        }
    }

    /// 현재 사용 가능한 토큰 수 (테스트/관측용).
    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }
}
