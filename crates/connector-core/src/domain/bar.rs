//! 과거 캔들(Bar) 데이터 구조체.

use crate::types::{Price, Quantity, Resolution, Symbol};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 하나의 완결된 기간을 나타내는 캔들.
///
/// `open_time`이 유일 키입니다. 하나의 백필 실행 안에서 open_time은
/// 중복 없이 순증가해야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 해상도
    pub resolution: Resolution,
    /// 캔들 시작 시간 (유일 키)
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
    /// 캔들 종료 시간 (= open_time + 해상도 기간)
    pub close_time: DateTime<Utc>,
}

impl Bar {
    /// 새 캔들을 생성합니다. 종료 시간은 해상도에서 유도됩니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        resolution: Resolution,
        open_time: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        let close_time = open_time + Duration::milliseconds(resolution.as_millis());
        Self {
            symbol,
            resolution,
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        }
    }
}
