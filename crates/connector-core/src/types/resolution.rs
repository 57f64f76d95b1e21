//! 캔들 데이터 해상도 정의.
//!
//! 하나의 Bar가 차지하는 고정 시간 폭을 나타냅니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들/Bar 해상도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 틱 단위 (캔들 조회 미지원)
    Tick,
    /// 초봉 (캔들 조회 미지원)
    Second,
    /// 분봉
    Minute,
    /// 시간봉
    Hour,
    /// 일봉
    Daily,
}

impl Resolution {
    /// 이 해상도의 기간을 반환합니다.
    ///
    /// Tick은 고정 기간이 없으므로 zero를 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Resolution::Tick => Duration::ZERO,
            Resolution::Second => Duration::from_secs(1),
            Resolution::Minute => Duration::from_secs(60),
            Resolution::Hour => Duration::from_secs(60 * 60),
            Resolution::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// 이 해상도의 밀리초 단위 값을 반환합니다.
    pub fn as_millis(&self) -> i64 {
        self.duration().as_millis() as i64
    }

    /// 과거 캔들 조회가 가능한 해상도인지 확인합니다.
    ///
    /// 거래소 캔들 엔드포인트는 분봉 미만을 제공하지 않습니다.
    pub fn supports_candles(&self) -> bool {
        matches!(
            self,
            Resolution::Minute | Resolution::Hour | Resolution::Daily
        )
    }

    /// 타임스탬프(밀리초)를 이 해상도의 버킷 시작으로 내림합니다.
    pub fn floor_millis(&self, timestamp_ms: i64) -> i64 {
        let period = self.as_millis();
        if period == 0 {
            return timestamp_ms;
        }
        timestamp_ms - timestamp_ms.rem_euclid(period)
    }

    /// Bitfinex 캔들 해상도 토큰으로 변환합니다.
    ///
    /// 캔들 조회가 불가능한 해상도는 `None`을 반환합니다.
    pub fn to_bitfinex_token(&self) -> Option<&'static str> {
        match self {
            Resolution::Minute => Some("1m"),
            Resolution::Hour => Some("1h"),
            Resolution::Daily => Some("1D"),
            Resolution::Tick | Resolution::Second => None,
        }
    }

    /// Bitfinex 해상도 토큰에서 파싱합니다.
    pub fn from_bitfinex_token(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Resolution::Minute),
            "1h" => Some(Resolution::Hour),
            "1D" => Some(Resolution::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Tick => write!(f, "tick"),
            Resolution::Second => write!(f, "second"),
            Resolution::Minute => write!(f, "minute"),
            Resolution::Hour => write!(f, "hour"),
            Resolution::Daily => write!(f, "daily"),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tick" => Ok(Resolution::Tick),
            "second" => Ok(Resolution::Second),
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "daily" | "day" => Ok(Resolution::Daily),
            _ => Err(format!("Invalid resolution: {}", s)),
        }
    }
}
