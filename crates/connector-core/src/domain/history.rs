//! 과거 데이터 요청 타입.

use crate::types::{Resolution, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 틱 데이터 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickType {
    /// 체결 데이터
    Trade,
    /// 호가 데이터
    Quote,
}

/// 과거 캔들 조회 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// 심볼
    pub symbol: Symbol,
    /// 해상도
    pub resolution: Resolution,
    /// 조회 시작 (UTC, 포함)
    pub start_utc: DateTime<Utc>,
    /// 조회 종료 (UTC, 미포함)
    pub end_utc: DateTime<Utc>,
    /// 틱 유형
    pub tick_type: TickType,
}

impl HistoryRequest {
    /// 체결 기반 캔들 요청을 생성합니다.
    pub fn trade(
        symbol: Symbol,
        resolution: Resolution,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol,
            resolution,
            start_utc,
            end_utc,
            tick_type: TickType::Trade,
        }
    }
}
