//! # Connector Core
//!
//! Bitfinex 커넥터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 커넥터와 호스팅 엔진 사이에서 공유되는 기본 타입을 제공합니다:
//! - 주문 및 주문 상태 타입
//! - 캔들(Bar) 및 과거 데이터 요청 타입
//! - 보유 자산 및 현금 잔고 타입
//! - 심볼 및 해상도 정의
//! - 자격증명 설정
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use logging::*;
pub use types::*;
