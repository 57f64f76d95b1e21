//! Bitfinex 거래 커넥터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Brokerage trait: 호스트 엔진용 브로커리지 인터페이스
//! - 서명 REST 클라이언트 (HMAC-SHA384, nonce, rate limiting)
//! - 인증 WebSocket 세션 (주문 커맨드, 체결 스트림, 재연결)
//! - 주문 상관관계 추적 및 대사
//! - 과거 캔들 백필 엔진

pub mod account;
pub mod brokerage;
pub mod config;
pub mod error;
pub mod history;
pub mod messages;
pub mod orders;
pub mod rate_limit;
pub mod rest;
pub mod session;
pub mod signing;
pub mod symbol_map;
pub mod tracker;
pub mod traits;

pub use brokerage::BitfinexBrokerage;
pub use config::BitfinexConfig;
pub use error::{ConnectorError, ConnectorResult};
pub use history::{BarSeries, BitfinexHistory};
pub use rest::BitfinexRestClient;
pub use session::{BitfinexSession, SessionEvent};
pub use symbol_map::{BitfinexSymbolMap, SymbolMapper};
pub use tracker::OrderTracker;
pub use traits::Brokerage;
