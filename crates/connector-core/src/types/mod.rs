//! 기본 타입 정의.

pub mod resolution;
pub mod symbol;

pub use resolution::Resolution;
pub use symbol::{MarketType, Symbol};

/// 가격 타입 별칭.
pub type Price = rust_decimal::Decimal;

/// 수량 타입 별칭.
pub type Quantity = rust_decimal::Decimal;
