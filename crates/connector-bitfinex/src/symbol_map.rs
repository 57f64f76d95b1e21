//! 심볼 매핑: 내부 [`Symbol`] ↔ Bitfinex 티커 문자열.
//!
//! Bitfinex 거래 페어는 `t` 접두어를 사용합니다. 통화 코드가 3자를
//! 넘으면 콜론으로 구분합니다 (예: `tBTCUSD`, `tDOGE:USD`).

use crate::error::{ConnectorError, ConnectorResult};
use connector_core::{MarketType, Symbol};

/// 심볼 변환 트레이트.
///
/// 라우팅 전에 반드시 통과해야 하며, 매핑 불가 심볼은 하드 실패입니다.
pub trait SymbolMapper: Send + Sync {
    /// 내부 심볼을 거래소 티커로 변환합니다.
    fn to_venue(&self, symbol: &Symbol) -> ConnectorResult<String>;

    /// 거래소 티커를 내부 심볼로 변환합니다.
    fn from_venue(&self, ticker: &str) -> ConnectorResult<Symbol>;
}

/// 규칙 기반 기본 매퍼.
#[derive(Debug, Default, Clone)]
pub struct BitfinexSymbolMap;

impl BitfinexSymbolMap {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolMapper for BitfinexSymbolMap {
    fn to_venue(&self, symbol: &Symbol) -> ConnectorResult<String> {
        if !symbol.is_crypto() {
            return Err(ConnectorError::SymbolNotFound(symbol.to_string()));
        }
        if symbol.base.is_empty() || symbol.quote.is_empty() {
            return Err(ConnectorError::SymbolNotFound(symbol.to_string()));
        }

        let base = symbol.base.to_uppercase();
        let quote = symbol.quote.to_uppercase();

        if base.len() > 3 || quote.len() > 3 {
            Ok(format!("t{}:{}", base, quote))
        } else {
            Ok(format!("t{}{}", base, quote))
        }
    }

    fn from_venue(&self, ticker: &str) -> ConnectorResult<Symbol> {
        let body = ticker
            .strip_prefix('t')
            .ok_or_else(|| ConnectorError::SymbolNotFound(ticker.to_string()))?;

        let (base, quote) = if let Some((base, quote)) = body.split_once(':') {
            (base, quote)
        } else if body.len() == 6 {
            body.split_at(3)
        } else {
            return Err(ConnectorError::SymbolNotFound(ticker.to_string()));
        };

        if base.is_empty() || quote.is_empty() {
            return Err(ConnectorError::SymbolNotFound(ticker.to_string()));
        }

        Ok(Symbol {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
            market_type: MarketType::Crypto,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_venue_short_codes() {
        let map = BitfinexSymbolMap::new();
        let symbol = Symbol::crypto("BTC", "USD");
        assert_eq!(map.to_venue(&symbol).unwrap(), "tBTCUSD");
    }

    #[test]
    fn test_to_venue_long_codes_use_colon() {
        let map = BitfinexSymbolMap::new();
        let symbol = Symbol::crypto("DOGE", "USD");
        assert_eq!(map.to_venue(&symbol).unwrap(), "tDOGE:USD");
    }

    #[test]
    fn test_from_venue_round_trip() {
        let map = BitfinexSymbolMap::new();
        for ticker in ["tBTCUSD", "tETHBTC", "tDOGE:USD", "tBTC:USDT"] {
            let symbol = map.from_venue(ticker).unwrap();
            assert_eq!(map.to_venue(&symbol).unwrap(), ticker);
        }
    }

    #[test]
    fn test_non_crypto_rejected() {
        let map = BitfinexSymbolMap::new();
        let stock = Symbol::stock("AAPL", "USD");
        assert!(matches!(
            map.to_venue(&stock),
            Err(ConnectorError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_ticker_rejected() {
        let map = BitfinexSymbolMap::new();
        assert!(map.from_venue("BTCUSD").is_err());
        assert!(map.from_venue("tBTCUS").is_err());
        assert!(map.from_venue("t:USD").is_err());
    }
}
