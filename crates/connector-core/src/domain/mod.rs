//! 도메인 모델.

pub mod account;
pub mod bar;
pub mod events;
pub mod history;
pub mod order;

pub use account::{CashAmount, Holding};
pub use bar::Bar;
pub use events::{BrokerageMessage, MessageSeverity, OrderEvent};
pub use history::{HistoryRequest, TickType};
pub use order::{Order, OrderStatusKind, OrderType};
