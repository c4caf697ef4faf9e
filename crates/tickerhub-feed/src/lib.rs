//! Wire normalizers for tickerhub.
//!
//! Each supported exchange gets a typed wire schema and a `WireProtocol`
//! implementation that turns REST bodies and WebSocket pushes into
//! `TickerData`. Normalizers are pure: they never perform I/O and keep
//! no state between calls.

pub mod binance;
pub mod bybit;
pub mod coinbase;
pub mod error;
pub mod kraken;
pub mod protocol;
mod wire;

pub use binance::BinanceProtocol;
pub use bybit::BybitProtocol;
pub use coinbase::CoinbaseProtocol;
pub use error::{FeedError, FeedResult};
pub use kraken::KrakenProtocol;
pub use protocol::{protocol_for, NormalizeContext, PercentConvention, RestRequest, WireProtocol};
