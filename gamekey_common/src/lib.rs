mod coins;
mod fiat;
mod helpers;

pub mod op;
mod secret;

pub use coins::{Coins, CoinsConversionError, COIN_CURRENCY_CODE};
pub use fiat::{FiatAmount, FiatParseError};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
