use crate::data_sync::rate::ExchangeRate;
use crate::utils::{BTC_DECIMALS, FIAT_DECIMALS, SATS_PER_BTC};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Display unit for satoshi amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Unit {
    #[default]
    #[strum(serialize = "BTC")]
    BTC,
    #[strum(serialize = "USD")]
    USD,
}

/// A formatted amount, or a marker that it cannot be computed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    Amount(String),
    /// The exchange rate is not known
    Unavailable,
}

impl DisplayValue {
    pub const UNAVAILABLE: &'static str = "unavailable";

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Amount(_))
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(s) => f.write_str(s),
            Self::Unavailable => f.write_str(Self::UNAVAILABLE),
        }
    }
}

pub fn sats_to_btc(raw_satoshis: u64) -> f64 {
    raw_satoshis as f64 / SATS_PER_BTC as f64
}

/// Format a satoshi amount for display.
///
/// BTC is exact, computed on integers. USD needs a known rate; with
/// [`ExchangeRate::Unknown`] the result is [`DisplayValue::Unavailable`],
/// never a zero amount.
pub fn to_display_value(raw_satoshis: u64, unit: Unit, rate: ExchangeRate) -> DisplayValue {
    match unit {
        Unit::BTC => {
            let whole = raw_satoshis / SATS_PER_BTC;
            let frac = raw_satoshis % SATS_PER_BTC;
            DisplayValue::Amount(format!("{whole}.{frac:0width$}", width = BTC_DECIMALS))
        }
        Unit::USD => match rate {
            ExchangeRate::Known(rate) => {
                let usd = sats_to_btc(raw_satoshis) * rate;
                DisplayValue::Amount(format!("${usd:.prec$}", prec = FIAT_DECIMALS))
            }
            ExchangeRate::Unknown => DisplayValue::Unavailable,
        },
    }
}
