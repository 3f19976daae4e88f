//! Earnings proximity filter.
//!
//! Trading into earnings is a binary event where technical setups stop
//! working, so signal confidence is scaled down as the report approaches
//! and the direction is forced to HOLD on the day itself.
//!
//! Schedule: today 0.30, 1-3 days 0.50, 4-7 days 0.75, 8-14 days 0.90,
//! beyond 14 days no adjustment.

use chrono::NaiveDate;
use fusion_core::{AssetClass, EarningsFilter};

/// Build the filter from the next known earnings date. Crypto pairs have
/// no earnings and always get the no-op filter.
pub fn earnings_filter(
    asset_class: AssetClass,
    today: NaiveDate,
    next_earnings: Option<NaiveDate>,
) -> EarningsFilter {
    if asset_class == AssetClass::Crypto {
        return EarningsFilter::none();
    }

    let Some(earnings_date) = next_earnings else {
        return EarningsFilter::none();
    };

    let days_diff = (earnings_date - today).num_days();
    if !(0..=14).contains(&days_diff) {
        return EarningsFilter::none();
    }

    let (multiplier, warning) = if days_diff == 0 {
        (
            0.30,
            format!("EARNINGS TODAY ({earnings_date}) - signal unreliable; HOLD recommended"),
        )
    } else if days_diff <= 3 {
        (
            0.50,
            format!("Earnings in {days_diff} day(s) ({earnings_date}) - confidence reduced 50%"),
        )
    } else if days_diff <= 7 {
        (
            0.75,
            format!("Earnings in {days_diff} day(s) ({earnings_date}) - confidence reduced 25%"),
        )
    } else {
        (
            0.90,
            format!("Earnings in {days_diff} day(s) ({earnings_date}) - minor caution"),
        )
    };

    EarningsFilter {
        confidence_multiplier: multiplier,
        days_to_earnings: Some(days_diff),
        earnings_date: Some(earnings_date),
        warning: Some(warning),
        is_earnings_today: days_diff == 0,
    }
}
