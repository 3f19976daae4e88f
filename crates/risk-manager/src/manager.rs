//! Risk management rules: position limits, stops, drawdown gates, and
//! risk-gated action plans. All functions are stateless over the current
//! portfolio snapshot; alerts are returned to the caller for persistence.

use fusion_core::{
    AlertSeverity, AssetClass, Direction, RiskAlert, RiskLimits, StopLossConfig,
};

use crate::models::*;

/// Check whether a proposed position violates portfolio limits.
///
/// `current_crypto_value` is the market value of existing crypto
/// holdings; when the caller cannot supply it, cost basis is an
/// acceptable fallback.
pub fn check_position_limits(
    proposed_value: f64,
    portfolio_value: f64,
    asset_class: AssetClass,
    current_crypto_value: f64,
    limits: &RiskLimits,
    stops: &StopLossConfig,
) -> PositionLimitCheck {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    let position_pct = if portfolio_value > 0.0 {
        proposed_value / portfolio_value
    } else {
        1.0
    };

    if position_pct > limits.max_single_position {
        violations.push(format!(
            "Position {:.1}% exceeds max {:.0}%",
            position_pct * 100.0,
            limits.max_single_position * 100.0
        ));
    }

    if asset_class == AssetClass::Crypto && portfolio_value > 0.0 {
        let new_crypto_pct = (current_crypto_value + proposed_value) / portfolio_value;
        if new_crypto_pct > limits.max_crypto_allocation {
            violations.push(format!(
                "Crypto allocation {:.1}% exceeds max {:.0}%",
                new_crypto_pct * 100.0,
                limits.max_crypto_allocation * 100.0
            ));
        }
    }

    // Dollar risk to the hard stop; a breach warns but does not block
    let trade_risk = proposed_value * stops.percentage;
    let trade_risk_pct = if portfolio_value > 0.0 {
        trade_risk / portfolio_value
    } else {
        1.0
    };
    if trade_risk_pct > limits.max_trade_risk {
        warnings.push(format!(
            "Trade risk {:.2}% exceeds max {:.1}%",
            trade_risk_pct * 100.0,
            limits.max_trade_risk * 100.0
        ));
    }

    PositionLimitCheck {
        allowed: violations.is_empty(),
        violations,
        warnings,
    }
}

/// Compute candidate stop levels and pick the tightest (highest) one.
/// The ATR stop is omitted when no ATR is available.
pub fn calculate_stop_loss(
    entry_price: f64,
    atr_value: Option<f64>,
    cfg: &StopLossConfig,
) -> StopLossLevels {
    let pct_stop = entry_price * (1.0 - cfg.percentage);
    let trailing_stop = entry_price * (1.0 - cfg.trailing);
    let atr_stop = atr_value
        .filter(|a| *a > 0.0)
        .map(|a| entry_price - cfg.atr_multiplier * a);

    let recommended = [atr_stop, Some(pct_stop), Some(trailing_stop)]
        .into_iter()
        .flatten()
        .fold(f64::NEG_INFINITY, f64::max);

    StopLossLevels {
        atr_stop,
        pct_stop,
        trailing_stop,
        recommended,
    }
}

/// Analyse peak-to-current drawdown and pick the protection status.
pub fn check_drawdown(equity_curve: &[f64], limits: &RiskLimits) -> DrawdownCheck {
    if equity_curve.len() < 2 {
        return DrawdownCheck {
            current_drawdown: 0.0,
            max_drawdown: 0.0,
            status: DrawdownStatus::Ok,
            actions: Vec::new(),
            alert: None,
        };
    }

    let mut peak = equity_curve[0];
    let mut max_dd = 0.0f64;
    let mut current_dd = 0.0f64;

    for &val in equity_curve {
        if val > peak {
            peak = val;
        }
        if peak == 0.0 {
            peak = val;
            continue;
        }
        let dd = (peak - val) / peak;
        max_dd = max_dd.max(dd);
        current_dd = dd;
    }

    let (status, actions, alert) = if current_dd >= limits.drawdown_reduce {
        (
            DrawdownStatus::Critical,
            vec![
                "Reduce positions by 25%".to_string(),
                "Move to cash".to_string(),
            ],
            Some(RiskAlert {
                alert_type: "drawdown".to_string(),
                severity: AlertSeverity::Critical,
                message: format!("Drawdown {:.1}% - Reducing positions", current_dd * 100.0),
                symbol: None,
            }),
        )
    } else if current_dd >= limits.drawdown_halt {
        (
            DrawdownStatus::Halt,
            vec!["Stop all new BUY signals".to_string()],
            Some(RiskAlert {
                alert_type: "drawdown".to_string(),
                severity: AlertSeverity::High,
                message: format!("Drawdown {:.1}% - Halting new buys", current_dd * 100.0),
                symbol: None,
            }),
        )
    } else if current_dd >= limits.drawdown_warning {
        (
            DrawdownStatus::Warning,
            vec!["New position sizes halved".to_string()],
            Some(RiskAlert {
                alert_type: "drawdown".to_string(),
                severity: AlertSeverity::Warning,
                message: format!(
                    "Drawdown {:.1}% - Reducing position sizes",
                    current_dd * 100.0
                ),
                symbol: None,
            }),
        )
    } else {
        (DrawdownStatus::Ok, Vec::new(), None)
    };

    DrawdownCheck {
        current_drawdown: current_dd,
        max_drawdown: max_dd,
        status,
        actions,
        alert,
    }
}

/// Minimum cash reserve check; breached reserve blocks new BUYs.
pub fn check_cash_reserve(cash: f64, portfolio_value: f64, limits: &RiskLimits) -> CashReserveCheck {
    let cash_pct = if portfolio_value > 0.0 {
        cash / portfolio_value
    } else {
        1.0
    };
    let ok = cash_pct >= limits.min_cash_reserve;

    CashReserveCheck {
        cash,
        cash_pct,
        min_required: limits.min_cash_reserve,
        ok,
        message: if ok {
            None
        } else {
            Some(format!(
                "Cash {:.1}% below minimum {:.0}%",
                cash_pct * 100.0,
                limits.min_cash_reserve * 100.0
            ))
        },
    }
}

/// Generate a concrete action plan from a directional signal.
///
/// BUY plans pass through the drawdown and cash-reserve gates first; a
/// blocked plan carries `blocked = true` and the reason rather than being
/// silently downgraded to HOLD. Position value is risk-based: the
/// per-trade risk budget divided by the stop distance, capped by the
/// single-position limit and 90% of available cash.
#[allow(clippy::too_many_arguments)]
pub fn generate_action_plan(
    signal_direction: Direction,
    current_price: f64,
    atr_value: Option<f64>,
    portfolio_value: f64,
    cash: f64,
    asset_class: AssetClass,
    equity_curve: &[f64],
    limits: &RiskLimits,
    stops: &StopLossConfig,
) -> ActionPlan {
    if signal_direction == Direction::Hold {
        return ActionPlan::empty(Direction::Hold, current_price);
    }

    let mut warnings: Vec<String> = Vec::new();
    let dd = check_drawdown(equity_curve, limits);
    let mut size_multiplier = 1.0;

    if signal_direction == Direction::Buy {
        match dd.status {
            DrawdownStatus::Critical => {
                let mut plan = ActionPlan::empty(Direction::Buy, current_price);
                plan.blocked = true;
                plan.blocked_reason = Some(format!(
                    "Drawdown critical ({:.1}%) - BUY blocked",
                    dd.current_drawdown * 100.0
                ));
                return plan;
            }
            DrawdownStatus::Halt => {
                let mut plan = ActionPlan::empty(Direction::Buy, current_price);
                plan.blocked = true;
                plan.blocked_reason = Some(format!(
                    "Drawdown halt ({:.1}%) - No new buys",
                    dd.current_drawdown * 100.0
                ));
                return plan;
            }
            DrawdownStatus::Warning => {
                warnings.push("Drawdown warning - Position size halved".to_string());
                size_multiplier = 0.5;
            }
            DrawdownStatus::Ok => {}
        }

        let cash_check = check_cash_reserve(cash, portfolio_value, limits);
        if !cash_check.ok {
            let mut plan = ActionPlan::empty(Direction::Buy, current_price);
            plan.blocked = true;
            plan.blocked_reason = cash_check.message;
            return plan;
        }
    }

    let stop_levels = calculate_stop_loss(current_price, atr_value, stops);
    let stop_price = stop_levels.recommended;
    let stop_distance = (current_price - stop_price).abs();
    let stop_pct = if current_price > 0.0 {
        stop_distance / current_price
    } else {
        stops.percentage
    };

    // Risk-based sizing: budget / stop distance, then the caps
    let risk_budget = limits.max_trade_risk * portfolio_value;
    let mut position_value = if stop_pct > 0.0 {
        risk_budget / stop_pct
    } else {
        risk_budget
    };

    let max_position = limits.max_single_position * portfolio_value;
    position_value = position_value.min(max_position).min(cash * 0.9).max(0.0);
    position_value *= size_multiplier;

    let limit_check = check_position_limits(
        position_value,
        portfolio_value,
        asset_class,
        0.0,
        limits,
        stops,
    );
    if !limit_check.allowed {
        warnings.extend(limit_check.violations);
        position_value = position_value.min(max_position);
    }
    warnings.extend(limit_check.warnings);

    // Whole shares for equities, 4-decimal units for crypto
    let shares = if current_price > 0.0 {
        match asset_class {
            AssetClass::Crypto => (position_value / current_price * 10_000.0).round() / 10_000.0,
            AssetClass::Stock => (position_value / current_price).floor(),
        }
    } else {
        0.0
    };

    let actual_position_value = shares * current_price;
    let position_pct = if portfolio_value > 0.0 {
        actual_position_value / portfolio_value
    } else {
        0.0
    };

    let total_risk = shares * stop_distance;
    let risk_pct = if portfolio_value > 0.0 {
        total_risk / portfolio_value
    } else {
        0.0
    };

    // Fixed 1:2 risk-reward target
    let target_price = match signal_direction {
        Direction::Buy => Some(current_price + 2.0 * stop_distance),
        Direction::Sell => Some(current_price - 2.0 * stop_distance),
        Direction::Hold => None,
    };

    ActionPlan {
        action: signal_direction,
        shares,
        entry_price: current_price,
        position_value: actual_position_value,
        position_pct,
        stop_loss: stop_price,
        stop_loss_pct: stop_pct,
        total_risk,
        risk_pct,
        target_price,
        risk_reward: "1:2".to_string(),
        warnings,
        blocked: false,
        blocked_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (RiskLimits, StopLossConfig) {
        (RiskLimits::default(), StopLossConfig::default())
    }

    #[test]
    fn oversized_position_violates() {
        let (limits, stops) = defaults();
        let check =
            check_position_limits(20_000.0, 100_000.0, AssetClass::Stock, 0.0, &limits, &stops);
        assert!(!check.allowed);
        assert_eq!(check.violations.len(), 1);
    }

    #[test]
    fn crypto_allocation_cap() {
        let (limits, stops) = defaults();
        // 25k existing + 10k proposed = 35% > 30% cap
        let check = check_position_limits(
            10_000.0,
            100_000.0,
            AssetClass::Crypto,
            25_000.0,
            &limits,
            &stops,
        );
        assert!(!check.allowed);
        assert!(check.violations[0].contains("Crypto allocation"));
    }

    #[test]
    fn stop_loss_picks_tightest() {
        let (_, stops) = defaults();
        // ATR stop: 100 - 2*1.5 = 97; pct: 95; trailing: 93 -> 97 wins
        let levels = calculate_stop_loss(100.0, Some(1.5), &stops);
        assert!((levels.recommended - 97.0).abs() < 1e-9);
        // Without ATR, the 5% stop is the tightest remaining
        let levels = calculate_stop_loss(100.0, None, &stops);
        assert!(levels.atr_stop.is_none());
        assert!((levels.recommended - 95.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_statuses() {
        let (limits, _) = defaults();
        let ok = check_drawdown(&[100_000.0, 98_000.0], &limits);
        assert_eq!(ok.status, DrawdownStatus::Ok);
        assert!(ok.alert.is_none());

        let warning = check_drawdown(&[100_000.0, 91_000.0], &limits);
        assert_eq!(warning.status, DrawdownStatus::Warning);
        assert_eq!(
            warning.alert.as_ref().unwrap().severity,
            AlertSeverity::Warning
        );

        let halt = check_drawdown(&[100_000.0, 87_000.0], &limits);
        assert_eq!(halt.status, DrawdownStatus::Halt);

        let critical = check_drawdown(&[100_000.0, 84_000.0], &limits);
        assert_eq!(critical.status, DrawdownStatus::Critical);
        assert_eq!(
            critical.alert.as_ref().unwrap().severity,
            AlertSeverity::Critical
        );
    }

    #[test]
    fn drawdown_measured_from_running_peak() {
        let (limits, _) = defaults();
        let check = check_drawdown(&[100_000.0, 120_000.0, 105_000.0], &limits);
        assert!((check.current_drawdown - 0.125).abs() < 1e-9);
        assert_eq!(check.status, DrawdownStatus::Halt);
    }

    // Scenario: 13% drawdown from the initial peak blocks a proposed BUY
    #[test]
    fn drawdown_halt_blocks_buy_plan() {
        let (limits, stops) = defaults();
        let plan = generate_action_plan(
            Direction::Buy,
            50.0,
            Some(1.0),
            87_000.0,
            30_000.0,
            AssetClass::Stock,
            &[100_000.0, 95_000.0, 87_000.0],
            &limits,
            &stops,
        );
        assert!(plan.blocked);
        assert!(plan.blocked_reason.unwrap().contains("halt"));
        assert_eq!(plan.shares, 0.0);
    }

    #[test]
    fn low_cash_blocks_buy_plan() {
        let (limits, stops) = defaults();
        let plan = generate_action_plan(
            Direction::Buy,
            50.0,
            None,
            100_000.0,
            5_000.0,
            AssetClass::Stock,
            &[100_000.0, 100_000.0],
            &limits,
            &stops,
        );
        assert!(plan.blocked);
        assert!(plan.blocked_reason.unwrap().contains("Cash"));
    }

    #[test]
    fn buy_plan_sizing_and_target() {
        let (limits, stops) = defaults();
        let plan = generate_action_plan(
            Direction::Buy,
            100.0,
            Some(1.0), // ATR stop at 98 -> 2% stop distance
            100_000.0,
            50_000.0,
            AssetClass::Stock,
            &[100_000.0, 100_000.0],
            &limits,
            &stops,
        );
        assert!(!plan.blocked);
        // 1% risk budget / 2% stop = 50k, capped at 15% portfolio = 15k
        assert!((plan.position_value - 15_000.0).abs() < 100.0);
        assert_eq!(plan.shares, 150.0);
        // Target = 100 + 2 * 2 = 104
        assert!((plan.target_price.unwrap() - 104.0).abs() < 1e-9);
        assert_eq!(plan.risk_reward, "1:2");
    }

    #[test]
    fn warning_drawdown_halves_position() {
        let (limits, stops) = defaults();
        let full = generate_action_plan(
            Direction::Buy,
            100.0,
            Some(1.0),
            100_000.0,
            90_000.0,
            AssetClass::Stock,
            &[100_000.0, 100_000.0],
            &limits,
            &stops,
        );
        let halved = generate_action_plan(
            Direction::Buy,
            100.0,
            Some(1.0),
            100_000.0,
            90_000.0,
            AssetClass::Stock,
            &[100_000.0, 91_000.0],
            &limits,
            &stops,
        );
        assert!(!halved.blocked);
        assert!(halved.position_value < full.position_value);
        assert!(halved.warnings.iter().any(|w| w.contains("halved")));
    }

    #[test]
    fn crypto_shares_are_fractional() {
        let (limits, stops) = defaults();
        let plan = generate_action_plan(
            Direction::Buy,
            43_251.17,
            None,
            100_000.0,
            60_000.0,
            AssetClass::Crypto,
            &[100_000.0],
            &limits,
            &stops,
        );
        assert!(!plan.blocked);
        assert!(plan.shares > 0.0 && plan.shares < 1.0);
        // 4 decimal places
        assert!((plan.shares * 10_000.0).fract().abs() < 1e-6);
    }

    #[test]
    fn hold_gets_empty_plan() {
        let (limits, stops) = defaults();
        let plan = generate_action_plan(
            Direction::Hold,
            100.0,
            None,
            100_000.0,
            50_000.0,
            AssetClass::Stock,
            &[],
            &limits,
            &stops,
        );
        assert_eq!(plan.shares, 0.0);
        assert!(!plan.blocked);
    }
}
