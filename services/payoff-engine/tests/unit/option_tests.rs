use approx::assert_abs_diff_eq;
use assert_matches::assert_matches;
use payoff_engine::{EngineError, OptionInstrument, OptionKind, PositionSide};
use rstest::*;

use crate::test_config::{config::*, init_test_env, sample_call};

#[fixture]
fn call() -> OptionInstrument {
    init_test_env();
    sample_call()
}

mod construction {
    use super::*;

    #[rstest]
    #[case(0.0, 3200.0, 55.9, 2520.0)]
    #[case(-1.0, 3200.0, 55.9, 2520.0)]
    #[case(1.0, 0.0, 55.9, 2520.0)]
    #[case(1.0, 3200.0, -0.1, 2520.0)]
    #[case(1.0, 3200.0, 55.9, 0.0)]
    #[case(f64::NAN, 3200.0, 55.9, 2520.0)]
    #[case(1.0, f64::INFINITY, 55.9, 2520.0)]
    fn test_rejects_invalid_numbers(
        #[case] quantity: f64,
        #[case] strike: f64,
        #[case] premium: f64,
        #[case] spot: f64,
    ) {
        let result = OptionInstrument::new(OptionKind::Call, PositionSide::Buy, quantity, strike, premium, spot, 30);
        assert_matches!(result, Err(EngineError::InvalidParameter(_)));
    }

    #[rstest]
    fn test_rejects_zero_expiration() {
        let result = OptionInstrument::new(OptionKind::Put, PositionSide::Sell, 1.0, 100.0, 5.0, 100.0, 0);
        assert_matches!(result, Err(EngineError::InvalidParameter(_)));
    }

    #[rstest]
    fn test_zero_premium_is_allowed() {
        assert!(OptionInstrument::new(OptionKind::Call, PositionSide::Buy, 1.0, 100.0, 0.0, 100.0, 10).is_ok());
    }

    #[rstest]
    fn test_failed_setter_keeps_previous_value(mut call: OptionInstrument) {
        assert!(call.set_quantity(0.0).is_err());
        assert!(call.set_expiration_days(0).is_err());
        assert!(call.set_risk_free_rate(f64::NAN).is_err());
        assert_eq!(call.quantity(), CALL_QUANTITY);
        assert_eq!(call.expiration_days(), CALL_EXPIRY_DAYS);
        assert_eq!(call.risk_free_rate(), 0.0);
    }

    #[rstest]
    #[case("call", OptionKind::Call)]
    #[case("CALL", OptionKind::Call)]
    #[case("Put", OptionKind::Put)]
    fn test_option_kind_parses_case_insensitively(#[case] input: &str, #[case] expected: OptionKind) {
        assert_eq!(input.parse::<OptionKind>().unwrap(), expected);
    }

    #[rstest]
    fn test_unknown_kind_and_side_are_rejected() {
        assert_matches!("straddle".parse::<OptionKind>(), Err(EngineError::InvalidInstrumentKind(_)));
        assert_matches!("hold".parse::<PositionSide>(), Err(EngineError::InvalidInstrumentKind(_)));
        assert_eq!("sell".parse::<PositionSide>().unwrap(), PositionSide::Sell);
    }
}

mod presentation {
    use super::*;

    #[rstest]
    fn test_label_format(call: OptionInstrument) {
        assert_eq!(call.label(), "Call Buy 0.5 @ 3200. $27.95 (30d)");
    }

    #[rstest]
    fn test_premium_cash_flow_sign(mut call: OptionInstrument) {
        assert_abs_diff_eq!(call.total_premium(), 27.95, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(call.premium_cash_flow(), -27.95, epsilon = STANDARD_EPSILON);

        call.set_side(PositionSide::Sell);
        assert_abs_diff_eq!(call.premium_cash_flow(), 27.95, epsilon = STANDARD_EPSILON);
    }
}

mod payoff {
    use super::*;

    #[rstest]
    fn test_expiry_payoff_is_intrinsic_less_premium(call: OptionInstrument) {
        let payoff = call.payoff(&[2520.0, 3200.0, 3300.0, 4000.0], CALL_EXPIRY_DAYS).unwrap();

        assert_abs_diff_eq!(payoff[0], -27.95, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(payoff[1], -27.95, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(payoff[2], 22.05, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(payoff[3], 372.05, epsilon = STANDARD_EPSILON);
    }

    #[rstest]
    fn test_days_past_expiry_clamp_to_expiry(call: OptionInstrument) {
        assert_eq!(call.time_to_expiry(45), 0.0);
        assert_eq!(call.pnl_at(3300.0, 45).unwrap(), call.pnl_at(3300.0, CALL_EXPIRY_DAYS).unwrap());
    }

    #[rstest]
    fn test_entry_value_is_flat(call: OptionInstrument) {
        // Marked at entry spot and full expiry, the leg is worth its premium
        assert_abs_diff_eq!(call.pnl_at(ETH_SPOT, 0).unwrap(), 0.0, epsilon = LOOSE_EPSILON);
    }

    #[rstest]
    fn test_sell_mirrors_buy(call: OptionInstrument) {
        let mut short = call.clone();
        short.set_side(PositionSide::Sell);
        let prices = [2000.0, 2800.0, 3200.0, 3600.0];

        for days in [0, 15, CALL_EXPIRY_DAYS] {
            let long_pnl = call.payoff(&prices, days).unwrap();
            let short_pnl = short.payoff(&prices, days).unwrap();
            for (l, s) in long_pnl.iter().zip(&short_pnl) {
                assert_abs_diff_eq!(l + s, 0.0, epsilon = STANDARD_EPSILON);
            }
        }
    }

    #[rstest]
    fn test_time_value_before_expiry(call: OptionInstrument) {
        let mid_life = call.pnl_at(3300.0, 15).unwrap();
        let at_expiry = call.pnl_at(3300.0, CALL_EXPIRY_DAYS).unwrap();
        assert!(mid_life > at_expiry);
    }

    #[rstest]
    fn test_put_expiry_payoff() {
        let put = OptionInstrument::new(OptionKind::Put, PositionSide::Buy, 2.0, 2400.0, 40.0, 2520.0, 14).unwrap();
        let payoff = put.payoff(&[2000.0, 2400.0, 2800.0], 14).unwrap();

        assert_abs_diff_eq!(payoff[0], 720.0, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(payoff[1], -80.0, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(payoff[2], -80.0, epsilon = STANDARD_EPSILON);
    }

    #[rstest]
    fn test_unsolvable_premium_fails_before_expiry() {
        // Premium above the underlying price has no implied volatility
        let option = OptionInstrument::new(OptionKind::Call, PositionSide::Buy, 1.0, 100.0, 150.0, 100.0, 30).unwrap();

        assert_matches!(option.payoff(&[90.0, 110.0], 0), Err(EngineError::ConvergenceFailure { .. }));
        // At expiry no volatility is needed
        assert!(option.payoff(&[90.0, 110.0], 30).is_ok());
    }
}

mod analytics {
    use super::*;

    #[rstest]
    fn test_greeks_scale_with_quantity_and_side(call: OptionInstrument) {
        let long = call.greeks(ETH_SPOT, 0).unwrap();
        assert_abs_diff_eq!(long.delta, 0.0943, epsilon = 1e-3);
        assert!(long.theta < 0.0);

        let mut short = call.clone();
        short.set_side(PositionSide::Sell);
        let short = short.greeks(ETH_SPOT, 0).unwrap();
        assert_abs_diff_eq!(short.delta, -long.delta, epsilon = STANDARD_EPSILON);
        assert_abs_diff_eq!(short.theta, -long.theta, epsilon = STANDARD_EPSILON);
    }

    #[rstest]
    fn test_greeks_vanish_after_expiry(call: OptionInstrument) {
        let greeks = call.greeks(ETH_SPOT, CALL_EXPIRY_DAYS).unwrap();
        assert_eq!(greeks.delta, 0.0);
        assert_eq!(greeks.theta, 0.0);
    }

    #[rstest]
    fn test_pricing_consistency_round_trips_premium(call: OptionInstrument) {
        let consistency = call.pricing_consistency().unwrap();

        assert_eq!(consistency.actual_premium, CALL_PREMIUM);
        assert_abs_diff_eq!(consistency.theoretical_premium, CALL_PREMIUM, epsilon = LOOSE_EPSILON);
        assert_abs_diff_eq!(consistency.difference, 0.0, epsilon = LOOSE_EPSILON);
        assert_abs_diff_eq!(consistency.percentage_difference, 0.0, epsilon = LOOSE_EPSILON);
    }

    #[rstest]
    fn test_volatility_follows_entry_edits(mut call: OptionInstrument) {
        let before = call.implied_volatility().unwrap();
        call.set_premium_per_unit(80.0).unwrap();
        let after = call.implied_volatility().unwrap();
        assert!(after > before);
    }
}
