use approx::{assert_abs_diff_eq, assert_relative_eq};
use assert_matches::assert_matches;
use payoff_engine::liquidity::ticks_between;
use payoff_engine::{EngineError, LiquidityPosition};
use proptest::prelude::*;
use rstest::*;

use crate::test_config::{config::*, init_test_env, sample_liquidity};

#[fixture]
fn lp() -> LiquidityPosition {
    init_test_env();
    sample_liquidity()
}

mod construction {
    use super::*;

    #[rstest]
    #[case(3000.0, 2000.0)]
    #[case(2500.0, 2500.0)]
    fn test_inverted_range_is_rejected(#[case] lower: f64, #[case] upper: f64) {
        let result = LiquidityPosition::new(lower, upper, ETH_SPOT, LP_CAPITAL, 0.5, LP_APR);
        assert_matches!(result, Err(EngineError::InvalidRange { .. }));
    }

    #[rstest]
    #[case(0.0, LP_CAPITAL, 0.5, LP_APR)]
    #[case(ETH_SPOT, 0.0, 0.5, LP_APR)]
    #[case(ETH_SPOT, LP_CAPITAL, 1.5, LP_APR)]
    #[case(ETH_SPOT, LP_CAPITAL, 0.5, -1.0)]
    fn test_invalid_fields_are_rejected(
        #[case] price: f64,
        #[case] capital: f64,
        #[case] fraction: f64,
        #[case] apr: f64,
    ) {
        let result = LiquidityPosition::new(LP_LOWER, LP_UPPER, price, capital, fraction, apr);
        assert_matches!(result, Err(EngineError::InvalidParameter(_)));
    }

    #[rstest]
    fn test_range_edits(mut lp: LiquidityPosition) {
        lp.set_range(1800.0, 3200.0).unwrap();
        assert_eq!((lp.lower_price(), lp.upper_price()), (1800.0, 3200.0));

        assert_matches!(lp.set_upper_price(1700.0), Err(EngineError::InvalidRange { .. }));
        assert_eq!(lp.upper_price(), 3200.0);
        assert_eq!(lp.label(), "UniV3 IL 1800 3200");
    }
}

mod allocation {
    use super::*;

    #[rstest]
    fn test_in_range_split_balances_liquidity(lp: LiquidityPosition) {
        let allocation = lp.allocation().unwrap();

        assert_abs_diff_eq!(allocation.liquidity, 165.4717, epsilon = 1e-3);
        assert_abs_diff_eq!(allocation.amount0, 0.27520, epsilon = 1e-4);
        assert_abs_diff_eq!(allocation.amount1, 906.494, epsilon = 1e-2);
        assert_relative_eq!(allocation.amount0 * ETH_SPOT + allocation.amount1, LP_CAPITAL, max_relative = 1e-12);
    }

    #[rstest]
    fn test_amounts_at_entry_reproduce_deposits(lp: LiquidityPosition) {
        let (held0, held1) = lp.token_amounts_at_price(ETH_SPOT).unwrap();
        let (deposited0, deposited1) = lp.deposited_amounts().unwrap();

        assert_abs_diff_eq!(held0, deposited0, epsilon = 1e-4);
        assert_abs_diff_eq!(held1, deposited1, epsilon = 1e-9);
    }

    #[rstest]
    fn test_below_range_holds_only_token0(mut lp: LiquidityPosition) {
        lp.set_price_at_entry(1800.0).unwrap();
        let allocation = lp.allocation().unwrap();

        assert_relative_eq!(allocation.amount0, LP_CAPITAL / 1800.0, max_relative = 1e-12);
        assert_eq!(allocation.amount1, 0.0);
        assert_abs_diff_eq!(allocation.liquidity, 216.6299, epsilon = 1e-3);
    }

    #[rstest]
    fn test_above_range_holds_only_token1(mut lp: LiquidityPosition) {
        lp.set_price_at_entry(3200.0).unwrap();
        let allocation = lp.allocation().unwrap();

        assert_eq!(allocation.amount0, 0.0);
        assert_eq!(allocation.amount1, LP_CAPITAL);
        assert_abs_diff_eq!(allocation.liquidity, 159.1898, epsilon = 1e-3);
    }

    #[rstest]
    fn test_custom_split_changes_deposits_only(mut lp: LiquidityPosition) {
        let liquidity = lp.liquidity().unwrap();
        lp.set_custom_token_distribution(0.78).unwrap();

        let (amount0, amount1) = lp.deposited_amounts().unwrap();
        assert_relative_eq!(amount0, 1600.0 * 0.78 / 2520.0, max_relative = 1e-12);
        assert_relative_eq!(amount1, 352.0, max_relative = 1e-12);
        assert_eq!(lp.liquidity().unwrap(), liquidity);
    }

    #[rstest]
    fn test_derived_state_follows_edits(mut lp: LiquidityPosition) {
        let before = lp.liquidity().unwrap();
        lp.set_value_at_entry(LP_CAPITAL * 2.0).unwrap();
        let after = lp.liquidity().unwrap();

        assert_relative_eq!(after, before * 2.0, max_relative = 1e-3);
    }
}

mod impermanent_loss {
    use super::*;

    #[rstest]
    fn test_loss_profile(lp: LiquidityPosition) {
        let prices = [1000.0, 2000.0, ETH_SPOT, 3000.0, 4000.0];
        let loss = lp.impermanent_loss(&prices).unwrap();

        assert_abs_diff_eq!(loss[0], -502.72, epsilon = 0.01);
        assert_abs_diff_eq!(loss[1], -98.95, epsilon = 0.01);
        assert_abs_diff_eq!(loss[2], 0.0, epsilon = LIQUIDITY_EPSILON);
        assert_abs_diff_eq!(loss[3], -68.96, epsilon = 0.01);
        assert_abs_diff_eq!(loss[4], -344.16, epsilon = 0.01);
    }

    #[rstest]
    fn test_loss_is_never_a_gain_in_range(lp: LiquidityPosition) {
        let prices: Vec<f64> = (0..=50).map(|i| LP_LOWER + 20.0 * f64::from(i)).collect();
        for loss in lp.impermanent_loss(&prices).unwrap() {
            assert!(loss <= LIQUIDITY_EPSILON);
        }
    }

    #[rstest]
    fn test_loss_is_linear_outside_range(lp: LiquidityPosition) {
        let below = lp.impermanent_loss(&[500.0, 1000.0, 1500.0]).unwrap();
        let above = lp.impermanent_loss(&[3500.0, 4000.0, 4500.0]).unwrap();

        assert_abs_diff_eq!(below[2] - 2.0 * below[1] + below[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(above[2] - 2.0 * above[1] + above[0], 0.0, epsilon = 1e-9);
    }

    #[rstest]
    fn test_custom_split_shifts_the_curve(mut lp: LiquidityPosition) {
        lp.set_custom_token_distribution(0.78).unwrap();
        let loss = lp.impermanent_loss(&[1000.0, 2000.0, 3000.0]).unwrap();

        assert_abs_diff_eq!(loss[0], -168.26, epsilon = 0.01);
        assert_abs_diff_eq!(loss[1], 15.47, epsilon = 0.01);
        assert_abs_diff_eq!(loss[2], -174.58, epsilon = 0.01);
    }

    #[rstest]
    fn test_wide_range_with_custom_split() {
        let mut lp = LiquidityPosition::new(2360.0, 3600.0, ETH_SPOT, LP_CAPITAL, 0.5, 0.0).unwrap();
        lp.set_custom_token_distribution(0.78).unwrap();

        let (amount0, amount1) = lp.deposited_amounts().unwrap();
        assert_abs_diff_eq!(amount0, 0.4952, epsilon = 1e-4);
        assert_abs_diff_eq!(amount1, 352.0, epsilon = 1e-9);

        let loss = lp.impermanent_loss(&[2360.0, ETH_SPOT, 3600.0]).unwrap();
        assert_abs_diff_eq!(loss[1], 0.0, epsilon = LIQUIDITY_EPSILON);
        assert_abs_diff_eq!(loss[0], -14.05, epsilon = 0.01);
        assert_abs_diff_eq!(loss[2], -273.95, epsilon = 0.01);
    }

    #[rstest]
    fn test_entry_below_range_has_no_loss_until_range(mut lp: LiquidityPosition) {
        lp.set_price_at_entry(1800.0).unwrap();
        let loss = lp.impermanent_loss(&[1000.0, 1800.0, 2500.0]).unwrap();

        assert_abs_diff_eq!(loss[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(loss[1], 0.0, epsilon = 1e-9);
        assert!(loss[2] < 0.0);
    }

    #[rstest]
    fn test_edge_losses(lp: LiquidityPosition) {
        let (lower, upper) = lp.edge_losses().unwrap();

        assert_abs_diff_eq!(lower, -98.95, epsilon = 0.01);
        assert_abs_diff_eq!(upper, -68.96, epsilon = 0.01);
        assert_abs_diff_eq!(lp.combined_edge_loss().unwrap(), lower + upper, epsilon = 1e-12);
    }
}

mod fees_and_ticks {
    use super::*;

    #[rstest]
    #[case(0, 0.0)]
    #[case(30, 1600.0 * 0.2 * 30.0 / 365.0)]
    #[case(365, 320.0)]
    fn test_simple_fee_accrual(lp: LiquidityPosition, #[case] days: u32, #[case] expected: f64) {
        assert_abs_diff_eq!(lp.fees_accrued(days), expected, epsilon = 1e-9);
    }

    #[rstest]
    fn test_tick_span(lp: LiquidityPosition) {
        assert_eq!(lp.tick_span(), ticks_between(LP_LOWER, LP_UPPER));
        assert_eq!(ticks_between(1.0, 1.0001), 1);
        assert_eq!(ticks_between(2000.0, 3000.0), 4055);
    }
}

proptest! {
    #[test]
    fn prop_allocation_spends_the_capital(
        lower in 1.0f64..5000.0,
        width in 1.01f64..4.0,
        position in 0.01f64..0.99,
        capital in 1.0f64..1_000_000.0,
    ) {
        let upper = lower * width;
        let price = lower + (upper - lower) * position;
        let lp = LiquidityPosition::new(lower, upper, price, capital, 0.5, 0.0).unwrap();
        let allocation = lp.allocation().unwrap();

        prop_assert!(allocation.amount0 >= 0.0 && allocation.amount1 >= 0.0);
        let spent = allocation.amount0 * price + allocation.amount1;
        prop_assert!((spent - capital).abs() <= capital * 1e-9);
    }

    #[test]
    fn prop_entry_loss_is_bounded_by_solver_tolerance(
        lower in 1.0f64..5000.0,
        width in 1.01f64..4.0,
        position in 0.01f64..0.99,
        capital in 1.0f64..1_000_000.0,
    ) {
        let upper = lower * width;
        let price = lower + (upper - lower) * position;
        let lp = LiquidityPosition::new(lower, upper, price, capital, 0.5, 0.0).unwrap();
        let loss = lp.impermanent_loss(&[price]).unwrap()[0];

        prop_assert!(loss.abs() <= 0.01 * price.sqrt() + capital * 1e-9);
    }
}
