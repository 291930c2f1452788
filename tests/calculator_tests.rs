/// Unit tests for the solar calculation engine.
/// All functions are pure; fixed inputs must produce fixed outputs.
use solar_loan_api::calculator::{
    lifetime_savings, monthly_payment, panels_needed, payback_years, system_cost, system_size,
    MIN_SYSTEM_KW, SYSTEM_EFFICIENCY,
};

#[cfg(test)]
mod system_size_tests {
    use super::*;

    #[test]
    fn test_reference_sizing() {
        // $150 bill, 15¢/kWh, 5 sun hours -> ~7.7 kW, snapped to 7.5
        let size = system_size(150.0, 15.0, 5.0);
        assert_eq!(size, 7.5);
        assert!((6.0..=8.0).contains(&size));
    }

    #[test]
    fn test_size_is_half_kw_multiple() {
        for (bill, rate, sun) in [
            (50.0, 10.0, 4.0),
            (120.0, 22.85, 5.8),
            (300.0, 11.2, 5.3),
            (500.0, 13.45, 4.0),
        ] {
            let size = system_size(bill, rate, sun);
            assert!(size > 0.0, "size must be positive for positive inputs");
            assert_eq!(
                (size * 2.0).fract(),
                0.0,
                "size {} is not a multiple of 0.5",
                size
            );
        }
    }

    #[test]
    fn test_higher_rates_shrink_the_system() {
        // A pricier grid means the same bill buys fewer kWh
        let cheap = system_size(150.0, 10.0, 5.0);
        let pricey = system_size(150.0, 25.0, 5.0);
        assert!(pricey < cheap);
    }
}

#[cfg(test)]
mod cost_tests {
    use super::*;

    #[test]
    fn test_cost_breakdown_california() {
        // 7.5 kW at $2.75/W
        let costs = system_cost(7.5, "CA");
        assert_eq!(costs.gross_cost, 20625.0);
        assert_eq!(costs.federal_credit, 6187.5);
        // CA incentive capped at $1000 (5% would be $1031.25)
        assert_eq!(costs.state_credit, 1000.0);
        assert_eq!(costs.net_cost, 13437.5);
    }

    #[test]
    fn test_cost_breakdown_new_york_under_cap() {
        let costs = system_cost(6.0, "NY");
        assert_eq!(costs.gross_cost, 16500.0);
        // 10% of gross is under the $5000 cap
        assert_eq!(costs.state_credit, 1650.0);
        assert_eq!(costs.net_cost, 16500.0 - 4950.0 - 1650.0);
    }

    #[test]
    fn test_states_without_incentives() {
        for state in ["TX", "FL", "US", "WY"] {
            let costs = system_cost(5.0, state);
            assert_eq!(costs.state_credit, 0.0, "state {} should have no credit", state);
            assert_eq!(costs.net_cost, costs.gross_cost - costs.federal_credit);
        }
    }

    #[test]
    fn test_net_cost_never_negative() {
        for state in ["CA", "NY", "IL", "TX"] {
            let costs = system_cost(MIN_SYSTEM_KW, state);
            assert!(costs.net_cost >= 0.0);
        }
    }
}

#[cfg(test)]
mod payment_tests {
    use super::*;

    #[test]
    fn test_reference_amortization() {
        // $20,000 loan, 5% APR, 20 years -> ~$132/month
        let payment = monthly_payment(20000.0, 5.0, 20);
        assert!(
            (130.0..=135.0).contains(&payment),
            "payment {} outside expected band",
            payment
        );
    }

    #[test]
    fn test_zero_apr_is_exact_division() {
        assert_eq!(monthly_payment(20000.0, 0.0, 20), 20000.0 / 240.0);
        assert_eq!(monthly_payment(13437.5, 0.0, 25), 13437.5 / 300.0);
    }

    #[test]
    fn test_higher_apr_costs_more() {
        let low = monthly_payment(15000.0, 3.99, 15);
        let high = monthly_payment(15000.0, 12.99, 15);
        assert!(high > low);
    }
}

#[cfg(test)]
mod payback_tests {
    use super::*;

    #[test]
    fn test_cash_flow_positive_payback_is_zero() {
        // Payment $120 < bill $150: pays for itself immediately
        assert_eq!(payback_years(15000.0, 150.0, 120.0), 0.0);
    }

    #[test]
    fn test_payment_equal_to_bill_is_still_zero() {
        assert_eq!(payback_years(15000.0, 150.0, 150.0), 0.0);
    }

    #[test]
    fn test_positive_branch_divides_by_gross_savings() {
        // Payment above the bill: cost / (bill * 12), payment ignored
        assert_eq!(payback_years(15000.0, 150.0, 200.0), 8.3);
        // Same payback for a different payment, by design
        assert_eq!(payback_years(15000.0, 150.0, 300.0), 8.3);
    }
}

#[cfg(test)]
mod savings_tests {
    use super::*;

    #[test]
    fn test_lifetime_savings_match_explicit_loop() {
        let size = 7.5;
        let rate = 15.0;
        let sun = 5.0;
        let years = 25u32;

        let mut total_kwh = 0.0;
        for year in 0..years {
            let efficiency = SYSTEM_EFFICIENCY * (1.0 - 0.005 * year as f64);
            total_kwh += size * 365.0 * sun * efficiency;
        }
        let explicit_avg_rate: f64 =
            (0..years).map(|y| rate * 1.03f64.powi(y as i32)).sum::<f64>() / years as f64;
        let expected = total_kwh * (explicit_avg_rate / 100.0);

        let actual = lifetime_savings(size, rate, sun, years);
        assert!(
            (actual - expected).abs() < 0.01,
            "closed-form {} diverged from year-by-year {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_savings_are_positive_and_plausible() {
        let savings = lifetime_savings(7.5, 15.0, 5.0, 25);
        assert!(savings > 50_000.0 && savings < 70_000.0, "got {}", savings);
    }

    #[test]
    fn test_sunnier_states_save_more() {
        let cloudy = lifetime_savings(7.5, 15.0, 4.0, 25);
        let sunny = lifetime_savings(7.5, 15.0, 5.8, 25);
        assert!(sunny > cloudy);
    }
}

#[test]
fn test_panels_needed() {
    // 7.5 kW of 400 W panels
    assert_eq!(panels_needed(7.5), 19);
    assert_eq!(panels_needed(2.0), 6);
}
