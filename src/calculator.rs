//! Core calculation engine for solar loan qualification.
//!
//! Every function here is pure, deterministic and order-insensitive: fixed
//! inputs produce fixed outputs, with no clock, randomness or I/O.

use crate::models::CostBreakdown;

/// Standard panel size in watts.
pub const PANEL_WATTAGE: f64 = 400.0;
/// 85% efficiency including inverter losses.
pub const SYSTEM_EFFICIENCY: f64 = 0.85;
/// Panel output degradation, 0.5% per year.
pub const PANEL_DEGRADATION: f64 = 0.005;
/// Average installed cost, $ per watt.
pub const COST_PER_WATT: f64 = 2.75;
/// Realistic roof space requirement including panel spacing.
pub const ROOF_SQFT_PER_KW: f64 = 250.0;
/// Minimum viable system size in kW.
pub const MIN_SYSTEM_KW: f64 = 2.0;

/// Required system size in kW, rounded to the nearest 0.5.
///
/// `monthly_kwh = bill / (rate/100)`, annualized, then divided by yearly
/// production per kW at the given sun hours.
pub fn system_size(monthly_bill: f64, electricity_rate_cents: f64, sun_hours: f64) -> f64 {
    let monthly_kwh = monthly_bill / (electricity_rate_cents / 100.0);
    let annual_kwh = monthly_kwh * 12.0;
    let system_size_kw = annual_kwh / (365.0 * sun_hours * SYSTEM_EFFICIENCY);
    round_half(system_size_kw)
}

/// Total system cost with federal and state incentives applied.
///
/// The federal tax credit is a flat 30%. State credits come from a fixed
/// capped table; states absent from the table get $0.
pub fn system_cost(system_size_kw: f64, state: &str) -> CostBreakdown {
    let gross_cost = system_size_kw * 1000.0 * COST_PER_WATT;
    let federal_credit = gross_cost * 0.30;

    let state_credit = match state {
        "CA" => f64::min(1000.0, gross_cost * 0.05),
        "NY" => f64::min(5000.0, gross_cost * 0.10),
        "IL" => f64::min(3000.0, gross_cost * 0.07),
        // TX, FL and anything else: no state incentive
        _ => 0.0,
    };

    let net_cost = gross_cost - federal_credit - state_credit;

    CostBreakdown {
        gross_cost: round2(gross_cost),
        federal_credit: round2(federal_credit),
        state_credit: round2(state_credit),
        net_cost: round2(net_cost),
    }
}

/// Standard amortized monthly loan payment.
///
/// A zero APR short-circuits to `principal / months` exactly, avoiding the
/// division by zero in the amortization formula.
pub fn monthly_payment(principal: f64, apr: f64, years: u32) -> f64 {
    if apr == 0.0 {
        return principal / (years as f64 * 12.0);
    }

    let monthly_rate = apr / 100.0 / 12.0;
    let num_payments = years as f64 * 12.0;
    let growth = (1.0 + monthly_rate).powf(num_payments);
    let payment = principal * (monthly_rate * growth) / (growth - 1.0);
    round2(payment)
}

/// Payback period in years.
///
/// When the loan payment does not exceed the current bill the system is
/// cash-flow positive from day one and payback is 0. The positive branch
/// divides cost by gross bill savings, ignoring the financed-payment
/// offset; that asymmetry is intentional and preserved from the source
/// formula (see DESIGN.md).
pub fn payback_years(system_cost: f64, monthly_bill: f64, monthly_payment: f64) -> f64 {
    let annual_savings = monthly_bill * 12.0;
    let net_annual_cost = monthly_payment * 12.0 - annual_savings;

    if net_annual_cost <= 0.0 {
        // System pays for itself immediately
        return 0.0;
    }

    round1(system_cost / annual_savings)
}

/// Savings over the system lifetime (default 25 years).
///
/// Production is summed year by year with degradation compounding against
/// efficiency; the accumulated kWh is then priced at a rate averaged over
/// the period assuming 3% annual utility-rate inflation. The closed-form
/// average `rate × ((1.03^y − 1) / (0.03·y))` equals the mean of the
/// per-year inflated rates.
pub fn lifetime_savings(
    system_size_kw: f64,
    electricity_rate_cents: f64,
    sun_hours: f64,
    years: u32,
) -> f64 {
    let mut total_kwh = 0.0;
    for year in 0..years {
        let efficiency = SYSTEM_EFFICIENCY * (1.0 - PANEL_DEGRADATION * year as f64);
        total_kwh += system_size_kw * 365.0 * sun_hours * efficiency;
    }

    let y = years as f64;
    let avg_rate = electricity_rate_cents * ((1.03f64.powi(years as i32) - 1.0) / (0.03 * y));

    round2(total_kwh * (avg_rate / 100.0))
}

/// Number of panels for a system, assuming 400 W panels.
pub fn panels_needed(system_size_kw: f64) -> u32 {
    ((system_size_kw * 1000.0) / PANEL_WATTAGE) as u32 + 1
}

/// Rounds to the nearest 0.5.
fn round_half(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Rounds down to the nearest 0.5 (used when clamping to roof capacity so
/// the result never exceeds the cap).
pub fn floor_half(x: f64) -> f64 {
    (x * 2.0).floor() / 2.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_half_kw_granular() {
        let size = system_size(150.0, 15.0, 5.0);
        assert_eq!(size, 7.5);
        assert_eq!((size * 2.0).fract(), 0.0);
    }

    #[test]
    fn zero_apr_payment_is_exact() {
        assert_eq!(monthly_payment(24000.0, 0.0, 20), 24000.0 / 240.0);
    }

    #[test]
    fn closed_form_average_rate_matches_yearly_mean() {
        let years = 25u32;
        let rate = 15.0;
        let explicit_mean: f64 =
            (0..years).map(|y| rate * 1.03f64.powi(y as i32)).sum::<f64>() / years as f64;
        let closed_form = rate * ((1.03f64.powi(years as i32) - 1.0) / (0.03 * years as f64));
        assert!((explicit_mean - closed_form).abs() < 1e-9);
    }
}
