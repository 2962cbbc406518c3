//! Pure tariff arithmetic for daily energy costs
//!
//! The cost formulas are exact; rounding is applied only through the
//! boundary helpers when snapshot entries are built, so aggregates never
//! compound rounding error.

use crate::error::TariffError;

/// Daily cost of a single fuel: usage times unit rate plus the standing charge.
pub fn daily_cost(usage_kwh: f64, rate: f64, standing_charge: f64) -> Result<f64, TariffError> {
    ensure_non_negative(usage_kwh, "usage")?;
    ensure_non_negative(rate, "unit rate")?;
    ensure_non_negative(standing_charge, "standing charge")?;
    Ok(usage_kwh * rate + standing_charge)
}

/// Combined daily cost across both fuels.
pub fn total_daily_cost(
    electricity_daily_cost: f64,
    gas_daily_cost: f64,
) -> Result<f64, TariffError> {
    ensure_non_negative(electricity_daily_cost, "electricity daily cost")?;
    ensure_non_negative(gas_daily_cost, "gas daily cost")?;
    Ok(electricity_daily_cost + gas_daily_cost)
}

/// Combined fixed charges across both fuels.
pub fn total_standing_charges(
    electricity_standing_charge: f64,
    gas_standing_charge: f64,
) -> Result<f64, TariffError> {
    ensure_non_negative(electricity_standing_charge, "electricity standing charge")?;
    ensure_non_negative(gas_standing_charge, "gas standing charge")?;
    Ok(electricity_standing_charge + gas_standing_charge)
}

/// Rounds a monetary amount to whole pence for display.
pub fn round_to_pence(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Rounds a usage figure to watt-hour precision for display.
pub fn round_usage(usage_kwh: f64) -> f64 {
    (usage_kwh * 1000.0).round() / 1000.0
}

fn ensure_non_negative(value: f64, quantity: &'static str) -> Result<(), TariffError> {
    if value < 0.0 {
        return Err(TariffError::Negative { quantity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_cost_formula() {
        // 10.5 kWh at 0.28 GBP/kWh plus a 0.45 GBP/day standing charge
        let cost = daily_cost(10.5, 0.28, 0.45).unwrap();
        assert!((cost - 3.39).abs() < 1e-9);
    }

    #[test]
    fn test_zero_usage_is_standing_charge_only() {
        let cost = daily_cost(0.0, 0.28, 0.45).unwrap();
        assert!((cost - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_totals_are_exact_sums() {
        let total = total_daily_cost(3.39, 1.92).unwrap();
        assert!((total - 5.31).abs() < 1e-9);

        let standing = total_standing_charges(0.45, 0.30).unwrap();
        assert!((standing - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert_eq!(
            daily_cost(-1.0, 0.28, 0.45),
            Err(TariffError::Negative { quantity: "usage" })
        );
        assert_eq!(
            daily_cost(1.0, -0.28, 0.45),
            Err(TariffError::Negative {
                quantity: "unit rate"
            })
        );
        assert_eq!(
            daily_cost(1.0, 0.28, -0.45),
            Err(TariffError::Negative {
                quantity: "standing charge"
            })
        );
        assert!(total_daily_cost(-0.01, 0.0).is_err());
        assert!(total_standing_charges(0.0, -0.01).is_err());
    }

    #[test]
    fn test_rounding_only_at_the_boundary() {
        // Three thirds of a penny summed exactly, then rounded once
        let per_fuel = 1.0 / 300.0;
        let total = total_daily_cost(per_fuel, per_fuel).unwrap();
        assert!((total - 2.0 / 300.0).abs() < 1e-12);
        assert!((round_to_pence(total) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_display_rounding_helpers() {
        assert!((round_to_pence(3.386) - 3.39).abs() < 1e-9);
        assert!((round_to_pence(3.3849) - 3.38).abs() < 1e-9);
        assert!((round_usage(10.5004) - 10.5).abs() < 1e-9);
        assert!((round_usage(10.5006) - 10.501).abs() < 1e-9);
    }
}
