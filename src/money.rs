//! Money Conversion Module
//!
//! Exchange-rate math and amount validation. All cross-currency conversion
//! MUST go through this module.
//!
//! ## Design Principles
//! 1. Exact Arithmetic: amounts and rates are `rust_decimal::Decimal`, never floats
//! 2. Single Terminal Rounding: round-half-to-even once, at the end of a
//!    conversion, never per intermediate step
//! 3. Explicit Error Handling: no silent truncation, no silent clamping
//!
//! ## Representation
//! - Amounts carry the currency minor-unit scale (2 decimal places by default)
//! - Rates are expressed against a common reference unit and are positive
//! - Storage and wire formats are strings produced by [`format_amount`]

use rust_decimal::prelude::*;
use thiserror::Error;

/// Minor-unit scale used when no currency-specific scale is configured.
pub const DEFAULT_SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money math and validation errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount {amount} outside transfer bounds [{min}, {max}]")]
    AmountOutOfBounds {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Rate {rate} outside exchange-rate bounds [{min}, {max}]")]
    RateOutOfBounds {
        rate: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Rate must be positive, got {0}")]
    InvalidRate(Decimal),

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert an amount between two economies' currencies.
///
/// Both rates are expressed against the common reference unit, so the
/// conversion is `amount / source_rate * target_rate`. The result is rounded
/// to `scale` decimal places with round-half-to-even, applied exactly once at
/// the end to bound cumulative drift.
///
/// # Errors
/// * `InvalidRate` - if either rate is zero or negative
/// * `Overflow` - if an intermediate value exceeds Decimal range
///
/// # Example
/// ```rust
/// use rust_decimal::Decimal;
/// use clearinghouse::money::{convert, DEFAULT_SCALE};
///
/// let got = convert(
///     Decimal::from(500),
///     Decimal::from(50),
///     Decimal::from(20),
///     DEFAULT_SCALE,
/// )
/// .unwrap();
/// assert_eq!(got, Decimal::from(200));
/// ```
pub fn convert(
    amount: Decimal,
    source_rate: Decimal,
    target_rate: Decimal,
    scale: u32,
) -> Result<Decimal, MoneyError> {
    if source_rate <= Decimal::ZERO {
        return Err(MoneyError::InvalidRate(source_rate));
    }
    if target_rate <= Decimal::ZERO {
        return Err(MoneyError::InvalidRate(target_rate));
    }

    // Full-precision intermediate; rounding happens only on the final value.
    let raw = amount
        .checked_div(source_rate)
        .ok_or(MoneyError::Overflow)?
        .checked_mul(target_rate)
        .ok_or(MoneyError::Overflow)?;

    Ok(raw.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven))
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a transfer amount against the configured bounds.
///
/// # Errors
/// * `InvalidAmount` - if the amount is zero or negative
/// * `AmountOutOfBounds` - if outside `[min, max]`
pub fn validate_amount(amount: Decimal, min: Decimal, max: Decimal) -> Result<(), MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }
    if amount < min || amount > max {
        return Err(MoneyError::AmountOutOfBounds { amount, min, max });
    }
    Ok(())
}

/// Validate an exchange rate against the configured bounds.
///
/// Applied at economy registration and at every subsequent rate change.
pub fn validate_rate(rate: Decimal, min: Decimal, max: Decimal) -> Result<(), MoneyError> {
    if rate <= Decimal::ZERO {
        return Err(MoneyError::InvalidRate(rate));
    }
    if rate < min || rate > max {
        return Err(MoneyError::RateOutOfBounds { rate, min, max });
    }
    Ok(())
}

/// Reject amounts carrying more decimal places than the currency supports.
///
/// Trailing zeros do not count ("1.2300" is two decimals of precision).
pub fn check_scale(amount: Decimal, scale: u32) -> Result<(), MoneyError> {
    let provided = amount.normalize().scale();
    if provided > scale {
        return Err(MoneyError::PrecisionOverflow {
            provided,
            max: scale,
        });
    }
    Ok(())
}

// ============================================================================
// Format / Parse: wire and storage boundary
// ============================================================================

/// Render an amount with exactly `scale` decimal places.
///
/// The balance service and the ledger both take stringified amounts; this is
/// the single place that produces them. Values already rounded pass through
/// unchanged, anything finer is rounded half-to-even first.
pub fn format_amount(value: Decimal, scale: u32) -> String {
    let rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    format!("{:.prec$}", rounded, prec = scale as usize)
}

/// Parse a balance figure reported by the external service or read back from
/// storage. Negative balances are legal (the service allows overdrafts), so
/// this is deliberately laxer than transfer-amount validation.
pub fn parse_balance(s: &str) -> Result<Decimal, MoneyError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    Decimal::from_str(s).map_err(|e| MoneyError::InvalidFormat(format!("{}: {}", s, e)))
}

// ============================================================================
// Unit Tests
// ============================================================================
