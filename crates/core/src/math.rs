//! Fixed-point scaling and cross-rate math
//!
//! All intermediates are 512 bits wide so that a full-range `U256` price can be
//! multiplied by `10^36` without wrapping. Only the final division truncates.

use alloy_primitives::U256;
pub use ruint::aliases::U512;

use crate::{PriceFeedError, PriceFeedResult};

/// Zero-extend a `U256` into 512 bits
pub fn widen(value: U256) -> U512 {
    let l = value.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

/// Narrow back to `U256`, failing if any high limb is set
pub fn narrow(value: U512) -> PriceFeedResult<U256> {
    let l = value.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return Err(PriceFeedError::ArithmeticOverflow);
    }
    Ok(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

/// `10^exp` in 512 bits
pub fn pow10(exp: u32) -> PriceFeedResult<U512> {
    U512::from(10u64)
        .checked_pow(U512::from(exp))
        .ok_or(PriceFeedError::ArithmeticOverflow)
}

/// Rescale `value` from `from` decimals to `to` decimals.
///
/// Scaling up multiplies, scaling down floor-divides.
pub fn scale_wide(value: U512, from: u8, to: u8) -> PriceFeedResult<U512> {
    if to > from {
        let factor = pow10(u32::from(to - from))?;
        value
            .checked_mul(factor)
            .ok_or(PriceFeedError::ArithmeticOverflow)
    } else if to < from {
        let factor = pow10(u32::from(from - to))?;
        Ok(value / factor)
    } else {
        Ok(value)
    }
}

/// [`scale_wide`] on `U256` values
pub fn scale_price(value: U256, from: u8, to: u8) -> PriceFeedResult<U256> {
    narrow(scale_wide(widen(value), from, to)?)
}

/// `a * b / denominator`, rounded down
pub fn mul_div(a: U512, b: U512, denominator: U512) -> PriceFeedResult<U512> {
    if denominator.is_zero() {
        return Err(PriceFeedError::DivisionByZero);
    }
    let product = a
        .checked_mul(b)
        .ok_or(PriceFeedError::ArithmeticOverflow)?;
    Ok(product / denominator)
}

/// Price of base in quote units, with `decimals` of precision.
///
/// Both prices are lifted to the larger of their precisions, which never
/// truncates, so the result equals
/// `base * 10^(decimals + quote_decimals) / (quote * 10^base_decimals)` floored.
pub fn cross_rate(
    base: U256,
    base_decimals: u8,
    quote: U256,
    quote_decimals: u8,
    decimals: u8,
) -> PriceFeedResult<U256> {
    let common = base_decimals.max(quote_decimals);
    let base = scale_wide(widen(base), base_decimals, common)?;
    let quote = scale_wide(widen(quote), quote_decimals, common)?;

    narrow(mul_div(base, pow10(u32::from(decimals))?, quote)?)
}
