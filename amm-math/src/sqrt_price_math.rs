// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Amounts of each asset held by liquidity over a price interval, and the price reached after
//! adding or removing an amount of one asset at a given liquidity.

use crate::{
	mul_div, mul_div_ceil, mul_div_floor, Amount, Liquidity, MathError, SqrtPriceQ64F96,
	SQRT_PRICE_FRACTIONAL_BITS, U256, U512,
};

fn ordered(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
) -> Result<(SqrtPriceQ64F96, SqrtPriceQ64F96), MathError> {
	let (from, to) = if a <= b { (a, b) } else { (b, a) };
	if from.is_zero() {
		Err(MathError::InvalidSqrtPrice)
	} else {
		Ok((from, to))
	}
}

fn amount0_delta(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<(Amount, Amount), MathError> {
	let (from, to) = ordered(a, b)?;
	// `from * to > to - from` for `from > 0`, so the quotient is below `liquidity << 96`.
	mul_div(
		U256::from(liquidity) << SQRT_PRICE_FRACTIONAL_BITS,
		to - from,
		U256::full_mul(to, from),
	)
}

fn amount1_delta(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<(Amount, Amount), MathError> {
	let (from, to) = ordered(a, b)?;
	mul_div(liquidity.into(), to - from, U512::one() << SQRT_PRICE_FRACTIONAL_BITS)
}

/// Amount of asset 0 held by `liquidity` between the two prices, rounded down.
pub fn amount0_delta_floor(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<Amount, MathError> {
	Ok(amount0_delta(a, b, liquidity)?.0)
}

/// Amount of asset 0 held by `liquidity` between the two prices, rounded up.
pub fn amount0_delta_ceil(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<Amount, MathError> {
	Ok(amount0_delta(a, b, liquidity)?.1)
}

/// Amount of asset 1 held by `liquidity` between the two prices, rounded down.
pub fn amount1_delta_floor(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<Amount, MathError> {
	Ok(amount1_delta(a, b, liquidity)?.0)
}

/// Amount of asset 1 held by `liquidity` between the two prices, rounded up.
pub fn amount1_delta_ceil(
	a: SqrtPriceQ64F96,
	b: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<Amount, MathError> {
	Ok(amount1_delta(a, b, liquidity)?.1)
}

/// The price after `amount` of asset 0 is added to (`add == true`) or removed from the curve.
///
/// Always rounds up: adding asset 0 moves the price down, so the price stays at or above the
/// exact value and the pool is never short of asset 1. Removing more asset 0 than the curve
/// holds at this liquidity is `PriceOutOfRange`.
pub fn next_sqrt_price_from_amount0_rounding_up(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount: Amount,
	add: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if sqrt_price.is_zero() {
		return Err(MathError::InvalidSqrtPrice)
	}
	if liquidity == 0 {
		return Err(MathError::DivisionByZero)
	}
	if amount.is_zero() {
		return Ok(sqrt_price)
	}

	let numerator = U256::from(liquidity) << SQRT_PRICE_FRACTIONAL_BITS;
	let product = U256::full_mul(amount, sqrt_price);

	if add {
		mul_div_ceil(numerator, sqrt_price, U512::from(numerator) + product)
	} else {
		if product >= U512::from(numerator) {
			return Err(MathError::PriceOutOfRange)
		}
		// `product < numerator < 2^224`, so the difference fits into 256 bits.
		let denominator = U512::from(numerator) - product;
		mul_div_ceil(numerator, sqrt_price, denominator)
	}
}

/// The price after `amount` of asset 1 is added to (`add == true`) or removed from the curve.
///
/// Always rounds down, for the same reason `next_sqrt_price_from_amount0_rounding_up` rounds up.
pub fn next_sqrt_price_from_amount1_rounding_down(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount: Amount,
	add: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if sqrt_price.is_zero() {
		return Err(MathError::InvalidSqrtPrice)
	}
	if liquidity == 0 {
		return Err(MathError::DivisionByZero)
	}

	if add {
		let quotient = mul_div_floor(amount, U256::one() << SQRT_PRICE_FRACTIONAL_BITS, liquidity)?;
		sqrt_price.checked_add(quotient).ok_or(MathError::PriceOutOfRange)
	} else {
		let quotient = mul_div_ceil(amount, U256::one() << SQRT_PRICE_FRACTIONAL_BITS, liquidity)?;
		if sqrt_price <= quotient {
			return Err(MathError::PriceOutOfRange)
		}
		Ok(sqrt_price - quotient)
	}
}
