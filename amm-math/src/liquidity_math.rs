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

use crate::{
	amount0_delta_ceil, amount0_delta_floor, amount1_delta_ceil, amount1_delta_floor, Amount,
	Liquidity, MathError, SqrtPriceQ64F96, SQRT_PRICE_FRACTIONAL_BITS, U256, U512,
};

pub fn add_liquidity_delta(liquidity: Liquidity, delta: i128) -> Result<Liquidity, MathError> {
	liquidity.checked_add_signed(delta).ok_or(if delta < 0 {
		MathError::LiquidityUnderflow
	} else {
		MathError::LiquidityOverflow
	})
}

/// The amounts of both assets represented by `liquidity` over `[lower, upper)` at the current
/// price. Rounds up when `ROUND_UP`, which is how much a minter must pay, and down otherwise,
/// which is how much a burner receives.
pub fn amounts_for_liquidity<const ROUND_UP: bool>(
	current: SqrtPriceQ64F96,
	lower: SqrtPriceQ64F96,
	upper: SqrtPriceQ64F96,
	liquidity: Liquidity,
) -> Result<(Amount, Amount), MathError> {
	if lower >= upper {
		return Err(MathError::InvalidSqrtPrice)
	}

	let amount0 = |from, to| {
		if ROUND_UP {
			amount0_delta_ceil(from, to, liquidity)
		} else {
			amount0_delta_floor(from, to, liquidity)
		}
	};
	let amount1 = |from, to| {
		if ROUND_UP {
			amount1_delta_ceil(from, to, liquidity)
		} else {
			amount1_delta_floor(from, to, liquidity)
		}
	};

	Ok(if current <= lower {
		(amount0(lower, upper)?, U256::zero())
	} else if current < upper {
		(amount0(current, upper)?, amount1(lower, current)?)
	} else {
		(U256::zero(), amount1(lower, upper)?)
	})
}

/// The largest liquidity over `[lower, upper)` whose amounts at the current price do not exceed
/// `amounts`. Saturates at `Liquidity::MAX`.
pub fn liquidity_for_amounts(
	current: SqrtPriceQ64F96,
	lower: SqrtPriceQ64F96,
	upper: SqrtPriceQ64F96,
	amounts: (Amount, Amount),
) -> Result<Liquidity, MathError> {
	if lower.is_zero() || lower >= upper {
		return Err(MathError::InvalidSqrtPrice)
	}

	// Inverse of `amount0_delta_ceil`
	let from_amount0 = |from: SqrtPriceQ64F96, to: SqrtPriceQ64F96| -> U512 {
		(U512::saturating_mul(amounts.0.into(), U256::full_mul(from, to)) /
			U512::from(to - from)) >>
			SQRT_PRICE_FRACTIONAL_BITS
	};
	// Inverse of `amount1_delta_ceil`
	let from_amount1 = |from: SqrtPriceQ64F96, to: SqrtPriceQ64F96| -> U512 {
		U256::full_mul(amounts.1, U256::one() << SQRT_PRICE_FRACTIONAL_BITS) / U512::from(to - from)
	};

	let liquidity = if current <= lower {
		from_amount0(lower, upper)
	} else if current < upper {
		core::cmp::min(from_amount0(current, upper), from_amount1(lower, current))
	} else {
		from_amount1(lower, upper)
	};

	Ok(if liquidity > U512::from(Liquidity::MAX) { Liquidity::MAX } else { liquidity.low_u128() })
}
