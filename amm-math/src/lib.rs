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

//! Pure fixed-point arithmetic for concentrated liquidity pools.
//!
//! Prices are stored as square roots in unsigned Q64.96 fixed point. A tick `t` corresponds to
//! the price `1.0001^t`, so `sqrt_price_at_tick(t) = 1.0001^(t / 2) * 2^96`. Fee growth is stored
//! in Q128.128. All functions are deterministic and never panic; any result that cannot be
//! represented is reported as a [MathError].

pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod tick_math;

pub use liquidity_math::*;
pub use sqrt_price_math::*;
pub use tick_math::*;

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
pub use sp_core::{U256, U512};

pub type Amount = U256;
pub type Tick = i32;
pub type SqrtPriceQ64F96 = U256;
/// Represents an amount of an asset, in terms of the pool's liquidity curve.
pub type Liquidity = u128;
pub type FeeGrowthQ128F128 = U256;

/// The number of fractional bits used by `SqrtPriceQ64F96`.
pub const SQRT_PRICE_FRACTIONAL_BITS: u32 = 96;
/// The number of fractional bits used by `FeeGrowthQ128F128`.
pub const FEE_GROWTH_FRACTIONAL_BITS: u32 = 128;

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	Serialize,
	Deserialize,
	thiserror::Error,
)]
pub enum MathError {
	#[error("tick is outside of [MIN_TICK, MAX_TICK]")]
	InvalidTick,
	#[error("sqrt price is outside of [MIN_SQRT_PRICE, MAX_SQRT_PRICE]")]
	InvalidSqrtPrice,
	#[error("intermediate or final value does not fit into 256 bits")]
	Overflow,
	#[error("division by zero")]
	DivisionByZero,
	#[error("liquidity would exceed u128::MAX")]
	LiquidityOverflow,
	#[error("liquidity would become negative")]
	LiquidityUnderflow,
	#[error("the resulting sqrt price is not representable")]
	PriceOutOfRange,
}

fn checked_narrow(value: U512) -> Result<U256, MathError> {
	U256::try_from(value).map_err(|_| MathError::Overflow)
}

/// Computes `floor(a * b / c)` using a 512-bit intermediate.
pub fn mul_div_floor<C: Into<U512>>(a: U256, b: U256, c: C) -> Result<U256, MathError> {
	Ok(mul_div(a, b, c)?.0)
}

/// Computes `ceil(a * b / c)` using a 512-bit intermediate.
pub fn mul_div_ceil<C: Into<U512>>(a: U256, b: U256, c: C) -> Result<U256, MathError> {
	Ok(mul_div(a, b, c)?.1)
}

/// Returns `(floor(a * b / c), ceil(a * b / c))`.
pub fn mul_div<C: Into<U512>>(a: U256, b: U256, c: C) -> Result<(U256, U256), MathError> {
	let c: U512 = c.into();
	if c.is_zero() {
		return Err(MathError::DivisionByZero)
	}

	let (d, m) = U512::div_mod(U256::full_mul(a, b), c);

	Ok((
		checked_narrow(d)?,
		// For m > 0, c must be > 1, so d < U512::MAX and the increment cannot overflow.
		checked_narrow(if m.is_zero() { d } else { d + U512::one() })?,
	))
}
