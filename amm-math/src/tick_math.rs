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

use crate::{MathError, SqrtPriceQ64F96, Tick, U256};

/// The minimum tick that may be passed to `sqrt_price_at_tick` computed from log base 1.0001 of
/// 2**-128
pub const MIN_TICK: Tick = -887272;
/// The maximum tick that may be passed to `sqrt_price_at_tick` computed from log base 1.0001 of
/// 2**128
pub const MAX_TICK: Tick = -MIN_TICK;
/// The minimum value that can be returned from `sqrt_price_at_tick`. Equivalent to
/// `sqrt_price_at_tick(MIN_TICK)`
pub const MIN_SQRT_PRICE: SqrtPriceQ64F96 = U256([0x1000276a3u64, 0x0, 0x0, 0x0]);
/// The maximum value that can be returned from `sqrt_price_at_tick`. Equivalent to
/// `sqrt_price_at_tick(MAX_TICK)`.
pub const MAX_SQRT_PRICE: SqrtPriceQ64F96 =
	U256([0x5d951d5263988d26u64, 0xefd1fc6a50648849u64, 0xfffd8963u64, 0x0u64]);

/// A pool price must lie in `[MIN_SQRT_PRICE, MAX_SQRT_PRICE)`, so that every pool price has a
/// well defined current tick strictly below `MAX_TICK`'s upper neighbour.
pub fn is_sqrt_price_valid(sqrt_price: SqrtPriceQ64F96) -> bool {
	(MIN_SQRT_PRICE..MAX_SQRT_PRICE).contains(&sqrt_price)
}

pub fn is_tick_valid(tick: Tick) -> bool {
	(MIN_TICK..=MAX_TICK).contains(&tick)
}

/// Calculates `1.0001^(tick / 2) * 2^96`, rounded up.
pub fn sqrt_price_at_tick(tick: Tick) -> Result<SqrtPriceQ64F96, MathError> {
	if !is_tick_valid(tick) {
		return Err(MathError::InvalidTick)
	}

	let abs_tick = tick.unsigned_abs();

	let mut r = if abs_tick & 0x1u32 != 0 {
		U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
	} else {
		U256::one() << 128u32
	};

	// Each constant is below 2^128 and `r <= 2^128` holds before and after every application, so
	// the product fits into 256 bits. `full_mul` keeps this panic free regardless.
	macro_rules! handle_tick_bit {
		($bit:literal, $constant:literal) => {
			if abs_tick & (0x1u32 << $bit) != 0 {
				r = U256::try_from(U256::full_mul(r, U256::from($constant)) >> 128u32)
					.map_err(|_| MathError::Overflow)?;
			}
		};
	}

	handle_tick_bit!(1, 0xfff97272373d413259a46990580e213au128);
	handle_tick_bit!(2, 0xfff2e50f5f656932ef12357cf3c7fdccu128);
	handle_tick_bit!(3, 0xffe5caca7e10e4e61c3624eaa0941cd0u128);
	handle_tick_bit!(4, 0xffcb9843d60f6159c9db58835c926644u128);
	handle_tick_bit!(5, 0xff973b41fa98c081472e6896dfb254c0u128);
	handle_tick_bit!(6, 0xff2ea16466c96a3843ec78b326b52861u128);
	handle_tick_bit!(7, 0xfe5dee046a99a2a811c461f1969c3053u128);
	handle_tick_bit!(8, 0xfcbe86c7900a88aedcffc83b479aa3a4u128);
	handle_tick_bit!(9, 0xf987a7253ac413176f2b074cf7815e54u128);
	handle_tick_bit!(10, 0xf3392b0822b70005940c7a398e4b70f3u128);
	handle_tick_bit!(11, 0xe7159475a2c29b7443b29c7fa6e889d9u128);
	handle_tick_bit!(12, 0xd097f3bdfd2022b8845ad8f792aa5825u128);
	handle_tick_bit!(13, 0xa9f746462d870fdf8a65dc1f90e061e5u128);
	handle_tick_bit!(14, 0x70d869a156d2a1b890bb3df62baf32f7u128);
	handle_tick_bit!(15, 0x31be135f97d08fd981231505542fcfa6u128);
	handle_tick_bit!(16, 0x9aa508b5b7a84e1c677de54f3e99bc9u128);
	handle_tick_bit!(17, 0x5d6af8dedb81196699c329225ee604u128);
	handle_tick_bit!(18, 0x2216e584f5fa1ea926041bedfe98u128);
	handle_tick_bit!(19, 0x48a170391f7dc42444e8fa2u128);
	// Due to the MIN_TICK and MAX_TICK bounds, abs_tick has no bits set past the 20th.

	if r.is_zero() {
		return Err(MathError::DivisionByZero)
	}

	let sqrt_price_q32f128 = if tick > 0 { U256::MAX / r } else { r };

	// Round up so that `tick_at_sqrt_price` of the output is always `tick`.
	Ok((sqrt_price_q32f128 >> 32u32) +
		if sqrt_price_q32f128.low_u32() == 0 { U256::zero() } else { U256::one() })
}

/// Calculates the greatest tick value such that `sqrt_price_at_tick(tick) <= sqrt_price`.
///
/// Accepts any price in `[MIN_SQRT_PRICE, MAX_SQRT_PRICE]`.
pub fn tick_at_sqrt_price(sqrt_price: SqrtPriceQ64F96) -> Result<Tick, MathError> {
	if sqrt_price == MAX_SQRT_PRICE {
		return Ok(MAX_TICK)
	}
	if !is_sqrt_price_valid(sqrt_price) {
		return Err(MathError::InvalidSqrtPrice)
	}

	// MAX_SQRT_PRICE < 2^160, so the shift cannot drop bits.
	let sqrt_price_q64f128 = sqrt_price << 32u32;

	let (integer_log_2, mantissa) = {
		let mut _bits_remaining = sqrt_price_q64f128;
		let mut most_significant_bit = 0u8;

		// rustfmt chokes when formatting this macro.
		// See: https://github.com/rust-lang/rustfmt/issues/5404
		#[rustfmt::skip]
		macro_rules! add_integer_bit {
			($bit:literal, $lower_bits_mask:literal) => {
				if _bits_remaining > U256::from($lower_bits_mask) {
					most_significant_bit |= $bit;
					_bits_remaining >>= $bit;
				}
			};
		}

		add_integer_bit!(128u8, 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFu128);
		add_integer_bit!(64u8, 0xFFFFFFFFFFFFFFFFu128);
		add_integer_bit!(32u8, 0xFFFFFFFFu128);
		add_integer_bit!(16u8, 0xFFFFu128);
		add_integer_bit!(8u8, 0xFFu128);
		add_integer_bit!(4u8, 0xFu128);
		add_integer_bit!(2u8, 0x3u128);
		add_integer_bit!(1u8, 0x1u128);

		(
			// Integer part of log2(sqrt_price) as a Q64.128 exponent.
			((most_significant_bit as i16) + (-128i16)) as i8,
			// Mantissa normalised so that its most significant bit is bit 127.
			if most_significant_bit >= 128u8 {
				// The bits dropped here don't contribute to the log2 above the 14th fractional bit.
				sqrt_price_q64f128 >> (most_significant_bit - 127u8)
			} else {
				sqrt_price_q64f128 << (127u8 - most_significant_bit)
			}
			.low_u128(),
		)
	};

	let log_2_q63f64 = {
		let mut log_2_q63f64 = (integer_log_2 as i128) << 64u8;
		let mut _mantissa = mantissa;

		// rustfmt chokes when formatting this macro.
		// See: https://github.com/rust-lang/rustfmt/issues/5404
		#[rustfmt::skip]
		macro_rules! add_fractional_bit {
			($bit:literal) => {
				// Squaring a number doubles its log.
				let mantissa_sq = U256::full_mul(_mantissa.into(), _mantissa.into()) >> 127u8;
				_mantissa = if mantissa_sq.bit(128) {
					// All higher bits are zero due to the 127 bit shift.
					log_2_q63f64 |= 1i128 << $bit;
					(mantissa_sq >> 1u8).low_u128()
				} else {
					mantissa_sq.low_u128()
				}
			};
		}

		add_fractional_bit!(63u8);
		add_fractional_bit!(62u8);
		add_fractional_bit!(61u8);
		add_fractional_bit!(60u8);
		add_fractional_bit!(59u8);
		add_fractional_bit!(58u8);
		add_fractional_bit!(57u8);
		add_fractional_bit!(56u8);
		add_fractional_bit!(55u8);
		add_fractional_bit!(54u8);
		add_fractional_bit!(53u8);
		add_fractional_bit!(52u8);
		add_fractional_bit!(51u8);
		add_fractional_bit!(50u8);

		// 14 fractional bits are enough to bracket the tick to within one.

		log_2_q63f64
	};

	// There is no I256 type, so negative values are sign extended by hand and multiplied modulo
	// 2^256.
	let log_sqrt10001_q127f128 = U256::overflowing_mul(
		if log_2_q63f64 < 0 {
			(U256::from(u128::MAX) << 128u8) | U256::from(log_2_q63f64 as u128)
		} else {
			U256::from(log_2_q63f64 as u128)
		},
		U256::from(255738958999603826347141u128),
	)
	.0;

	let tick_low = (U256::overflowing_sub(
		log_sqrt10001_q127f128,
		U256::from(3402992956809132418596140100660247210u128),
	)
	.0 >> 128u8)
		.low_u128() as Tick;
	let tick_high = (U256::overflowing_add(
		log_sqrt10001_q127f128,
		U256::from(291339464771989622907027621153398088495u128),
	)
	.0 >> 128u8)
		.low_u128() as Tick;

	Ok(if tick_low == tick_high {
		tick_low
	} else if is_tick_valid(tick_high) && sqrt_price_at_tick(tick_high)? <= sqrt_price {
		tick_high
	} else {
		tick_low
	})
}
