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

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

pub use clamm_math::{
	Amount, FeeGrowthQ128F128, Liquidity, SqrtPriceQ64F96, Tick, MAX_SQRT_PRICE, MAX_TICK,
	MIN_SQRT_PRICE, MIN_TICK,
};

/// `1_000_000` hundredth pips is 100%.
pub const ONE_IN_HUNDREDTH_PIPS: u32 = 1_000_000;
/// The maximum fee a pool may charge, 50%.
pub const MAX_LP_FEE: u32 = ONE_IN_HUNDREDTH_PIPS / 2;
/// The maximum tick spacing, any larger spacing would leave too few usable ticks to be useful.
pub const MAX_TICK_SPACING: Tick = 16384;

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Encode,
	Decode,
	MaxEncodedLen,
	TypeInfo,
	Serialize,
	Deserialize,
)]
pub enum Side {
	Zero,
	One,
}

impl core::ops::Not for Side {
	type Output = Self;

	fn not(self) -> Self::Output {
		match self {
			Side::Zero => Side::One,
			Side::One => Side::Zero,
		}
	}
}

#[derive(
	Copy,
	Clone,
	Default,
	Debug,
	TypeInfo,
	PartialEq,
	Eq,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct SideMap<T> {
	zero: T,
	one: T,
}
impl<T> SideMap<T> {
	pub fn from_array(array: [T; 2]) -> Self {
		let [zero, one] = array;
		Self { zero, one }
	}

	pub fn into_array(self) -> [T; 2] {
		[self.zero, self.one]
	}

	pub fn map<R>(self, mut f: impl FnMut(Side, T) -> R) -> SideMap<R> {
		SideMap { zero: f(Side::Zero, self.zero), one: f(Side::One, self.one) }
	}

	pub fn try_map<R, E>(
		self,
		mut f: impl FnMut(Side, T) -> Result<R, E>,
	) -> Result<SideMap<R>, E> {
		Ok(SideMap { zero: f(Side::Zero, self.zero)?, one: f(Side::One, self.one)? })
	}

	pub fn zip<R>(self, other: SideMap<R>) -> SideMap<(T, R)> {
		SideMap { zero: (self.zero, other.zero), one: (self.one, other.one) }
	}
}
impl<T> core::ops::Index<Side> for SideMap<T> {
	type Output = T;
	fn index(&self, side: Side) -> &T {
		match side {
			Side::Zero => &self.zero,
			Side::One => &self.one,
		}
	}
}
impl<T> core::ops::IndexMut<Side> for SideMap<T> {
	fn index_mut(&mut self, side: Side) -> &mut T {
		match side {
			Side::Zero => &mut self.zero,
			Side::One => &mut self.one,
		}
	}
}
#[cfg(test)]
impl<T: core::ops::Add<R>, R> core::ops::Add<SideMap<R>> for SideMap<T> {
	type Output = SideMap<<T as core::ops::Add<R>>::Output>;
	fn add(self, rhs: SideMap<R>) -> Self::Output {
		SideMap { zero: self.zero + rhs.zero, one: self.one + rhs.one }
	}
}

/// A change to the pool's balance of one asset, from the pool's point of view.
///
/// `Inflow` is owed to the pool by the caller, `Outflow` is owed by the pool to the caller. The
/// engine never moves assets itself, these deltas are handed to a `Settlement` before commit.
#[derive(
	Copy,
	Clone,
	Debug,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub enum AmountDelta {
	Inflow(Amount),
	Outflow(Amount),
}
impl AmountDelta {
	pub fn is_zero(&self) -> bool {
		match self {
			AmountDelta::Inflow(amount) | AmountDelta::Outflow(amount) => amount.is_zero(),
		}
	}

	pub fn amount(&self) -> Amount {
		match self {
			AmountDelta::Inflow(amount) | AmountDelta::Outflow(amount) => *amount,
		}
	}
}
impl Default for AmountDelta {
	fn default() -> Self {
		AmountDelta::Inflow(Amount::zero())
	}
}

/// The amount a swap is specified by.
#[derive(
	Copy,
	Clone,
	Debug,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub enum SwapAmount {
	/// Sell exactly this much of the input asset, fees included.
	ExactInput(Amount),
	/// Buy exactly this much of the output asset.
	ExactOutput(Amount),
}
impl SwapAmount {
	pub fn amount(&self) -> Amount {
		match self {
			SwapAmount::ExactInput(amount) | SwapAmount::ExactOutput(amount) => *amount,
		}
	}

	pub fn with_amount(&self, amount: Amount) -> Self {
		match self {
			SwapAmount::ExactInput(_) => SwapAmount::ExactInput(amount),
			SwapAmount::ExactOutput(_) => SwapAmount::ExactOutput(amount),
		}
	}
}

/// Asset zero is sold, the price decreases.
pub enum ZeroToOne {}
/// Asset one is sold, the price increases.
pub enum OneToZero {}

pub trait SwapDirection {
	const INPUT_SIDE: Side;

	/// Determines if a given sqrt_price is further along the swap direction than another
	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool;
}
impl SwapDirection for ZeroToOne {
	const INPUT_SIDE: Side = Side::Zero;

	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool {
		sqrt_price < sqrt_price_other
	}
}
impl SwapDirection for OneToZero {
	const INPUT_SIDE: Side = Side::One;

	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool {
		sqrt_price > sqrt_price_other
	}
}
