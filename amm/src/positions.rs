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

use std::collections::BTreeMap;

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

use clamm_math::{add_liquidity_delta, MathError};

use crate::{
	common::{Amount, FeeGrowthQ128F128, Liquidity, Side, SideMap, Tick},
	fee_growth,
};

/// Distinguishes several positions of one owner over the same range.
pub type PositionTag = u64;

#[derive(
	Clone,
	Debug,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct PositionKey<LiquidityProvider> {
	pub owner: LiquidityProvider,
	pub lower_tick: Tick,
	pub upper_tick: Tick,
	pub tag: PositionTag,
}

#[derive(
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Position {
	pub liquidity: Liquidity,
	/// Fee growth inside the position's range when its fees were last accrued.
	pub last_fee_growth_inside: SideMap<FeeGrowthQ128F128>,
	/// Fees credited to the owner but not yet collected.
	pub tokens_owed: SideMap<Amount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
	/// A zero liquidity change is only meaningful on a position that holds liquidity.
	#[error("cannot poke a position without liquidity")]
	PokeEmptyPosition,
	#[error("position does not exist")]
	NonExistent,
	#[error("the position does not have enough liquidity")]
	InsufficientLiquidity,
	#[error(transparent)]
	Math(#[from] MathError),
}

impl Position {
	/// A position with no liquidity and nothing owed carries no information and may be discarded.
	pub fn is_empty(&self) -> bool {
		self.liquidity == 0 && self.tokens_owed.into_array().iter().all(Amount::is_zero)
	}

	/// Credits the fees earned by the position's current liquidity since the last accrual and
	/// moves its snapshot to `fee_growth_inside`. Returns the fees credited.
	///
	/// Fails with `MathError::Overflow` rather than drop fees the owed amounts cannot hold.
	pub fn accrue_fees(
		&mut self,
		fee_growth_inside: SideMap<FeeGrowthQ128F128>,
	) -> Result<SideMap<Amount>, MathError> {
		let fees = fee_growth_inside.zip(self.last_fee_growth_inside).try_map(
			|_side, (now, last)| fee_growth::fees_earned(now, last, self.liquidity),
		)?;

		self.tokens_owed = self
			.tokens_owed
			.zip(fees)
			.try_map(|_side, (owed, fee)| owed.checked_add(fee).ok_or(MathError::Overflow))?;
		self.last_fee_growth_inside = fee_growth_inside;

		Ok(fees)
	}

	/// Takes up to `maximum` of each asset out of `tokens_owed`, returning what was taken.
	pub fn withdraw(&mut self, maximum: SideMap<Amount>) -> SideMap<Amount> {
		let collected =
			self.tokens_owed.zip(maximum).map(|_side, (owed, maximum)| owed.min(maximum));
		for side in [Side::Zero, Side::One] {
			self.tokens_owed[side] -= collected[side];
		}
		collected
	}
}

/// All positions of a pool.
#[derive(Clone, Debug, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
#[serde(bound(
	serialize = "LiquidityProvider: Serialize",
	deserialize = "LiquidityProvider: Deserialize<'de>"
))]
pub struct PositionLedger<LiquidityProvider: Ord> {
	#[serde(with = "pairs")]
	positions: BTreeMap<PositionKey<LiquidityProvider>, Position>,
}

/// Human readable formats generally only allow string map keys, so the ledger is serialized as a
/// sequence of key and position pairs.
mod pairs {
	use super::*;
	use serde::{Deserializer, Serializer};

	pub fn serialize<S: Serializer, LiquidityProvider: Serialize + Ord>(
		positions: &BTreeMap<PositionKey<LiquidityProvider>, Position>,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(positions.iter())
	}

	pub fn deserialize<'de, D: Deserializer<'de>, LiquidityProvider: Deserialize<'de> + Ord>(
		deserializer: D,
	) -> Result<BTreeMap<PositionKey<LiquidityProvider>, Position>, D::Error> {
		Vec::<(PositionKey<LiquidityProvider>, Position)>::deserialize(deserializer)
			.map(|pairs| pairs.into_iter().collect())
	}
}

impl<LiquidityProvider: Ord> Default for PositionLedger<LiquidityProvider> {
	fn default() -> Self {
		Self { positions: Default::default() }
	}
}

impl<LiquidityProvider: Clone + Ord> PositionLedger<LiquidityProvider> {
	pub fn get(&self, key: &PositionKey<LiquidityProvider>) -> Option<&Position> {
		self.positions.get(key)
	}

	pub fn iter(&self) -> impl '_ + Iterator<Item = (&PositionKey<LiquidityProvider>, &Position)> {
		self.positions.iter()
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	/// Computes the position at `key` after changing its liquidity by `liquidity_delta`, given the
	/// current fee growth inside its range. Fees are accrued on the liquidity held *before* the
	/// change. Returns the updated position and the fees newly credited to it.
	///
	/// Nothing is stored, the caller commits the result with `commit` once the whole operation
	/// has succeeded.
	pub fn update(
		&self,
		key: &PositionKey<LiquidityProvider>,
		liquidity_delta: i128,
		fee_growth_inside: SideMap<FeeGrowthQ128F128>,
	) -> Result<(Position, SideMap<Amount>), PositionError> {
		let mut position = match self.positions.get(key) {
			Some(position) => position.clone(),
			None if liquidity_delta > 0 => Position::default(),
			None if liquidity_delta == 0 => return Err(PositionError::PokeEmptyPosition),
			None => return Err(PositionError::NonExistent),
		};

		if liquidity_delta == 0 && position.liquidity == 0 {
			return Err(PositionError::PokeEmptyPosition)
		}

		let fees = position.accrue_fees(fee_growth_inside)?;

		position.liquidity =
			add_liquidity_delta(position.liquidity, liquidity_delta).map_err(|error| match error {
				MathError::LiquidityUnderflow => PositionError::InsufficientLiquidity,
				other => PositionError::Math(other),
			})?;

		Ok((position, fees))
	}

	/// Stores `position` at `key`, discarding it instead once it is empty.
	pub fn commit(&mut self, key: PositionKey<LiquidityProvider>, position: Position) {
		if position.is_empty() {
			self.positions.remove(&key);
		} else {
			self.positions.insert(key, position);
		}
	}
}
