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

//! A sparse directory of initialized ticks.
//!
//! Ticks are compressed by the pool's tick spacing and grouped into 256 bit words. Only words
//! with at least one initialized tick are stored, so searching for the next initialized tick
//! is a bit scan within the current word followed by a jump to the neighbouring stored word.

use core::ops::Bound;
use std::collections::BTreeMap;

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::U256;

use crate::common::Tick;

const WORD_BITS: i32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickBitmapError {
	#[error("tick {tick} is not a multiple of the tick spacing {tick_spacing}")]
	TickNotAligned { tick: Tick, tick_spacing: Tick },
}

/// The word index and bit index of a compressed tick.
pub type BitPosition = (i16, u8);

#[derive(Clone, Debug, Default, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct TickBitmap {
	words: BTreeMap<i16, U256>,
}

fn compress(tick: Tick, tick_spacing: Tick) -> i32 {
	tick.div_euclid(tick_spacing)
}

fn position(compressed: i32) -> BitPosition {
	((compressed >> 8) as i16, compressed.rem_euclid(WORD_BITS) as u8)
}

impl TickBitmap {
	/// The bit position of `tick`. Ticks that are not a multiple of `tick_spacing` are rejected,
	/// never rounded.
	pub fn position(tick: Tick, tick_spacing: Tick) -> Result<BitPosition, TickBitmapError> {
		if tick_spacing <= 0 || tick % tick_spacing != 0 {
			Err(TickBitmapError::TickNotAligned { tick, tick_spacing })
		} else {
			Ok(position(tick / tick_spacing))
		}
	}

	/// Toggles a bit position previously returned by `position`.
	pub fn toggle(&mut self, (word_index, bit_index): BitPosition) {
		let word = self.words.entry(word_index).or_default();
		*word = *word ^ (U256::one() << bit_index);
		if word.is_zero() {
			self.words.remove(&word_index);
		}
	}

	pub fn flip(&mut self, tick: Tick, tick_spacing: Tick) -> Result<(), TickBitmapError> {
		Self::position(tick, tick_spacing).map(|bit_position| self.toggle(bit_position))
	}

	pub fn is_initialized(&self, tick: Tick, tick_spacing: Tick) -> bool {
		Self::position(tick, tick_spacing)
			.map(|(word_index, bit_index)| {
				self.words.get(&word_index).is_some_and(|word| word.bit(bit_index as usize))
			})
			.unwrap_or(false)
	}

	/// Searches the word containing `tick` for the next initialized tick, at or to the left of
	/// `tick` when `lte`, otherwise strictly to the right. If none is found the word's boundary
	/// tick is returned with `false`.
	///
	/// `tick` need not be aligned to `tick_spacing`.
	pub fn next_initialized_within_one_word(
		&self,
		tick: Tick,
		tick_spacing: Tick,
		lte: bool,
	) -> (Tick, bool) {
		let compressed = compress(tick, tick_spacing);

		if lte {
			let (word_index, bit_index) = position(compressed);
			// All the bits at or below `bit_index`
			let mask = (U256::one() << bit_index) - 1 + (U256::one() << bit_index);
			let masked = self.word(word_index) & mask;

			if masked.is_zero() {
				((compressed - bit_index as i32) * tick_spacing, false)
			} else {
				let most_significant_bit = masked.bits() as i32 - 1;
				((compressed - (bit_index as i32 - most_significant_bit)) * tick_spacing, true)
			}
		} else {
			let (word_index, bit_index) = position(compressed + 1);
			// All the bits at or above `bit_index`
			let mask = !((U256::one() << bit_index) - 1);
			let masked = self.word(word_index) & mask;

			if masked.is_zero() {
				((compressed + 1 + (u8::MAX - bit_index) as i32) * tick_spacing, false)
			} else {
				let least_significant_bit = masked.trailing_zeros() as i32;
				((compressed + 1 + (least_significant_bit - bit_index as i32)) * tick_spacing, true)
			}
		}
	}

	/// The next initialized tick in the given direction across any number of words, using the
	/// same inclusivity as `next_initialized_within_one_word`. `None` if there is none.
	pub fn next_initialized(&self, tick: Tick, tick_spacing: Tick, lte: bool) -> Option<Tick> {
		match self.next_initialized_within_one_word(tick, tick_spacing, lte) {
			(next, true) => Some(next),
			(_, false) => {
				let compressed = compress(tick, tick_spacing);
				if lte {
					let (word_index, _) = position(compressed);
					self.words.range(..word_index).next_back().map(|(word_index, word)| {
						(*word_index as i32 * WORD_BITS + word.bits() as i32 - 1) * tick_spacing
					})
				} else {
					let (word_index, _) = position(compressed + 1);
					self.words
						.range((Bound::Excluded(word_index), Bound::Unbounded))
						.next()
						.map(|(word_index, word)| {
							(*word_index as i32 * WORD_BITS + word.trailing_zeros() as i32) *
								tick_spacing
						})
				}
			},
		}
	}

	/// Iterates over every initialized tick in ascending order.
	pub fn initialized_ticks(&self, tick_spacing: Tick) -> impl '_ + Iterator<Item = Tick> {
		self.words.iter().flat_map(move |(word_index, word)| {
			(0..WORD_BITS)
				.filter(move |bit_index| word.bit(*bit_index as usize))
				.map(move |bit_index| (*word_index as i32 * WORD_BITS + bit_index) * tick_spacing)
		})
	}

	fn word(&self, word_index: i16) -> U256 {
		self.words.get(&word_index).copied().unwrap_or_default()
	}
}
