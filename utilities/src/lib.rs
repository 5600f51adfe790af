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

mod logging;

pub use logging::init_test_logger;

/// Unwraps an `Ok(_)` value, panicking with the stringified expression and the error otherwise.
#[macro_export]
macro_rules! assert_ok {
	($result:expr) => {
		match $result {
			Ok(ok) => ok,
			Err(err) => panic!("expression '{}' was not Ok: {:?}", stringify!($result), err),
		}
	};
}

/// Unwraps an `Err(_)` value, panicking with the stringified expression and the value otherwise.
#[macro_export]
macro_rules! assert_err {
	($result:expr) => {
		match $result {
			Err(err) => err,
			Ok(ok) => panic!("expression '{}' was not Err: {:?}", stringify!($result), ok),
		}
	};
}

#[macro_export]
macro_rules! assert_panics {
	($expression:expr) => {
		match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $expression)) {
			Ok(_result) => panic!("expression didn't panic '{}'", stringify!($expression),),
			Err(panic) => panic,
		}
	};
}
