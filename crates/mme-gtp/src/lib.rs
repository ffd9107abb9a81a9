//
// Copyright (c) 2024 Elide Technologies, Inc.
//
// Licensed under the MIT license (the "License"); you may not use this file except in compliance
// with the License. You may obtain a copy of the License at
//
// https://opensource.org/license/mit/
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
// an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under the License.
//

//! GTPv2-C S11 user FSM and its supporting allocators (spec.md §4.6).

pub mod s11;
pub mod seq;
pub mod source_addr;
pub mod teid;

pub use s11::{S11Action, S11State, S11UserSession};
pub use seq::SeqAllocator;
pub use source_addr::validate_source_addr;
pub use teid::TeidAllocator;
