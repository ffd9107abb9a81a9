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

//! S1AP eNB-association FSM and ECM session FSM (spec.md §4.2, §4.3).

pub mod assoc;
pub mod ecm;

pub use assoc::{S1AssocAction, S1AssocState, S1Association, S1SetupRequest};
pub use ecm::{EcmAction, EcmSession, EcmState};
