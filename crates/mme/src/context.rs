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

//! Per-UE aggregate: EMM, ESM, the S11 user session and the pending
//! auth-vector queue all move together behind one registry handle
//! (spec.md §3, §4.8).

use mme_gtp::S11UserSession;
use mme_nas::{EmmContext, EsmContext};
use mme_s6a::AuthVectorQueue;
use mme_types::{FTeid, Imsi, MmeUeS1apId};

pub struct UeContext {
  pub emm: EmmContext,
  pub esm: EsmContext,
  pub s11: S11UserSession,
  pub auth_vectors: AuthVectorQueue,
  /// Set once the S1AP transport anchors this UE to a live eNB
  /// connection; `mme::mme::Mme::send_s1ap` keys its downlink queue on
  /// this rather than the registry's own `Handle<UeContext>`, since the
  /// MME-UE-S1AP-ID is what's visible across the rest of the daemon.
  pub mme_ue_id: Option<MmeUeS1apId>,
  /// The S11-MME F-TEID allocated for this session's Create-Session
  /// request; kept around so the eventual Modify-Bearer-Request (sent
  /// once the eNB's `InitialContextSetupResponse` supplies its own
  /// F-TEID) can be built without re-deriving it.
  pub mme_s11_fteid: Option<FTeid>,
}

impl UeContext {
  pub fn new(imsi: Imsi) -> Self {
    Self {
      emm: EmmContext::new(imsi),
      esm: EsmContext::new(),
      s11: S11UserSession::new(),
      auth_vectors: AuthVectorQueue::new(),
      mme_ue_id: None,
      mme_s11_fteid: None,
    }
  }
}
