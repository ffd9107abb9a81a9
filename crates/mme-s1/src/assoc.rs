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

//! S1AP eNB-association FSM (spec.md §4.2).
//!
//! Follows the action-returning style used throughout this workspace: the
//! FSM never touches a socket. Each `on_*` call consumes a decoded event and
//! returns an `S1AssocAction` describing what the caller (the binary's S1AP
//! transport module, which does own the socket) must do next.

use mme_types::{BroadcastTa, EnbUeS1apId, GlobalEnbId, Gummei, MmeUeS1apId, Plmn, S1Cause};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S1AssocState {
  NotConfigured,
  Active,
}

/// Decoded `S1SetupRequest` IEs (spec.md §4.2). `global_enb_id` and
/// `supported_tas` are `None` when the codec could not find the
/// corresponding mandatory IE in the PDU — the FSM, not the codec, raises
/// the semantic-error failure for that (SPEC_FULL.md §4.2).
#[derive(Debug, Clone)]
pub struct S1SetupRequest {
  pub global_enb_id: Option<GlobalEnbId>,
  pub supported_tas: Option<Vec<BroadcastTa>>,
  pub enb_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S1AssocAction {
  None,
  SendSetupFailure {
    cause: S1Cause,
  },
  SendSetupResponse {
    mme_name: Option<String>,
    served_gummeis: Vec<Gummei>,
    relative_capacity: u8,
  },
  SendErrorIndication,
  /// A fresh MME-UE-S1AP-ID must be allocated and an ECM session created;
  /// the transport module carries this out against the shared registry.
  CreateEcmSession {
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
  },
  /// Route an already-anchored UE-associated PDU up to its ECM session.
  RouteToEcm {
    mme_ue_id: MmeUeS1apId,
    nas_pdu: Vec<u8>,
  },
  /// SCTP disconnect: every UE anchored on this association falls back to
  /// Idle and the association itself is torn down by the caller.
  ReleaseAllUes {
    mme_ue_ids: Vec<MmeUeS1apId>,
  },
}

/// One eNB association (spec.md §3's "eNB Association" object).
#[derive(Debug, Clone)]
pub struct S1Association {
  pub state: S1AssocState,
  pub global_enb_id: Option<GlobalEnbId>,
  pub enb_name: Option<String>,
  pub supported_tas: Vec<BroadcastTa>,
  /// eNB-UE-S1AP-ID -> MME-UE-S1AP-ID, populated once a UE is anchored.
  ue_ids: HashMap<EnbUeS1apId, MmeUeS1apId>,
}

impl Default for S1Association {
  fn default() -> Self {
    Self::new()
  }
}

impl S1Association {
  pub fn new() -> Self {
    Self {
      state: S1AssocState::NotConfigured,
      global_enb_id: None,
      enb_name: None,
      supported_tas: Vec::new(),
      ue_ids: HashMap::new(),
    }
  }

  /// `S1SetupRequest` in NotConfigured (spec.md §4.2). `served_plmns` is
  /// the union of every served GUMMEI's PLMN; `served_gummeis` and
  /// `mme_name`/`relative_capacity` feed the success response body.
  pub fn on_s1_setup_request(
    &mut self,
    req: S1SetupRequest,
    served_plmns: &[Plmn],
    served_gummeis: &[Gummei],
    mme_name: Option<&str>,
    relative_capacity: u8,
  ) -> S1AssocAction {
    if self.state != S1AssocState::NotConfigured {
      return S1AssocAction::SendErrorIndication;
    }

    // Missing Global_ENB_ID or SupportedTAs is a distinct failure path
    // from the PLMN-mismatch one below, raised before ever evaluating
    // PLMN membership (SPEC_FULL.md §4.2, grounded on
    // S1Assoc_NotConfigured.c's IE presence check).
    let (Some(global_enb_id), Some(supported_tas)) = (req.global_enb_id, req.supported_tas)
    else {
      return S1AssocAction::SendSetupFailure {
        cause: S1Cause::SemanticError,
      };
    };

    let plmn_served = supported_tas
      .iter()
      .any(|ta| mme_types::plmn::ta_matches_served(ta, served_plmns));

    if !plmn_served {
      // Stay NotConfigured rather than closing (spec.md §9 open
      // question 1): a misconfigured eNB may retry with corrected TAs.
      return S1AssocAction::SendSetupFailure {
        cause: S1Cause::UnknownPlmn,
      };
    }

    self.global_enb_id = Some(global_enb_id);
    self.enb_name = req.enb_name;
    self.supported_tas = supported_tas;
    self.state = S1AssocState::Active;

    S1AssocAction::SendSetupResponse {
      mme_name: mme_name.map(str::to_string),
      served_gummeis: served_gummeis.to_vec(),
      relative_capacity,
    }
  }

  /// Initial-UE message in Active: always a new UE as far as S1AP is
  /// concerned, so it always allocates a fresh MME-UE-S1AP-ID.
  pub fn on_initial_ue(&mut self, enb_ue_id: EnbUeS1apId, nas_pdu: Vec<u8>) -> S1AssocAction {
    if self.state != S1AssocState::Active {
      return S1AssocAction::SendErrorIndication;
    }
    S1AssocAction::CreateEcmSession {
      enb_ue_id,
      nas_pdu,
    }
  }

  /// Called by the transport module once `CreateEcmSession` has produced
  /// an id, to record the eNB-UE-S1AP-ID <-> MME-UE-S1AP-ID pairing.
  pub fn bind_ue(&mut self, enb_ue_id: EnbUeS1apId, mme_ue_id: MmeUeS1apId) {
    self.ue_ids.insert(enb_ue_id, mme_ue_id);
  }

  /// UE-associated message in Active, routed by (MME-UE-S1AP-ID,
  /// eNB-UE-S1AP-ID) per spec.md §4.2.
  pub fn on_ue_associated(
    &mut self,
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
  ) -> S1AssocAction {
    if self.state != S1AssocState::Active {
      return S1AssocAction::SendErrorIndication;
    }
    match self.ue_ids.get(&enb_ue_id) {
      Some(&mme_ue_id) => S1AssocAction::RouteToEcm { mme_ue_id, nas_pdu },
      None => S1AssocAction::SendErrorIndication,
    }
  }

  pub fn forget_ue(&mut self, enb_ue_id: EnbUeS1apId) {
    self.ue_ids.remove(&enb_ue_id);
  }

  /// SCTP disconnect (spec.md §4.2 failure semantics).
  pub fn on_disconnect(&mut self) -> S1AssocAction {
    let ids: Vec<MmeUeS1apId> = self.ue_ids.values().copied().collect();
    self.ue_ids.clear();
    S1AssocAction::ReleaseAllUes { mme_ue_ids: ids }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn served(mcc: &str, mnc: &str) -> (Vec<Plmn>, Vec<Gummei>) {
    let plmn = Plmn::from_digits(mcc, mnc).unwrap();
    (
      vec![plmn],
      vec![Gummei {
        plmn,
        mme_group_id: 1,
        mme_code: 1,
      }],
    )
  }

  #[test]
  fn setup_with_matching_plmn_activates() {
    let mut assoc = S1Association::new();
    let (plmns, gummeis) = served("310", "410");
    let req = S1SetupRequest {
      global_enb_id: Some(GlobalEnbId {
        plmn: plmns[0],
        enb_id: 5,
      }),
      supported_tas: Some(vec![BroadcastTa {
        tac: 100,
        plmns: plmns.clone(),
      }]),
      enb_name: Some("enb-a".to_string()),
    };
    let action = assoc.on_s1_setup_request(req, &plmns, &gummeis, Some("mme1"), 10);
    assert_eq!(assoc.state, S1AssocState::Active);
    match action {
      S1AssocAction::SendSetupResponse { relative_capacity, .. } => {
        assert_eq!(relative_capacity, 10);
      }
      other => panic!("unexpected action: {other:?}"),
    }
  }

  #[test]
  fn setup_with_unknown_plmn_stays_not_configured() {
    let mut assoc = S1Association::new();
    let (plmns, gummeis) = served("310", "410");
    let (foreign_plmns, _) = served("234", "15");
    let req = S1SetupRequest {
      global_enb_id: Some(GlobalEnbId {
        plmn: foreign_plmns[0],
        enb_id: 5,
      }),
      supported_tas: Some(vec![BroadcastTa {
        tac: 1,
        plmns: foreign_plmns,
      }]),
      enb_name: None,
    };
    let action = assoc.on_s1_setup_request(req, &plmns, &gummeis, None, 10);
    assert_eq!(assoc.state, S1AssocState::NotConfigured);
    assert_eq!(
      action,
      S1AssocAction::SendSetupFailure {
        cause: S1Cause::UnknownPlmn
      }
    );
  }

  #[test]
  fn setup_missing_mandatory_ies_is_semantic_error() {
    let mut assoc = S1Association::new();
    let (plmns, gummeis) = served("310", "410");
    let req = S1SetupRequest {
      global_enb_id: None,
      supported_tas: Some(vec![BroadcastTa {
        tac: 1,
        plmns: plmns.clone(),
      }]),
      enb_name: None,
    };
    let action = assoc.on_s1_setup_request(req, &plmns, &gummeis, None, 10);
    assert_eq!(assoc.state, S1AssocState::NotConfigured);
    assert_eq!(
      action,
      S1AssocAction::SendSetupFailure {
        cause: S1Cause::SemanticError
      }
    );
  }

  #[test]
  fn initial_ue_before_setup_is_rejected() {
    let mut assoc = S1Association::new();
    let action = assoc.on_initial_ue(EnbUeS1apId(1), vec![0x01]);
    assert_eq!(action, S1AssocAction::SendErrorIndication);
  }

  #[test]
  fn disconnect_releases_every_anchored_ue() {
    let mut assoc = S1Association::new();
    let (plmns, gummeis) = served("310", "410");
    let req = S1SetupRequest {
      global_enb_id: Some(GlobalEnbId {
        plmn: plmns[0],
        enb_id: 1,
      }),
      supported_tas: Some(vec![BroadcastTa {
        tac: 1,
        plmns: plmns.clone(),
      }]),
      enb_name: None,
    };
    assoc.on_s1_setup_request(req, &plmns, &gummeis, None, 1);
    assoc.bind_ue(EnbUeS1apId(1), MmeUeS1apId(1));
    assoc.bind_ue(EnbUeS1apId(2), MmeUeS1apId(2));
    let action = assoc.on_disconnect();
    match action {
      S1AssocAction::ReleaseAllUes { mut mme_ue_ids } => {
        mme_ue_ids.sort();
        assert_eq!(mme_ue_ids, vec![MmeUeS1apId(1), MmeUeS1apId(2)]);
      }
      other => panic!("unexpected action: {other:?}"),
    }
  }
}
