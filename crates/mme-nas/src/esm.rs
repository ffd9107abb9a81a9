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

//! ESM (EPS Session Management) FSM, one per PDN connection (spec.md §4.5).

use mme_types::{Ebi, Paa};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerState {
  Inactive,
  PendingActivation,
  Active,
  PendingDeactivation,
}

/// Decoded `PDN Connectivity Request` (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdnConnectivityRequest {
  pub esm_info_transfer_flag: bool,
  pub apn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EsmAction {
  None,
  SendEsmInformationRequest { ebi: Ebi },
  RequestCreateSession { ebi: Ebi, apn: String },
  SendActivateDefaultBearer { ebi: Ebi, paa: Paa },
  SendEsmStatus,
}

/// A UE's ESM context: its bearer map, keyed by EPS Bearer Identity.
#[derive(Debug, Default)]
pub struct EsmContext {
  bearers: BTreeMap<Ebi, BearerState>,
  pending_apn: BTreeMap<Ebi, String>,
}

impl EsmContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Next free EBI starting at 5 (spec.md §3: "next free slot starting at 5").
  fn allocate_ebi(&mut self) -> Option<Ebi> {
    for candidate in Ebi::MIN..=Ebi::MAX {
      let ebi = Ebi(candidate);
      if !self.bearers.contains_key(&ebi) {
        self.bearers.insert(ebi, BearerState::PendingActivation);
        return Some(ebi);
      }
    }
    None
  }

  pub fn release_bearer(&mut self, ebi: Ebi) {
    self.bearers.remove(&ebi);
    self.pending_apn.remove(&ebi);
  }

  pub fn bearer_state(&self, ebi: Ebi) -> Option<BearerState> {
    self.bearers.get(&ebi).copied()
  }

  pub fn active_bearer_count(&self) -> usize {
    self.bearers
      .values()
      .filter(|s| **s == BearerState::Active)
      .count()
  }

  /// PDN Connectivity Request: allocate a bearer and either ask for ESM
  /// info first or go straight to Create-Session.
  pub fn on_pdn_connectivity_request(&mut self, req: PdnConnectivityRequest) -> EsmAction {
    let Some(ebi) = self.allocate_ebi() else {
      return EsmAction::SendEsmStatus;
    };
    if req.esm_info_transfer_flag {
      if let Some(apn) = req.apn {
        self.pending_apn.insert(ebi, apn);
      }
      EsmAction::SendEsmInformationRequest { ebi }
    } else {
      let apn = req.apn.unwrap_or_else(|| "internet".to_string());
      self.pending_apn.insert(ebi, apn.clone());
      EsmAction::RequestCreateSession { ebi, apn }
    }
  }

  pub fn on_esm_information_response(&mut self, ebi: Ebi, apn: String) -> EsmAction {
    if self.bearers.get(&ebi) != Some(&BearerState::PendingActivation) {
      return EsmAction::SendEsmStatus;
    }
    self.pending_apn.insert(ebi, apn.clone());
    EsmAction::RequestCreateSession { ebi, apn }
  }

  /// S11 Create-Session-Response landed: activate the default bearer.
  pub fn on_session_created(&mut self, ebi: Ebi, paa: Paa) -> EsmAction {
    match self.bearers.get_mut(&ebi) {
      Some(state) => {
        *state = BearerState::Active;
        EsmAction::SendActivateDefaultBearer { ebi, paa }
      }
      None => EsmAction::SendEsmStatus,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::Ipv4Addr;

  fn paa() -> Paa {
    Paa {
      pdn_type: mme_types::PdnType::Ipv4,
      ipv4: Ipv4Addr::new(172, 16, 0, 9),
    }
  }

  #[test]
  fn first_bearer_gets_ebi_five() {
    let mut esm = EsmContext::new();
    let action = esm.on_pdn_connectivity_request(PdnConnectivityRequest {
      esm_info_transfer_flag: false,
      apn: None,
    });
    assert_eq!(
      action,
      EsmAction::RequestCreateSession {
        ebi: Ebi(5),
        apn: "internet".to_string()
      }
    );
  }

  #[test]
  fn esm_info_flag_requests_info_before_create_session() {
    let mut esm = EsmContext::new();
    let action = esm.on_pdn_connectivity_request(PdnConnectivityRequest {
      esm_info_transfer_flag: true,
      apn: None,
    });
    assert_eq!(action, EsmAction::SendEsmInformationRequest { ebi: Ebi(5) });
    let action = esm.on_esm_information_response(Ebi(5), "ims".to_string());
    assert_eq!(
      action,
      EsmAction::RequestCreateSession {
        ebi: Ebi(5),
        apn: "ims".to_string()
      }
    );
  }

  #[test]
  fn released_ebi_is_reused() {
    let mut esm = EsmContext::new();
    let req = || PdnConnectivityRequest {
      esm_info_transfer_flag: false,
      apn: None,
    };
    esm.on_pdn_connectivity_request(req());
    esm.on_pdn_connectivity_request(req());
    esm.release_bearer(Ebi(5));
    let action = esm.on_pdn_connectivity_request(req());
    assert_eq!(
      action,
      EsmAction::RequestCreateSession {
        ebi: Ebi(5),
        apn: "internet".to_string()
      }
    );
  }

  #[test]
  fn session_created_activates_bearer() {
    let mut esm = EsmContext::new();
    esm.on_pdn_connectivity_request(PdnConnectivityRequest {
      esm_info_transfer_flag: false,
      apn: None,
    });
    let action = esm.on_session_created(Ebi(5), paa());
    assert_eq!(
      action,
      EsmAction::SendActivateDefaultBearer { ebi: Ebi(5), paa: paa() }
    );
    assert_eq!(esm.active_bearer_count(), 1);
  }
}
