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

//! ECM (EPS Connection Management) session FSM (spec.md §4.3).

use mme_types::EnbUeS1apId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcmState {
  Idle,
  Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcmAction {
  None,
  /// Downlink NAS PDU ready to wrap in an S1AP DL container and send to
  /// the eNB currently holding this UE's radio context.
  SendDownlink { nas_pdu: Vec<u8> },
  /// Paging must be issued; valid only while Idle (spec.md §4.3).
  Page,
  /// Forward a decoded uplink NAS PDU up to EMM.
  ForwardToEmm { nas_pdu: Vec<u8> },
}

/// One UE's ECM session, anchored on exactly one S1 association while Connected.
#[derive(Debug, Clone)]
pub struct EcmSession {
  pub state: EcmState,
  pub enb_ue_id: Option<EnbUeS1apId>,
}

impl Default for EcmSession {
  fn default() -> Self {
    Self::new()
  }
}

impl EcmSession {
  pub fn new() -> Self {
    Self {
      state: EcmState::Idle,
      enb_ue_id: None,
    }
  }

  /// Idle -> Connected on initial-UE message (spec.md §4.3).
  pub fn on_initial_ue(&mut self, enb_ue_id: EnbUeS1apId, nas_pdu: Vec<u8>) -> EcmAction {
    self.state = EcmState::Connected;
    self.enb_ue_id = Some(enb_ue_id);
    EcmAction::ForwardToEmm { nas_pdu }
  }

  /// Idle -> Connected on successful paging response (Service Request).
  pub fn on_paging_response(&mut self, enb_ue_id: EnbUeS1apId, nas_pdu: Vec<u8>) -> EcmAction {
    self.state = EcmState::Connected;
    self.enb_ue_id = Some(enb_ue_id);
    EcmAction::ForwardToEmm { nas_pdu }
  }

  /// Connected -> Idle on UE Context Release Complete.
  pub fn on_context_release_complete(&mut self) -> EcmAction {
    self.state = EcmState::Idle;
    self.enb_ue_id = None;
    EcmAction::None
  }

  /// Uplink UE-associated PDU already routed to us by the association FSM.
  pub fn on_uplink(&mut self, nas_pdu: Vec<u8>) -> EcmAction {
    EcmAction::ForwardToEmm { nas_pdu }
  }

  /// `send(bytes)`: downlink NAS, only meaningful while Connected.
  pub fn send(&self, nas_pdu: Vec<u8>) -> EcmAction {
    match self.state {
      EcmState::Connected => EcmAction::SendDownlink { nas_pdu },
      EcmState::Idle => EcmAction::None,
    }
  }

  /// `page(emm)`: only valid while Idle.
  pub fn page(&self) -> EcmAction {
    match self.state {
      EcmState::Idle => EcmAction::Page,
      EcmState::Connected => EcmAction::None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_ue_transitions_to_connected() {
    let mut ecm = EcmSession::new();
    let action = ecm.on_initial_ue(EnbUeS1apId(9), vec![1, 2, 3]);
    assert_eq!(ecm.state, EcmState::Connected);
    assert_eq!(
      action,
      EcmAction::ForwardToEmm {
        nas_pdu: vec![1, 2, 3]
      }
    );
  }

  #[test]
  fn context_release_returns_to_idle() {
    let mut ecm = EcmSession::new();
    ecm.on_initial_ue(EnbUeS1apId(1), vec![]);
    ecm.on_context_release_complete();
    assert_eq!(ecm.state, EcmState::Idle);
    assert!(ecm.enb_ue_id.is_none());
  }

  #[test]
  fn send_while_idle_is_a_no_op() {
    let ecm = EcmSession::new();
    assert_eq!(ecm.send(vec![1]), EcmAction::None);
  }

  #[test]
  fn page_only_valid_while_idle() {
    let mut ecm = EcmSession::new();
    assert_eq!(ecm.page(), EcmAction::Page);
    ecm.on_initial_ue(EnbUeS1apId(1), vec![]);
    assert_eq!(ecm.page(), EcmAction::None);
  }
}
