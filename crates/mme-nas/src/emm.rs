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

//! EMM (EPS Mobility Management) FSM (spec.md §4.4).

use crate::esm::PdnConnectivityRequest;
use mme_s6a::{AuthVector, AuthVectorQueue, SubscriptionData};
use mme_security::{NasSecurityContext, KSI_NONE};
use mme_types::{Ebi, Imsi, NasCause, Tai};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmmState {
  Deregistered,
  CommonProcedureInitiated,
  SpecificProcedureInitiated,
  Registered,
  DeregisteredInitiated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmmAction {
  None,
  /// No cached vectors: ask the owning coordinator to issue an S6a
  /// Authentication-Information-Request.
  RequestAuthVectors,
  SendAuthenticationRequest { ksi: u8, rand: [u8; 16], autn: [u8; 16] },
  SendAuthenticationReject,
  SendSecurityModeCommand,
  RequestUpdateLocation,
  InvokePdnConnectivity { request: PdnConnectivityRequest },
  SendAttachAccept { ebi: Ebi },
  Deregister { cause: NasCause },
  /// Lightweight re-registration: refresh the stored TAI and resend the
  /// current GUTI without re-running authentication (SPEC_FULL.md §4.4).
  SendTrackingAreaUpdateAccept,
  /// No current security context to piggyback on: treat as a fresh
  /// attach-like run instead (SPEC_FULL.md §4.4).
  TreatAsFreshAttach,
}

/// One UE's mobility-management context (spec.md §3's "EMM context").
pub struct EmmContext {
  pub imsi: Imsi,
  pub state: EmmState,
  pub ue_security_capabilities: Vec<u8>,
  pub current_ksi: u8,
  pub old_ksi: u8,
  pending_ksi: Option<u8>,
  pub security: Option<NasSecurityContext>,
  pub subscription: Option<SubscriptionData>,
  pub last_tai: Option<Tai>,
  pending_pdn: Option<PdnConnectivityRequest>,
}

impl EmmContext {
  pub fn new(imsi: Imsi) -> Self {
    Self {
      imsi,
      state: EmmState::Deregistered,
      ue_security_capabilities: Vec::new(),
      current_ksi: KSI_NONE,
      old_ksi: KSI_NONE,
      pending_ksi: None,
      security: None,
      subscription: None,
      last_tai: None,
      pending_pdn: None,
    }
  }

  /// `TrackingAreaUpdateRequest` from a UE already `Registered` is a
  /// lightweight re-registration: it refreshes the stored TAI and resends
  /// the current GUTI without re-running authentication, unless there is
  /// no current security context — that case falls back to a fresh
  /// attach-like run (SPEC_FULL.md §4.4, grounded on NAS_EMM.c).
  pub fn on_tracking_area_update_request(&mut self, tai: Tai) -> EmmAction {
    if self.state != EmmState::Registered {
      return EmmAction::None;
    }
    self.last_tai = Some(tai);
    if self.current_ksi == KSI_NONE {
      self.state = EmmState::Deregistered;
      EmmAction::TreatAsFreshAttach
    } else {
      EmmAction::SendTrackingAreaUpdateAccept
    }
  }

  /// Step 1 of Attach (spec.md §4.4): buffer capabilities and the
  /// piggybacked ESM request, then kick off authentication.
  pub fn on_attach_request(
    &mut self,
    ue_security_capabilities: Vec<u8>,
    pending_pdn: PdnConnectivityRequest,
    queue: &AuthVectorQueue,
  ) -> EmmAction {
    if self.state != EmmState::Deregistered {
      return EmmAction::None;
    }
    self.ue_security_capabilities = ue_security_capabilities;
    self.pending_pdn = Some(pending_pdn);
    self.start_authentication(queue)
  }

  fn start_authentication(&mut self, queue: &AuthVectorQueue) -> EmmAction {
    match queue.peek() {
      Some(vector) => {
        let ksi = NasSecurityContext::next_ksi(self.current_ksi);
        self.pending_ksi = Some(ksi);
        self.state = EmmState::CommonProcedureInitiated;
        EmmAction::SendAuthenticationRequest {
          ksi,
          rand: vector.rand,
          autn: vector.autn,
        }
      }
      None => EmmAction::RequestAuthVectors,
    }
  }

  /// Step 2 completion: vectors arrived from S6a, resume authentication.
  pub fn on_auth_vectors_received(
    &mut self,
    vectors: Vec<AuthVector>,
    queue: &mut AuthVectorQueue,
  ) -> EmmAction {
    queue.extend(vectors);
    self.start_authentication(queue)
  }

  /// Step 4: verify RES against the head vector's XRES.
  pub fn on_authentication_response(
    &mut self,
    res: &[u8],
    queue: &mut AuthVectorQueue,
  ) -> EmmAction {
    if self.state != EmmState::CommonProcedureInitiated {
      return EmmAction::None;
    }
    let Some(vector) = queue.peek() else {
      self.state = EmmState::Deregistered;
      return EmmAction::SendAuthenticationReject;
    };
    if vector.xres != res {
      self.state = EmmState::Deregistered;
      return EmmAction::SendAuthenticationReject;
    }
    let vector = queue.pop_confirmed().expect("peek just succeeded");
    self.old_ksi = self.current_ksi;
    self.current_ksi = self.pending_ksi.take().unwrap_or(0);
    self.security = Some(NasSecurityContext::new(vector.k_asme, self.current_ksi));
    EmmAction::SendSecurityModeCommand
  }

  /// Step 6: SMC acknowledged with verified integrity; fetch subscription.
  pub fn on_security_mode_complete(&mut self) -> EmmAction {
    if self.security.is_none() || self.state != EmmState::CommonProcedureInitiated {
      return EmmAction::None;
    }
    self.state = EmmState::SpecificProcedureInitiated;
    EmmAction::RequestUpdateLocation
  }

  /// Step 7: subscription data landed; drain the buffered ESM request.
  pub fn on_update_location_response(&mut self, subscription: SubscriptionData) -> EmmAction {
    self.subscription = Some(subscription);
    match self.pending_pdn.take() {
      Some(request) => EmmAction::InvokePdnConnectivity { request },
      None => EmmAction::None,
    }
  }

  /// Step 8: ESM has a bearer; build Attach Accept.
  pub fn on_bearer_established(&mut self, ebi: Ebi) -> EmmAction {
    EmmAction::SendAttachAccept { ebi }
  }

  /// Step 9: Attach Complete confirms the UE applied the new context.
  pub fn on_attach_complete(&mut self) {
    self.state = EmmState::Registered;
  }

  /// Any post-SMC integrity failure (spec.md §4.4 error transitions).
  pub fn on_mac_failure(&mut self) -> EmmAction {
    self.state = EmmState::Deregistered;
    self.security = None;
    EmmAction::Deregister {
      cause: NasCause::MacFailure,
    }
  }

  /// Peer-unreachable on S11 during attach (spec.md §7).
  pub fn on_s11_unreachable(&mut self) -> EmmAction {
    self.state = EmmState::Deregistered;
    EmmAction::Deregister {
      cause: NasCause::NetworkFailure,
    }
  }

  pub fn on_detach_request(&mut self) {
    self.state = EmmState::Deregistered;
    self.security = None;
    self.pending_pdn = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vector(xres: &[u8]) -> AuthVector {
    AuthVector {
      rand: [1u8; 16],
      autn: [2u8; 16],
      xres: xres.to_vec(),
      k_asme: [9u8; 32],
    }
  }

  fn pdn_request() -> PdnConnectivityRequest {
    PdnConnectivityRequest {
      esm_info_transfer_flag: false,
      apn: None,
    }
  }

  #[test]
  fn attach_without_cached_vectors_requests_them() {
    let mut emm = EmmContext::new(Imsi(1010101010101));
    let queue = AuthVectorQueue::new();
    let action = emm.on_attach_request(vec![], pdn_request(), &queue);
    assert_eq!(action, EmmAction::RequestAuthVectors);
  }

  #[test]
  fn matching_res_establishes_security_context() {
    let mut emm = EmmContext::new(Imsi(1));
    let mut queue = AuthVectorQueue::new();
    emm.on_attach_request(vec![], pdn_request(), &queue);
    emm.on_auth_vectors_received(vec![vector(&[0xAA])], &mut queue);
    let action = emm.on_authentication_response(&[0xAA], &mut queue);
    assert_eq!(action, EmmAction::SendSecurityModeCommand);
    assert!(emm.security.is_some());
    assert_eq!(emm.current_ksi, 0);
    assert_eq!(emm.old_ksi, KSI_NONE);
  }

  #[test]
  fn mismatched_res_rejects_and_deregisters() {
    let mut emm = EmmContext::new(Imsi(1));
    let mut queue = AuthVectorQueue::new();
    emm.on_attach_request(vec![], pdn_request(), &queue);
    emm.on_auth_vectors_received(vec![vector(&[0xAA])], &mut queue);
    let action = emm.on_authentication_response(&[0xBB], &mut queue);
    assert_eq!(action, EmmAction::SendAuthenticationReject);
    assert_eq!(emm.state, EmmState::Deregistered);
    assert!(emm.security.is_none());
  }

  #[test]
  fn full_attach_reaches_registered_with_valid_ksi() {
    let mut emm = EmmContext::new(Imsi(1));
    let mut queue = AuthVectorQueue::new();
    emm.on_attach_request(vec![], pdn_request(), &queue);
    emm.on_auth_vectors_received(vec![vector(&[0x01])], &mut queue);
    emm.on_authentication_response(&[0x01], &mut queue);
    emm.on_security_mode_complete();
    let action = emm.on_update_location_response(SubscriptionData {
      msisdn: None,
      default_apn: "internet".to_string(),
      ambr_dl_kbps: 1,
      ambr_ul_kbps: 1,
    });
    assert!(matches!(action, EmmAction::InvokePdnConnectivity { .. }));
    emm.on_bearer_established(Ebi(5));
    emm.on_attach_complete();
    assert_eq!(emm.state, EmmState::Registered);
    assert_ne!(emm.current_ksi, emm.old_ksi);
    assert!((0..=6).contains(&emm.current_ksi));
    assert_ne!(emm.security.as_ref().unwrap().k_asme, [0u8; 32]);
  }

  fn tai() -> mme_types::Tai {
    mme_types::Tai {
      plmn: mme_types::Plmn::from_digits("310", "410").unwrap(),
      tac: 100,
    }
  }

  #[test]
  fn tau_from_registered_with_security_context_is_lightweight() {
    let mut emm = EmmContext::new(Imsi(1));
    let mut queue = AuthVectorQueue::new();
    emm.on_attach_request(vec![], pdn_request(), &queue);
    emm.on_auth_vectors_received(vec![vector(&[0x01])], &mut queue);
    emm.on_authentication_response(&[0x01], &mut queue);
    emm.on_security_mode_complete();
    emm.on_update_location_response(SubscriptionData {
      msisdn: None,
      default_apn: "internet".to_string(),
      ambr_dl_kbps: 1,
      ambr_ul_kbps: 1,
    });
    emm.on_bearer_established(Ebi(5));
    emm.on_attach_complete();

    let action = emm.on_tracking_area_update_request(tai());
    assert_eq!(action, EmmAction::SendTrackingAreaUpdateAccept);
    assert_eq!(emm.state, EmmState::Registered);
    assert_eq!(emm.last_tai, Some(tai()));
  }

  #[test]
  fn tau_without_security_context_falls_back_to_fresh_attach() {
    let mut emm = EmmContext::new(Imsi(1));
    emm.state = EmmState::Registered;
    let action = emm.on_tracking_area_update_request(tai());
    assert_eq!(action, EmmAction::TreatAsFreshAttach);
    assert_eq!(emm.state, EmmState::Deregistered);
  }

  #[test]
  fn tau_ignored_outside_registered() {
    let mut emm = EmmContext::new(Imsi(1));
    let action = emm.on_tracking_area_update_request(tai());
    assert_eq!(action, EmmAction::None);
  }
}
