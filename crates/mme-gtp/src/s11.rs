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

//! S11 user FSM: GTPv2-C session control towards the SGW (spec.md §4.6).
//!
//! `NoCtx -> wCSRsp -> UlCtx -> wModBearerRsp -> UlCtx -> wDelSessionRsp ->
//! terminal`. Every request carries a 24-bit sequence number that must be
//! echoed back; a request not acknowledged within T3 is retransmitted
//! verbatim up to `MAX_RETRANSMISSIONS` times before the path is declared
//! down.

use mme_types::{Ebi, FTeid, Imsi, Paa};

/// GTPv2-C Cause value meaning "Request accepted" (TS 29.274 §8.4).
pub const CAUSE_REQUEST_ACCEPTED: u8 = 16;

pub const MAX_RETRANSMISSIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S11State {
  NoCtx,
  WaitCreateSessionResponse,
  UlCtx,
  WaitModifyBearerResponse,
  WaitDeleteSessionResponse,
  Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKind {
  CreateSession { imsi: Imsi, mme_fteid: FTeid, ebi: Ebi },
  ModifyBearer { mme_fteid: FTeid, enb_fteid: FTeid },
  DeleteSession { ebi: Ebi },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
  seq: u32,
  attempts: u32,
  kind: PendingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S11Action {
  None,
  SendCreateSessionRequest {
    seq: u32,
    imsi: Imsi,
    mme_fteid: FTeid,
    ebi: Ebi,
  },
  SendModifyBearerRequest {
    seq: u32,
    mme_fteid: FTeid,
    enb_fteid: FTeid,
  },
  SendDeleteSessionRequest {
    seq: u32,
    ebi: Ebi,
  },
  NotifyAttachAccepted {
    sgw_fteid: FTeid,
    pgw_fteid: FTeid,
    paa: Paa,
  },
  NotifyAttachRejected,
  NotifyModifyComplete,
  NotifyModifyFailed,
  NotifyDetachComplete,
  /// N3 retransmissions exhausted: declare GTP-path failure to EMM.
  NotifyPathFailure,
}

#[derive(Debug)]
pub struct S11UserSession {
  pub state: S11State,
  pending: Option<Pending>,
  pub sgw_fteid: Option<FTeid>,
  pub pgw_fteid: Option<FTeid>,
  pub enb_fteid: Option<FTeid>,
  pub paa: Option<Paa>,
}

impl Default for S11UserSession {
  fn default() -> Self {
    Self::new()
  }
}

impl S11UserSession {
  pub fn new() -> Self {
    Self {
      state: S11State::NoCtx,
      pending: None,
      sgw_fteid: None,
      pgw_fteid: None,
      enb_fteid: None,
      paa: None,
    }
  }

  fn send_for(&self, seq: u32, kind: &PendingKind) -> S11Action {
    match kind.clone() {
      PendingKind::CreateSession { imsi, mme_fteid, ebi } => {
        S11Action::SendCreateSessionRequest { seq, imsi, mme_fteid, ebi }
      }
      PendingKind::ModifyBearer { mme_fteid, enb_fteid } => {
        S11Action::SendModifyBearerRequest { seq, mme_fteid, enb_fteid }
      }
      PendingKind::DeleteSession { ebi } => S11Action::SendDeleteSessionRequest { seq, ebi },
    }
  }

  /// `attach(cb)` in NoCtx.
  pub fn attach(&mut self, seq: u32, imsi: Imsi, mme_fteid: FTeid) -> S11Action {
    if self.state != S11State::NoCtx {
      return S11Action::None;
    }
    let kind = PendingKind::CreateSession {
      imsi,
      mme_fteid,
      ebi: Ebi(Ebi::MIN),
    };
    let action = self.send_for(seq, &kind);
    self.pending = Some(Pending { seq, attempts: 0, kind });
    self.state = S11State::WaitCreateSessionResponse;
    action
  }

  pub fn on_create_session_response(
    &mut self,
    seq: u32,
    cause: u8,
    sgw_fteid: FTeid,
    pgw_fteid: FTeid,
    paa: Paa,
  ) -> S11Action {
    if self.state != S11State::WaitCreateSessionResponse || !self.seq_matches(seq) {
      return S11Action::None;
    }
    self.pending = None;
    if cause != CAUSE_REQUEST_ACCEPTED {
      self.state = S11State::Terminal;
      return S11Action::NotifyAttachRejected;
    }
    self.sgw_fteid = Some(sgw_fteid);
    self.pgw_fteid = Some(pgw_fteid);
    self.paa = Some(paa);
    self.state = S11State::UlCtx;
    S11Action::NotifyAttachAccepted {
      sgw_fteid,
      pgw_fteid,
      paa,
    }
  }

  /// `modBearer(cb)` in UlCtx.
  pub fn mod_bearer(&mut self, seq: u32, mme_fteid: FTeid, enb_fteid: FTeid) -> S11Action {
    if self.state != S11State::UlCtx {
      return S11Action::None;
    }
    let kind = PendingKind::ModifyBearer { mme_fteid, enb_fteid };
    let action = self.send_for(seq, &kind);
    self.pending = Some(Pending { seq, attempts: 0, kind });
    self.state = S11State::WaitModifyBearerResponse;
    action
  }

  pub fn on_modify_bearer_response(
    &mut self,
    seq: u32,
    ebi_matches: bool,
    fteid_matches: bool,
  ) -> S11Action {
    if self.state != S11State::WaitModifyBearerResponse || !self.seq_matches(seq) {
      return S11Action::None;
    }
    let enb_fteid = match &self.pending {
      Some(Pending {
        kind: PendingKind::ModifyBearer { enb_fteid, .. },
        ..
      }) => Some(*enb_fteid),
      _ => None,
    };
    self.pending = None;
    self.state = S11State::UlCtx;
    if ebi_matches && fteid_matches {
      self.enb_fteid = enb_fteid;
      S11Action::NotifyModifyComplete
    } else {
      S11Action::NotifyModifyFailed
    }
  }

  /// `detach(cb)` from UlCtx.
  pub fn detach(&mut self, seq: u32, ebi: Ebi) -> S11Action {
    if self.state != S11State::UlCtx {
      return S11Action::None;
    }
    let kind = PendingKind::DeleteSession { ebi };
    let action = self.send_for(seq, &kind);
    self.pending = Some(Pending { seq, attempts: 0, kind });
    self.state = S11State::WaitDeleteSessionResponse;
    action
  }

  pub fn on_delete_session_response(&mut self, seq: u32) -> S11Action {
    if self.state != S11State::WaitDeleteSessionResponse || !self.seq_matches(seq) {
      return S11Action::None;
    }
    self.pending = None;
    self.sgw_fteid = None;
    self.state = S11State::Terminal;
    S11Action::NotifyDetachComplete
  }

  /// T3 fired for the currently pending request: resend verbatim, or
  /// declare a path failure once `MAX_RETRANSMISSIONS` is exhausted.
  pub fn on_t3_expiry(&mut self) -> S11Action {
    let Some(pending) = self.pending.as_mut() else {
      return S11Action::None;
    };
    if pending.attempts >= MAX_RETRANSMISSIONS {
      self.pending = None;
      self.state = S11State::Terminal;
      return S11Action::NotifyPathFailure;
    }
    pending.attempts += 1;
    let seq = pending.seq;
    let kind = pending.kind.clone();
    self.send_for(seq, &kind)
  }

  fn seq_matches(&self, seq: u32) -> bool {
    self.pending.as_ref().is_some_and(|p| p.seq == seq)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::Ipv4Addr;
  use mme_types::{InterfaceType, PdnType};

  fn fteid(teid: u32) -> FTeid {
    FTeid {
      interface_type: InterfaceType::S11S4Sgw,
      teid: mme_types::Teid(teid),
      addr: Ipv4Addr::new(10, 0, 0, 1),
    }
  }

  fn paa() -> Paa {
    Paa {
      pdn_type: PdnType::Ipv4,
      ipv4: Ipv4Addr::new(172, 16, 0, 5),
    }
  }

  #[test]
  fn happy_path_attach_modify_detach() {
    let mut s11 = S11UserSession::new();
    let mme = fteid(1);
    let action = s11.attach(1, Imsi(1), mme);
    assert_eq!(s11.state, S11State::WaitCreateSessionResponse);
    assert!(matches!(action, S11Action::SendCreateSessionRequest { seq: 1, .. }));

    let sgw = fteid(2);
    let pgw = fteid(3);
    let action = s11.on_create_session_response(1, CAUSE_REQUEST_ACCEPTED, sgw, pgw, paa());
    assert_eq!(s11.state, S11State::UlCtx);
    assert!(matches!(action, S11Action::NotifyAttachAccepted { .. }));

    let enb = fteid(4);
    s11.mod_bearer(2, mme, enb);
    assert_eq!(s11.state, S11State::WaitModifyBearerResponse);
    let action = s11.on_modify_bearer_response(2, true, true);
    assert_eq!(action, S11Action::NotifyModifyComplete);
    assert_eq!(s11.state, S11State::UlCtx);

    s11.detach(3, Ebi(5));
    assert_eq!(s11.state, S11State::WaitDeleteSessionResponse);
    let action = s11.on_delete_session_response(3);
    assert_eq!(action, S11Action::NotifyDetachComplete);
    assert_eq!(s11.state, S11State::Terminal);
  }

  #[test]
  fn rejected_create_session_is_terminal() {
    let mut s11 = S11UserSession::new();
    s11.attach(1, Imsi(1), fteid(1));
    let action = s11.on_create_session_response(1, 64, fteid(2), fteid(3), paa());
    assert_eq!(action, S11Action::NotifyAttachRejected);
    assert_eq!(s11.state, S11State::Terminal);
  }

  #[test]
  fn retransmits_then_declares_path_failure() {
    let mut s11 = S11UserSession::new();
    s11.attach(7, Imsi(1), fteid(1));
    for _ in 0..MAX_RETRANSMISSIONS {
      let action = s11.on_t3_expiry();
      assert!(matches!(action, S11Action::SendCreateSessionRequest { seq: 7, .. }));
    }
    let action = s11.on_t3_expiry();
    assert_eq!(action, S11Action::NotifyPathFailure);
    assert_eq!(s11.state, S11State::Terminal);
  }

  #[test]
  fn response_with_mismatched_sequence_is_ignored() {
    let mut s11 = S11UserSession::new();
    s11.attach(1, Imsi(1), fteid(1));
    let action = s11.on_create_session_response(99, CAUSE_REQUEST_ACCEPTED, fteid(2), fteid(3), paa());
    assert_eq!(action, S11Action::None);
    assert_eq!(s11.state, S11State::WaitCreateSessionResponse);
  }
}
