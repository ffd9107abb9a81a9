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

//! Shared identifiers and value types for the MME control plane.
//!
//! These are the types that cross component boundaries: eNB/UE identifiers,
//! PLMN/TAI values, EPS bearer identities and the NAS cause codes carried on
//! the wire. Nothing here knows how to encode/decode a PDU — that is the
//! codec suite's job (out of scope, see spec.md §1).

use serde::{Deserialize, Serialize};

pub mod plmn;
pub use plmn::{BroadcastTa, Plmn, Tai};

/// Maximum number of concurrently registered UEs (spec.md §4.8).
pub const MAX_UE: u32 = 1 << 20;

/// MME-local UE identifier, unique while the UE has an ECM/EMM context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MmeUeS1apId(pub u32);

/// eNB-local UE identifier, opaque to the MME beyond echoing it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnbUeS1apId(pub u32);

/// Temporary identifier for idle-mode reachability (the "local" part of a GUTI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MTmsi(pub u32);

/// Permanent subscriber identity, stored as its decimal digit string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Imsi(pub u64);

impl std::fmt::Display for Imsi {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Globally Unique MME Identifier = PLMN + MME Group ID + MME Code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gummei {
  pub plmn: Plmn,
  pub mme_group_id: u16,
  pub mme_code: u8,
}

/// GUTI = GUMMEI + M-TMSI, as assigned to a UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guti {
  pub gummei: Gummei,
  pub m_tmsi: MTmsi,
}

/// Globally unique eNB identifier: PLMN + eNB identifier value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalEnbId {
  pub plmn: Plmn,
  pub enb_id: u32,
}

/// EPS Bearer Identity, valid range [5, 15] for dedicated/default bearers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ebi(pub u8);

impl Ebi {
  pub const MIN: u8 = 5;
  pub const MAX: u8 = 15;

  pub fn is_valid(self) -> bool {
    (Self::MIN..=Self::MAX).contains(&self.0)
  }
}

/// GTPv2-C Tunnel Endpoint Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Teid(pub u32);

/// Fully-Qualified TEID: interface type + IP + TEID, as carried in GTPv2-C IEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FTeid {
  pub interface_type: InterfaceType,
  pub teid: Teid,
  pub addr: std::net::Ipv4Addr,
}

/// GTPv2-C F-TEID interface type values relevant to the S11/S5/S8 paths we use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceType {
  S1uEnodeB,
  S1uSgw,
  S11Mme,
  S11S4Sgw,
  S5S8SgwGtpC,
  S5S8PgwGtpC,
  S5S8SgwGtpU,
  S5S8PgwGtpU,
}

/// PDN Address Allocation: the UE's assigned IP (IPv4-only, per Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Paa {
  pub pdn_type: PdnType,
  pub ipv4: std::net::Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdnType {
  Ipv4,
}

/// NAS cause codes, TS 24.301 §9.9.3.9 (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasCause {
  ImsiUnknownInHss = 2,
  IllegalUe = 6,
  EpsServicesNotAllowed = 7,
  NetworkFailure = 17,
  MacFailure = 20,
  SynchFailure = 21,
  EsmFailure = 19,
  CongestionOverload = 22,
}

/// S1AP non-UE-associated cause used in `S1SetupFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S1Cause {
  UnknownPlmn,
  SemanticError,
  Overload,
}
