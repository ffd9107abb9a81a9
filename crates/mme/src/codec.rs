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

//! Wire-codec seam.
//!
//! The S1AP ASN.1 PER encoding, the GTPv2-C TLV encoding and the Diameter
//! S6a encoding are external collaborators (spec.md §1 Non-goals): this
//! module only names the decoded shapes the rest of the daemon programs
//! against and the trait boundary a real codec plugs into, the same way
//! `mme_s6a::HssClient` is the boundary for the Diameter stack itself.

use mme_nas::PdnConnectivityRequest;
use mme_s1::S1SetupRequest;
use mme_types::{EnbUeS1apId, Ebi, FTeid, Gummei, Imsi, MmeUeS1apId, NasCause, Paa, S1Cause, Tai};
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
  #[error("malformed PDU from {from}: {reason}")]
  Malformed { from: SocketAddr, reason: String },
  #[error("malformed NAS message: {reason}")]
  MalformedNas { reason: String },
}

/// A decoded S1AP PDU, as it would arrive off one eNB association.
#[derive(Debug, Clone)]
pub enum S1apInbound {
  SetupRequest(S1SetupRequest),
  InitialUe {
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
  },
  UeAssociated {
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
  },
  /// eNB accepted `InitialContextSetupRequest` and supplies the radio-side
  /// F-TEID the S11 Modify-Bearer-Request needs (spec.md §4.6).
  InitialContextSetupResponse {
    enb_ue_id: EnbUeS1apId,
    enb_fteid: FTeid,
  },
}

/// An S1AP PDU the daemon wants to send down one eNB association.
#[derive(Debug, Clone)]
pub enum S1apOutbound {
  SetupResponse {
    mme_name: Option<String>,
    served_gummeis: Vec<Gummei>,
    relative_capacity: u8,
  },
  SetupFailure {
    cause: S1Cause,
  },
  ErrorIndication,
  DownlinkNasTransport {
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
  },
  /// Carries Attach Accept plus the bearer/security setup the eNB needs
  /// to establish its radio bearer (spec.md §4.4 step 8).
  InitialContextSetupRequest {
    enb_ue_id: EnbUeS1apId,
    nas_pdu: Vec<u8>,
    ebi: Ebi,
  },
  Paging {
    mme_ue_id: MmeUeS1apId,
  },
}

/// A decoded NAS message, already de-ciphered and integrity-verified by the
/// caller (the security context lives in `mme_security`, not here). The
/// wire-level EMM/ESM information-element layout is an external
/// collaborator exactly like the S1AP/GTPv2-C/Diameter encodings (spec.md §1
/// Non-goals); this enum is the shape the EMM/ESM coordinator in `mme::nas`
/// programs against.
#[derive(Debug, Clone)]
pub enum NasInbound {
  /// `imsi` is the EPS Mobile Identity IE resolved to an IMSI (either
  /// carried directly, or looked up from an old GUTI the codec
  /// recognises) — out of scope here beyond naming the result (spec.md §1
  /// Non-goals).
  AttachRequest {
    imsi: Imsi,
    ue_security_capabilities: Vec<u8>,
    pdn_request: PdnConnectivityRequest,
  },
  AuthenticationResponse {
    res: Vec<u8>,
  },
  SecurityModeComplete,
  AttachComplete,
  EsmInformationResponse {
    ebi: Ebi,
    apn: String,
  },
  TrackingAreaUpdateRequest {
    tai: Tai,
  },
  DetachRequest,
}

/// A NAS message the coordinator wants delivered to the UE. The transport
/// wraps the encoded bytes in a DownlinkNasTransport/InitialContextSetup
/// S1AP PDU and, where the EMM context already has a security context, MACs
/// it via `mme_security::NasSecurityContext::mac_downlink` before sending.
#[derive(Debug, Clone)]
pub enum NasOutbound {
  AuthenticationRequest {
    ksi: u8,
    rand: [u8; 16],
    autn: [u8; 16],
  },
  AuthenticationReject,
  SecurityModeCommand,
  AttachAccept {
    ebi: Ebi,
  },
  EsmInformationRequest {
    ebi: Ebi,
  },
  ActivateDefaultBearer {
    ebi: Ebi,
    paa: Paa,
  },
  EsmStatus,
  TrackingAreaUpdateAccept,
  Detach {
    cause: NasCause,
  },
}

/// Decode/encode boundary for NAS EMM/ESM information elements.
pub trait NasCodec: Send + Sync {
  fn decode(&self, bytes: &[u8]) -> Result<NasInbound, CodecError>;
  fn encode(&self, msg: &NasOutbound) -> Vec<u8>;
}

/// A decoded GTPv2-C message off the S11 socket.
#[derive(Debug, Clone)]
pub enum Gtpv2Inbound {
  CreateSessionResponse {
    seq: u32,
    cause: u8,
    sgw_fteid: FTeid,
    pgw_fteid: FTeid,
    paa: Paa,
  },
  ModifyBearerResponse {
    seq: u32,
    ebi_matches: bool,
    fteid_matches: bool,
  },
  DeleteSessionResponse {
    seq: u32,
  },
}

/// A GTPv2-C message the daemon wants to send to the SGW.
#[derive(Debug, Clone)]
pub enum Gtpv2Outbound {
  CreateSessionRequest {
    seq: u32,
    mme_fteid: FTeid,
    ebi: Ebi,
  },
  ModifyBearerRequest {
    seq: u32,
    mme_fteid: FTeid,
    enb_fteid: FTeid,
  },
  DeleteSessionRequest {
    seq: u32,
    ebi: Ebi,
  },
}

/// Decode/encode boundary for the S1AP transport. A conformant
/// implementation speaks ASN.1 PER over the framing `S1apTransport` hands
/// it; see `mme::s1ap` for how the seam is used.
pub trait S1apCodec: Send + Sync {
  fn decode(&self, from: SocketAddr, bytes: &[u8]) -> Result<S1apInbound, CodecError>;
  fn encode(&self, msg: &S1apOutbound) -> Vec<u8>;
}

/// Decode/encode boundary for the S11 GTPv2-C transport.
pub trait Gtpv2Codec: Send + Sync {
  fn decode(&self, from: SocketAddr, bytes: &[u8]) -> Result<Gtpv2Inbound, CodecError>;
  fn encode(&self, msg: &Gtpv2Outbound) -> Vec<u8>;
}

/// Placeholder codec pair: every decode fails closed with `Malformed`, and
/// every encode produces an empty frame. Wiring in the real ASN.1 PER and
/// GTPv2-C TLV codecs only means swapping these two impls out; nothing
/// upstream of the seam changes.
pub struct UnimplementedCodec;

impl S1apCodec for UnimplementedCodec {
  fn decode(&self, from: SocketAddr, _bytes: &[u8]) -> Result<S1apInbound, CodecError> {
    Err(CodecError::Malformed {
      from,
      reason: "no S1AP codec configured".to_string(),
    })
  }

  fn encode(&self, _msg: &S1apOutbound) -> Vec<u8> {
    Vec::new()
  }
}

impl Gtpv2Codec for UnimplementedCodec {
  fn decode(&self, from: SocketAddr, _bytes: &[u8]) -> Result<Gtpv2Inbound, CodecError> {
    Err(CodecError::Malformed {
      from,
      reason: "no GTPv2-C codec configured".to_string(),
    })
  }

  fn encode(&self, _msg: &Gtpv2Outbound) -> Vec<u8> {
    Vec::new()
  }
}

impl NasCodec for UnimplementedCodec {
  fn decode(&self, _bytes: &[u8]) -> Result<NasInbound, CodecError> {
    Err(CodecError::MalformedNas {
      reason: "no NAS codec configured".to_string(),
    })
  }

  fn encode(&self, _msg: &NasOutbound) -> Vec<u8> {
    Vec::new()
  }
}
