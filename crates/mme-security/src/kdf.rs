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

//! 3GPP TS 33.401 Annex A key derivation function: HMAC-SHA-256 over a
//! function-code-tagged input string, keyed by K_ASME (or, for NH, by
//! K_ASME again with the previous NH as part of the input).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Function code distinguishing K_eNB derivation (TS 33.401 Annex A.3).
const FC_KENB: u8 = 0x11;
/// Function code for NAS algorithm key derivation (TS 33.401 Annex A.7).
const FC_NAS_ALGO: u8 = 0x15;
/// Function code for NH derivation (TS 33.401 Annex A.4).
const FC_NH: u8 = 0x12;

/// NAS algorithm distinguisher (TS 33.401 Annex A.7, Table A.7-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasAlgDistinguisher {
  NasEncAlg,
  NasIntAlg,
}

impl NasAlgDistinguisher {
  fn code(self) -> u8 {
    match self {
      NasAlgDistinguisher::NasEncAlg => 0x01,
      NasAlgDistinguisher::NasIntAlg => 0x02,
    }
  }
}

/// EIA2/EEA2 algorithm type identifier, TS 33.401 Annex B.
pub const ALGORITHM_EIA2: u8 = 2;

fn kdf(key: &[u8; 32], s: &[u8]) -> [u8; 32] {
  let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
  mac.update(s);
  let out = mac.finalize().into_bytes();
  let mut result = [0u8; 32];
  result.copy_from_slice(&out);
  result
}

fn param(fc: u8, parts: &[&[u8]]) -> Vec<u8> {
  let mut s = vec![fc];
  for p in parts {
    s.extend_from_slice(p);
    let len = (p.len() as u16).to_be_bytes();
    s.extend_from_slice(&len);
  }
  s
}

/// K_eNB = KDF(K_ASME, FC(0x11) || UplinkNASCount || L0).
pub fn derive_k_enb(k_asme: &[u8; 32], uplink_nas_count: u32) -> [u8; 32] {
  let s = param(FC_KENB, &[&uplink_nas_count.to_be_bytes()]);
  kdf(k_asme, &s)
}

/// NH[0] = K_eNB (TS 33.401 §7.2.9.3); NH[i+1] = KDF(K_ASME, FC(0x12) || NH[i]).
pub fn derive_next_nh(k_asme: &[u8; 32], previous_nh: &[u8; 32]) -> [u8; 32] {
  let s = param(FC_NH, &[previous_nh]);
  kdf(k_asme, &s)
}

/// K_NAS_enc / K_NAS_int = KDF(K_ASME, FC(0x15) || alg-distinguisher || alg-id);
/// the low 128 bits of the 256-bit KDF output are the usable AES-128 key.
pub fn derive_nas_key(
  k_asme: &[u8; 32],
  distinguisher: NasAlgDistinguisher,
  algorithm_id: u8,
) -> [u8; 16] {
  let s = param(FC_NAS_ALGO, &[&[distinguisher.code()], &[algorithm_id]]);
  let full = kdf(k_asme, &s);
  let mut key = [0u8; 16];
  key.copy_from_slice(&full[16..32]);
  key
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kenb_derivation_is_deterministic() {
    let k_asme = [0x42u8; 32];
    let a = derive_k_enb(&k_asme, 7);
    let b = derive_k_enb(&k_asme, 7);
    assert_eq!(a, b);
    let c = derive_k_enb(&k_asme, 8);
    assert_ne!(a, c);
  }

  #[test]
  fn nas_keys_differ_by_distinguisher() {
    let k_asme = [0x11u8; 32];
    let enc = derive_nas_key(&k_asme, NasAlgDistinguisher::NasEncAlg, ALGORITHM_EIA2);
    let int = derive_nas_key(&k_asme, NasAlgDistinguisher::NasIntAlg, ALGORITHM_EIA2);
    assert_ne!(enc, int);
  }

  #[test]
  fn nh_chain_advances() {
    let k_asme = [0x99u8; 32];
    let nh0 = derive_k_enb(&k_asme, 0);
    let nh1 = derive_next_nh(&k_asme, &nh0);
    let nh2 = derive_next_nh(&k_asme, &nh1);
    assert_ne!(nh0, nh1);
    assert_ne!(nh1, nh2);
  }
}
