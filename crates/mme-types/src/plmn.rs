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

//! PLMN / TAI value types and TBCD matching (spec.md §4.10).

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identity (MCC + MNC), held as its 3-octet
/// TBCD-encoded wire representation so matching is a byte-for-byte compare,
/// exactly as spec.md §4.10 describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn(pub [u8; 3]);

impl Plmn {
  /// Build the TBCD-encoded PLMN from decimal MCC/MNC digit strings.
  ///
  /// MNC may be 2 or 3 digits; a 2-digit MNC pads its second TBCD nibble
  /// with `0xF` as TS 24.008 requires.
  pub fn from_digits(mcc: &str, mnc: &str) -> Option<Self> {
    let mcc: Vec<u8> = mcc.bytes().map(|b| b - b'0').collect();
    let mnc: Vec<u8> = mnc.bytes().map(|b| b - b'0').collect();
    if mcc.len() != 3 || !(2..=3).contains(&mnc.len()) {
      return None;
    }
    let mnc3 = mnc.get(2).copied().unwrap_or(0xF);
    Some(Plmn([
      mcc[0] | (mcc[1] << 4),
      mcc[2] | (mnc3 << 4),
      mnc[0] | (mnc[1] << 4),
    ]))
  }
}

/// Tracking Area Identity: PLMN + TAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tai {
  pub plmn: Plmn,
  pub tac: u16,
}

/// A Tracking Area as broadcast by an eNB: the TAC plus every PLMN it serves.
#[derive(Debug, Clone)]
pub struct BroadcastTa {
  pub tac: u16,
  pub plmns: Vec<Plmn>,
}

/// Does any PLMN broadcast in `ta` match any of `served`?
///
/// Per spec.md §4.10: for each PLMN in the TA's broadcast list, for each
/// served GUMMEI's PLMN, compare byte-for-byte; any match accepts the TA.
pub fn ta_matches_served(ta: &BroadcastTa, served: &[Plmn]) -> bool {
  ta.plmns.iter().any(|p| served.contains(p))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tbcd_three_digit_mnc() {
    let p = Plmn::from_digits("310", "410").unwrap();
    assert_eq!(p.0, [0x13, 0x04, 0x01]);
  }

  #[test]
  fn tbcd_two_digit_mnc_pads_filler() {
    let p = Plmn::from_digits("234", "15").unwrap();
    assert_eq!(p.0, [0x32, 0xF4, 0x51]);
  }

  #[test]
  fn ta_match_requires_shared_plmn() {
    let served = vec![Plmn::from_digits("310", "410").unwrap()];
    let ta = BroadcastTa {
      tac: 1,
      plmns: vec![Plmn::from_digits("234", "15").unwrap()],
    };
    assert!(!ta_matches_served(&ta, &served));
    let ta2 = BroadcastTa {
      tac: 2,
      plmns: vec![Plmn::from_digits("310", "410").unwrap()],
    };
    assert!(ta_matches_served(&ta2, &served));
  }
}
