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

//! NAS COUNT reconstruction and acceptance windowing.
//!
//! The wire only ever carries a short form of COUNT: 5 bits for a NAS
//! security-mode short MAC sequence number, 8 bits for the NAS COUNT carried
//! in a signalling message header. The full logical COUNT is reconstructed
//! against the last accepted value.

/// Reconstruct a full COUNT from its `short_bits`-wide wire representation.
///
/// If `received_short` is less than the low `short_bits` of `last_count`,
/// the short counter has wrapped since the last accepted message, so the
/// overflow portion is incremented.
pub fn reconstruct(last_count: u32, received_short: u32, short_bits: u32) -> u32 {
  let modulus = 1u32 << short_bits;
  let last_short = last_count & (modulus - 1);
  let overflow = last_count >> short_bits;
  let overflow = if received_short < last_short {
    overflow.wrapping_add(1)
  } else {
    overflow
  };
  (overflow << short_bits) | received_short
}

/// Does `candidate` fall in the acceptance window around `last_count`?
///
/// Per the replay-protection rule: accept `[last_count - 128, last_count +
/// 32768]`; anything else is a MAC_FAILURE, not a resync.
pub fn in_window(last_count: u32, candidate: u32) -> bool {
  let lower = last_count.saturating_sub(128);
  let upper = last_count.saturating_add(32768);
  (lower..=upper).contains(&candidate)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reconstruct_at_five_bit_boundary() {
    assert_eq!(reconstruct(0x1F, 0x00, 5), 0x20);
  }

  #[test]
  fn reconstruct_at_six_bit_boundary() {
    assert_eq!(reconstruct(0x3F, 0x00, 6), 0x40);
  }

  #[test]
  fn reconstruct_at_eight_bit_boundary() {
    assert_eq!(reconstruct(0xFF, 0x00, 8), 0x100);
  }

  #[test]
  fn reconstruct_at_nine_bit_boundary() {
    assert_eq!(reconstruct(0x1FF, 0x00, 9), 0x200);
  }

  #[test]
  fn reconstruct_without_wrap_keeps_overflow() {
    assert_eq!(reconstruct(0x105, 0x10, 8), 0x110);
  }

  #[test]
  fn window_accepts_recent_and_near_future() {
    assert!(in_window(1000, 900));
    assert!(in_window(1000, 1000 + 32768));
    assert!(!in_window(1000, 1000 - 129));
    assert!(!in_window(1000, 1000 + 32769));
  }
}
