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

//! 128-EIA2: AES-128-CMAC over
//! `COUNT(32b) || BEARER(5b) || DIRECTION(1b) || 0^26 || MESSAGE`,
//! truncated to the leading 32 bits (TS 33.401 Annex B.2.3, TS 35.221).
//!
//! `MESSAGE` is a bit string, not necessarily byte-aligned (NAS MACs always
//! cover whole octets in practice, but the published conformance vectors use
//! odd bit lengths, so the bit-level CMAC padding is implemented exactly).

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

struct BitWriter {
  bytes: Vec<u8>,
  bit_len: usize,
}

impl BitWriter {
  fn new() -> Self {
    Self {
      bytes: Vec::new(),
      bit_len: 0,
    }
  }

  fn ensure_capacity(&mut self, extra_bits: usize) {
    let needed = (self.bit_len + extra_bits + 7) / 8;
    if needed > self.bytes.len() {
      self.bytes.resize(needed, 0);
    }
  }

  /// Write the low `n` bits of `value`, most-significant bit first.
  fn write_bits(&mut self, value: u32, n: usize) {
    self.ensure_capacity(n);
    for i in (0..n).rev() {
      let bit = (value >> i) & 1;
      let pos = self.bit_len;
      let byte_idx = pos / 8;
      let shift = 7 - (pos % 8);
      if bit == 1 {
        self.bytes[byte_idx] |= 1 << shift;
      }
      self.bit_len += 1;
    }
  }

  /// Append the first `n` bits of `data`, most-significant bit first.
  fn write_message(&mut self, data: &[u8], n: usize) {
    self.ensure_capacity(n);
    for i in 0..n {
      let byte_idx = i / 8;
      let shift = 7 - (i % 8);
      let bit = (data.get(byte_idx).copied().unwrap_or(0) >> shift) & 1;
      let pos = self.bit_len;
      let out_idx = pos / 8;
      let out_shift = 7 - (pos % 8);
      if bit == 1 {
        self.bytes[out_idx] |= 1 << out_shift;
      }
      self.bit_len += 1;
    }
  }
}

fn aes_encrypt_block(key: &[u8; 16], block: [u8; 16]) -> [u8; 16] {
  let cipher = Aes128::new(GenericArray::from_slice(key));
  let mut ga = GenericArray::clone_from_slice(&block);
  cipher.encrypt_block(&mut ga);
  let mut out = [0u8; 16];
  out.copy_from_slice(&ga);
  out
}

fn gf_double(input: [u8; 16]) -> [u8; 16] {
  let msb_set = input[0] & 0x80 != 0;
  let mut out = [0u8; 16];
  let mut carry = 0u8;
  for i in (0..16).rev() {
    out[i] = (input[i] << 1) | carry;
    carry = (input[i] & 0x80) >> 7;
  }
  if msb_set {
    out[15] ^= 0x87;
  }
  out
}

fn subkeys(key: &[u8; 16]) -> ([u8; 16], [u8; 16]) {
  let l = aes_encrypt_block(key, [0u8; 16]);
  let k1 = gf_double(l);
  let k2 = gf_double(k1);
  (k1, k2)
}

fn xor16(a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
  let mut out = [0u8; 16];
  for i in 0..16 {
    out[i] = a[i] ^ b[i];
  }
  out
}

/// AES-128-CMAC over a bit string of length `bit_len`, per NIST SP 800-38B,
/// with the final-block padding applied at the exact bit boundary.
fn cmac_bits(key: &[u8; 16], data: &[u8], bit_len: usize) -> [u8; 16] {
  let (k1, k2) = subkeys(key);

  if bit_len == 0 {
    let mut padded = [0u8; 16];
    padded[0] = 0x80;
    return aes_encrypt_block(key, xor16(padded, k2));
  }

  let num_blocks = (bit_len + 127) / 128;
  let complete_last = bit_len % 128 == 0;

  let mut x = [0u8; 16];
  for block_idx in 0..num_blocks {
    let start_bit = block_idx * 128;
    let mut block = [0u8; 16];
    let is_last = block_idx == num_blocks - 1;
    if is_last && !complete_last {
      let remainder = bit_len - start_bit;
      let start_byte = start_bit / 8;
      let end_byte = (bit_len + 7) / 8;
      let copy_len = end_byte - start_byte;
      block[..copy_len].copy_from_slice(&data[start_byte..end_byte]);
      let bit_in_block = remainder;
      let byte_idx = bit_in_block / 8;
      let shift = 7 - (bit_in_block % 8);
      block[byte_idx] |= 1 << shift;
      block = xor16(block, k2);
    } else {
      let start_byte = start_bit / 8;
      block.copy_from_slice(&data[start_byte..start_byte + 16]);
      if is_last {
        block = xor16(block, k1);
      }
    }
    x = aes_encrypt_block(key, xor16(x, block));
  }
  x
}

/// Compute the 32-bit MAC-I for a NAS or S1AP security-mode message.
///
/// `message` holds `message_bit_len` significant bits, MSB-first, zero
/// padded out to a whole number of bytes.
pub fn compute_mac(
  key: &[u8; 16],
  count: u32,
  bearer: u8,
  direction: u8,
  message: &[u8],
  message_bit_len: usize,
) -> u32 {
  let mut w = BitWriter::new();
  w.write_bits(count, 32);
  w.write_bits(bearer as u32, 5);
  w.write_bits(direction as u32, 1);
  w.write_bits(0, 26);
  w.write_message(message, message_bit_len);

  let t = cmac_bits(key, &w.bytes, w.bit_len);
  u32::from_be_bytes([t[0], t[1], t[2], t[3]])
}

/// Plain AES-128-CMAC over a byte-aligned message (used to validate the
/// underlying primitive against the NIST SP 800-38B known-answer vectors).
pub fn cmac(key: &[u8; 16], message: &[u8]) -> [u8; 16] {
  cmac_bits(key, message, message.len() * 8)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
      .step_by(2)
      .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
      .collect()
  }

  /// NIST SP 800-38B AES-128-CMAC known-answer vector (single full block).
  #[test]
  fn cmac_kat_single_block() {
    let key: [u8; 16] = hex("2b7e151628aed2a6abf7158809cf4f3c")
      .try_into()
      .unwrap();
    let m = hex("6bc1bee22e409f96e93d7e117393172a");
    let t = cmac(&key, &m);
    assert_eq!(&t[..4], &hex("070a16b4")[..]);
  }

  /// NIST SP 800-38B AES-128-CMAC known-answer vector (empty message).
  #[test]
  fn cmac_kat_empty_message() {
    let key: [u8; 16] = hex("2b7e151628aed2a6abf7158809cf4f3c")
      .try_into()
      .unwrap();
    let t = cmac(&key, &[]);
    assert_eq!(&t[..4], &hex("bb1d6929")[..]);
  }

  /// 128-EIA2 conformance Test Set 1 (3GPP TS 35.221 / TS 33.401 Annex C).
  #[test]
  fn eia2_test_set_1() {
    let key: [u8; 16] = hex("2bd6459f82c5b300952c49104881ff48")
      .try_into()
      .unwrap();
    let count = 0x38A6F056u32;
    let bearer = 0x18u8;
    let direction = 0u8;
    let msg = hex("3332346263393840");
    let mac = compute_mac(&key, count, bearer, direction, &msg, 58);
    assert_eq!(mac, 0x118C6EB8);
  }

  /// 128-EIA2 conformance Test Set 6 (3GPP TS 35.221 / TS 33.401 Annex C).
  #[test]
  fn eia2_test_set_6() {
    let key: [u8; 16] = hex("6832a65cff4473621ebdd4ba26a921fe")
      .try_into()
      .unwrap();
    let count = 0x36AF6144u32;
    let bearer = 0x18u8;
    let direction = 0u8;
    let msg = hex(
      "d3c53839626820717765667620323837636240981ba6824c1bfb1ab485472029b71d808ce33e2cc3c0b5fc1f3de8a6dc",
    );
    let mac = compute_mac(&key, count, bearer, direction, &msg, 383);
    assert_eq!(mac, 0xF0668C1E);
  }
}
