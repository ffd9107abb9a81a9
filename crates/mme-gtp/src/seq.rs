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

//! GTPv2-C sequence numbers: 24-bit, wrapping (spec.md §4.6).

const MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Default)]
pub struct SeqAllocator {
  next: u32,
}

impl SeqAllocator {
  pub fn new() -> Self {
    Self { next: 0 }
  }

  pub fn next(&mut self) -> u32 {
    let seq = self.next;
    self.next = (self.next + 1) & MASK;
    seq
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wraps_at_24_bits() {
    let mut a = SeqAllocator { next: MASK };
    assert_eq!(a.next(), MASK);
    assert_eq!(a.next(), 0);
  }
}
