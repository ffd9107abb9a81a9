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

//! Per-UE authentication-vector queue (spec.md §3, §4.4 step 2): vectors
//! are fetched in a batch and consumed one per authentication run.

use crate::vector::AuthVector;
use std::collections::VecDeque;

/// Vectors requested per Authentication-Information-Request when the queue
/// runs dry.
pub const REQUESTED_VECTOR_COUNT: u32 = 3;

#[derive(Debug, Default)]
pub struct AuthVectorQueue {
  vectors: VecDeque<AuthVector>,
}

impl AuthVectorQueue {
  pub fn new() -> Self {
    Self {
      vectors: VecDeque::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.vectors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.vectors.len()
  }

  pub fn extend(&mut self, vectors: impl IntoIterator<Item = AuthVector>) {
    self.vectors.extend(vectors);
  }

  /// Pop the head vector for use in an Authentication Request, without
  /// removing it — it stays reserved until the matching Authentication
  /// Response confirms RES == XRES (spec.md §4.4 step 4: "pop queue" only
  /// happens on a verified match).
  pub fn peek(&self) -> Option<&AuthVector> {
    self.vectors.front()
  }

  pub fn pop_confirmed(&mut self) -> Option<AuthVector> {
    self.vectors.pop_front()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vector(seed: u8) -> AuthVector {
    AuthVector {
      rand: [seed; 16],
      autn: [seed; 16],
      xres: vec![seed; 8],
      k_asme: [seed; 32],
    }
  }

  #[test]
  fn fifo_order() {
    let mut q = AuthVectorQueue::new();
    q.extend([vector(1), vector(2), vector(3)]);
    assert_eq!(q.peek(), Some(&vector(1)));
    assert_eq!(q.pop_confirmed(), Some(vector(1)));
    assert_eq!(q.pop_confirmed(), Some(vector(2)));
    assert_eq!(q.len(), 1);
  }
}
