use crate::all::*;

#[derive(Clone, Copy, Debug)]
pub struct DMatch {
  pub train_idx: usize,
  pub distance: u32,
}

// Descriptor matching strategy injected into the tracker. The train corpus
// is accumulated with `add` and wiped with `clear`, matching the usual
// matcher surface of feature matching libraries.
pub trait DescriptorMatcher {
  fn clear(&mut self);
  fn add(&mut self, descriptors: &[Descriptor]);
  // Two nearest train neighbors for every query, in query order. Empty when
  // the corpus holds fewer than two descriptors.
  fn knn2(&self, queries: &[Descriptor]) -> Vec<(DMatch, DMatch)>;
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
  a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[derive(Default)]
pub struct BruteForceMatcher {
  train: Vec<Descriptor>,
}

impl BruteForceMatcher {
  pub fn new() -> BruteForceMatcher {
    BruteForceMatcher { train: vec![] }
  }
}

impl DescriptorMatcher for BruteForceMatcher {
  fn clear(&mut self) {
    self.train.clear();
  }

  fn add(&mut self, descriptors: &[Descriptor]) {
    self.train.extend_from_slice(descriptors);
  }

  fn knn2(&self, queries: &[Descriptor]) -> Vec<(DMatch, DMatch)> {
    if self.train.len() < 2 { return vec![] }
    let mut out = Vec::with_capacity(queries.len());
    for query in queries {
      let mut first = DMatch { train_idx: 0, distance: u32::MAX };
      let mut second = DMatch { train_idx: 0, distance: u32::MAX };
      for (train_idx, train) in self.train.iter().enumerate() {
        let distance = hamming_distance(query, train);
        if distance < first.distance {
          second = first;
          first = DMatch { train_idx, distance };
        }
        else if distance < second.distance {
          second = DMatch { train_idx, distance };
        }
      }
      out.push((first, second));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn descriptor(byte: u8) -> Descriptor {
    [byte; 32]
  }

  #[test]
  fn test_hamming_distance() {
    assert_eq!(hamming_distance(&descriptor(0), &descriptor(0)), 0);
    assert_eq!(hamming_distance(&descriptor(0), &descriptor(0xff)), 256);
    let mut one_bit = descriptor(0);
    one_bit[7] = 0b0001_0000;
    assert_eq!(hamming_distance(&descriptor(0), &one_bit), 1);
  }

  #[test]
  fn test_knn2_orders_neighbors() {
    let mut matcher = BruteForceMatcher::new();
    matcher.add(&[descriptor(0xff), descriptor(0x0f), descriptor(0)]);
    let matches = matcher.knn2(&[descriptor(0)]);
    assert_eq!(matches.len(), 1);
    let (first, second) = matches[0];
    assert_eq!(first.train_idx, 2);
    assert_eq!(first.distance, 0);
    assert_eq!(second.train_idx, 1);
    assert_eq!(second.distance, 128);
  }

  #[test]
  fn test_small_corpus_yields_nothing() {
    let mut matcher = BruteForceMatcher::new();
    matcher.add(&[descriptor(0)]);
    assert!(matcher.knn2(&[descriptor(0)]).is_empty());
  }

  #[test]
  fn test_clear_wipes_corpus() {
    let mut matcher = BruteForceMatcher::new();
    matcher.add(&[descriptor(0), descriptor(1)]);
    assert!(!matcher.knn2(&[descriptor(0)]).is_empty());
    matcher.clear();
    assert!(matcher.knn2(&[descriptor(0)]).is_empty());
  }
}
