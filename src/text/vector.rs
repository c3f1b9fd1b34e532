//! Sparse feature vectors over a shared vocabulary.

/// A sparse vector stored as `(column, weight)` pairs sorted by column.
///
/// Zero weights are never stored.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Build from arbitrary pairs; columns are sorted and duplicates summed.
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
        pairs.sort_by_key(|&(col, _)| col);
        let mut entries: Vec<(usize, f64)> = Vec::with_capacity(pairs.len());
        for (col, w) in pairs {
            match entries.last_mut() {
                Some((last, acc)) if *last == col => *acc += w,
                _ => entries.push((col, w)),
            }
        }
        entries.retain(|&(_, w)| w != 0.0);
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Dot product via a merge over both sorted column lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        let (a, b) = (&self.entries, &other.entries);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine similarity; 0.0 when either vector is all zeros.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(0.0, 1.0)
    }

    /// Copy scaled to unit length (unchanged if all zeros).
    pub fn normalized(&self) -> SparseVector {
        let n = self.norm();
        if n == 0.0 {
            return self.clone();
        }
        Self {
            entries: self.entries.iter().map(|&(c, w)| (c, w / n)).collect(),
        }
    }

    /// Arithmetic mean of `vectors`.
    pub fn centroid<'a>(vectors: impl IntoIterator<Item = &'a SparseVector>) -> SparseVector {
        let mut pairs = Vec::new();
        let mut count = 0usize;
        for v in vectors {
            pairs.extend_from_slice(&v.entries);
            count += 1;
        }
        if count == 0 {
            return SparseVector::default();
        }
        let mut sum = Self::from_pairs(pairs);
        for (_, w) in &mut sum.entries {
            *w /= count as f64;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_sorts_and_merges() {
        let v = SparseVector::from_pairs(vec![(3, 1.0), (1, 2.0), (3, 0.5), (2, 0.0)]);
        assert_eq!(v.entries(), &[(1, 2.0), (3, 1.5)]);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = SparseVector::from_pairs(vec![(0, 1.0), (2, 1.0)]);
        let b = SparseVector::from_pairs(vec![(1, 1.0)]);
        assert!((a.cosine(&a) - 1.0).abs() < 1e-9);
        assert_eq!(a.cosine(&b), 0.0);
        assert_eq!(a.cosine(&SparseVector::default()), 0.0);
    }

    #[test]
    fn test_centroid() {
        let a = SparseVector::from_pairs(vec![(0, 1.0)]);
        let b = SparseVector::from_pairs(vec![(0, 1.0), (1, 2.0)]);
        let c = SparseVector::centroid([&a, &b]);
        assert_eq!(c.entries(), &[(0, 1.0), (1, 1.0)]);
    }
}
