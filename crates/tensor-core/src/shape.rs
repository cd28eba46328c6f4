// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors.
//!
//! Two flavours exist:
//!
//! ```text
//!   SymbolicShape  [-1, 4]     declared in the container, -1 = unknown
//!        │
//!        │  resolve with caller input shapes / shape inference
//!        ▼
//!   TensorShape    [1, 4]      fully concrete, used as cache key
//! ```

use std::fmt;

use crate::TensorError;

/// Marker value for a dimension whose size is not yet known.
pub const UNKNOWN_DIM: i64 = -1;

/// A fully concrete tensor shape.
///
/// Concrete shapes are the cache key of the shaped-model tier, so equality
/// and hashing are elementwise over the dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TensorShape {
    dims: Vec<u32>,
}

impl TensorShape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::TensorShape;
    /// let s = TensorShape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), Some(24));
    /// ```
    pub fn new(dims: Vec<u32>) -> Self {
        Self { dims }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    /// Returns the total number of elements (1 for a rank-0 shape), or
    /// `None` if the count does not fit in a `u64`.
    pub fn num_elements(&self) -> Option<u64> {
        self.dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(u64::from(d)))
    }

    /// Computes the byte footprint for the given element size, or `None`
    /// on overflow.
    pub fn size_bytes(&self, element_size: usize) -> Option<u64> {
        self.num_elements()?.checked_mul(element_size as u64)
    }

    /// Parses a shape written as `1x4x8` (as accepted on the command line).
    pub fn parse(text: &str) -> Result<Self, TensorError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }
        let dims = text
            .split(['x', 'X', ','])
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| TensorError::InvalidShape(text.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dims })
    }

    /// Returns the symbolic form of this shape.
    pub fn to_symbolic(&self) -> SymbolicShape {
        SymbolicShape::new(self.dims.iter().map(|&d| i64::from(d)).collect())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dims(f, self.dims.iter())
    }
}

impl From<Vec<u32>> for TensorShape {
    fn from(dims: Vec<u32>) -> Self {
        Self::new(dims)
    }
}

impl From<&[u32]> for TensorShape {
    fn from(dims: &[u32]) -> Self {
        Self::new(dims.to_vec())
    }
}

/// A shape as declared by the model, where some dimensions may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SymbolicShape {
    dims: Vec<i64>,
}

impl SymbolicShape {
    /// Creates a symbolic shape, normalising every non-positive dimension
    /// to [`UNKNOWN_DIM`].
    pub fn new(dims: Vec<i64>) -> Self {
        let dims = dims
            .into_iter()
            .map(|d| if d <= 0 { UNKNOWN_DIM } else { d })
            .collect();
        Self { dims }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Returns `true` when no dimension is unknown.
    pub fn is_concrete(&self) -> bool {
        self.dims.iter().all(|&d| d != UNKNOWN_DIM)
    }

    /// Converts to a concrete shape, or `None` if any dimension is unknown
    /// or does not fit a `u32`.
    pub fn to_concrete(&self) -> Option<TensorShape> {
        self.dims
            .iter()
            .map(|&d| u32::try_from(d).ok())
            .collect::<Option<Vec<_>>>()
            .map(TensorShape::new)
    }

    /// Returns `true` if `concrete` can stand in for this declared shape:
    /// same rank, and every fixed dimension matches exactly.
    pub fn accepts(&self, concrete: &TensorShape) -> bool {
        self.rank() == concrete.rank()
            && self
                .dims
                .iter()
                .zip(concrete.dims())
                .all(|(&declared, &actual)| declared == UNKNOWN_DIM || declared == i64::from(actual))
    }
}

impl fmt::Display for SymbolicShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if *d == UNKNOWN_DIM {
                write!(f, "?")?;
            } else {
                write!(f, "{d}")?;
            }
        }
        write!(f, "]")
    }
}

impl From<Vec<i64>> for SymbolicShape {
    fn from(dims: Vec<i64>) -> Self {
        Self::new(dims)
    }
}

fn write_dims<T: fmt::Display>(f: &mut fmt::Formatter<'_>, dims: impl Iterator<Item = T>) -> fmt::Result {
    write!(f, "[")?;
    for (i, d) in dims.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{d}")?;
    }
    write!(f, "]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = TensorShape::default();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), Some(1));
    }

    #[test]
    fn test_size_bytes() {
        let s = TensorShape::new(vec![10, 20]);
        assert_eq!(s.size_bytes(4), Some(800));
        assert_eq!(s.size_bytes(1), Some(200));
        assert_eq!(s.size_bytes(0), Some(0));
    }

    #[test]
    fn test_size_bytes_overflow() {
        let s = TensorShape::new(vec![65536; 4]);
        assert_eq!(s.num_elements(), None);
        assert_eq!(s.size_bytes(4), None);

        // Fits as an element count, overflows once scaled to bytes.
        let s = TensorShape::new(vec![u32::MAX, u32::MAX]);
        assert!(s.num_elements().is_some());
        assert_eq!(s.size_bytes(4), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(TensorShape::parse("1x4").unwrap().dims(), &[1, 4]);
        assert_eq!(TensorShape::parse("2,3,5").unwrap().dims(), &[2, 3, 5]);
        assert_eq!(TensorShape::parse("").unwrap().rank(), 0);
        assert!(matches!(
            TensorShape::parse("1xfoo"),
            Err(TensorError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_symbolic_normalises_non_positive() {
        let s = SymbolicShape::new(vec![0, 4, -7]);
        assert_eq!(s.dims(), &[-1, 4, -1]);
        assert!(!s.is_concrete());
        assert_eq!(s.to_concrete(), None);
    }

    #[test]
    fn test_symbolic_to_concrete() {
        let s = SymbolicShape::new(vec![1, 4]);
        assert!(s.is_concrete());
        assert_eq!(s.to_concrete(), Some(TensorShape::new(vec![1, 4])));
    }

    #[test]
    fn test_accepts() {
        let declared = SymbolicShape::new(vec![-1, 4]);
        assert!(declared.accepts(&TensorShape::new(vec![1, 4])));
        assert!(declared.accepts(&TensorShape::new(vec![8, 4])));
        assert!(!declared.accepts(&TensorShape::new(vec![1, 5])));
        assert!(!declared.accepts(&TensorShape::new(vec![1, 4, 1])));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TensorShape::new(vec![2, 3, 4])), "[2, 3, 4]");
        assert_eq!(format!("{}", SymbolicShape::new(vec![-1, 4])), "[?, 4]");
    }

    #[test]
    fn test_hash_key_equality() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(vec![TensorShape::new(vec![1, 4])], "a");
        assert_eq!(map.get(&vec![TensorShape::from(vec![1, 4])]), Some(&"a"));
        assert_eq!(map.get(&vec![TensorShape::from(vec![2, 4])]), None);
    }
}
