//! N-dimensional masked arrays.

use ndarray::{ArrayD, Axis as NdAxis, IxDyn};

use crate::error::{CisError, Result};

/// Values with a parallel mask; `true` in the mask means "missing".
///
/// Both arrays are kept in standard (row-major) layout so flat positions
/// agree with the order of [`MaskedArray::iter`].
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    values: ArrayD<f64>,
    mask: ArrayD<bool>,
}

impl MaskedArray {
    /// Pair values with a mask of the same shape.
    pub fn new(values: ArrayD<f64>, mask: ArrayD<bool>) -> Result<Self> {
        if values.shape() != mask.shape() {
            return Err(CisError::shape_mismatch(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                values.shape()
            )));
        }
        Ok(Self {
            values: values.as_standard_layout().into_owned(),
            mask: mask.as_standard_layout().into_owned(),
        })
    }

    /// Wrap values, masking NaNs.
    pub fn from_values(values: ArrayD<f64>) -> Self {
        let values = values.as_standard_layout().into_owned();
        let mask = values.mapv(f64::is_nan);
        Self { values, mask }
    }

    /// Build from flat row-major vectors. Without a mask, NaNs are masked.
    pub fn from_vec(shape: &[usize], values: Vec<f64>, mask: Option<Vec<bool>>) -> Result<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        match mask {
            Some(mask) => {
                let mask = ArrayD::from_shape_vec(IxDyn(shape), mask)?;
                let mask = ndarray::Zip::from(&mask)
                    .and(&values)
                    .map_collect(|&m, v| m || v.is_nan());
                Self::new(values, mask)
            }
            None => Ok(Self::from_values(values)),
        }
    }

    /// Build from per-point optional values (None is masked).
    pub fn from_options(shape: &[usize], values: &[Option<f64>], fill: f64) -> Result<Self> {
        let data = values.iter().map(|v| v.unwrap_or(fill)).collect();
        let mask = values.iter().map(|v| v.is_none()).collect();
        Self::from_vec(shape, data, Some(mask))
    }

    /// An array where every element is masked.
    pub fn fully_masked(shape: &[usize], fill: f64) -> Self {
        Self {
            values: ArrayD::from_elem(IxDyn(shape), fill),
            mask: ArrayD::from_elem(IxDyn(shape), true),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw values, including the placeholders under masked positions.
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    /// Value at a multi-index, `None` if masked or out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        match self.mask.get(IxDyn(index)) {
            Some(false) => self.values.get(IxDyn(index)).copied(),
            _ => None,
        }
    }

    /// Value at a flat (row-major) position.
    pub fn get_flat(&self, flat: usize) -> Option<f64> {
        if flat >= self.len() {
            return None;
        }
        self.get(&unravel_index(flat, self.shape()))
    }

    pub fn is_masked(&self, index: &[usize]) -> bool {
        self.mask.get(IxDyn(index)).copied().unwrap_or(true)
    }

    /// Set (Some) or mask (None) the element at a multi-index.
    pub fn set(&mut self, index: &[usize], value: Option<f64>) {
        if let (Some(v), Some(m)) = (self.values.get_mut(IxDyn(index)), self.mask.get_mut(IxDyn(index))) {
            match value {
                Some(x) => {
                    *v = x;
                    *m = false;
                }
                None => *m = true,
            }
        }
    }

    /// Iterate in row-major order, yielding `None` for masked elements.
    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values
            .iter()
            .zip(self.mask.iter())
            .map(|(&v, &m)| if m { None } else { Some(v) })
    }

    /// Number of unmasked elements.
    pub fn count_valid(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    /// Unmasked values in row-major order.
    pub fn compressed(&self) -> Vec<f64> {
        self.iter().flatten().collect()
    }

    /// Values with masked positions replaced by `fill`.
    pub fn filled(&self, fill: f64) -> ArrayD<f64> {
        ndarray::Zip::from(&self.values)
            .and(&self.mask)
            .map_collect(|&v, &m| if m { fill } else { v })
    }

    /// Keep the given positions along one axis, in order.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Self {
        Self {
            values: self.values.select(NdAxis(axis), indices),
            mask: self.mask.select(NdAxis(axis), indices),
        }
    }

    /// The same elements as a one-dimensional array.
    pub fn flattened(&self) -> Self {
        let n = self.len();
        Self {
            values: ArrayD::from_shape_vec(IxDyn(&[n]), self.values.iter().copied().collect())
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
            mask: ArrayD::from_shape_vec(IxDyn(&[n]), self.mask.iter().copied().collect())
                .unwrap_or_else(|_| ArrayD::from_elem(IxDyn(&[0]), true)),
        }
    }
}

/// Convert a flat row-major position into a multi-index.
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (slot, &len) in index.iter_mut().zip(shape).rev() {
        if len == 0 {
            continue;
        }
        *slot = flat % len;
        flat /= len;
    }
    index
}

/// Convert a multi-index into a flat row-major position.
pub fn ravel_index(index: &[usize], shape: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |acc, (&i, &len)| acc * len + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_masked() {
        let a = MaskedArray::from_vec(&[3], vec![1.0, f64::NAN, 3.0], None).unwrap();
        assert_eq!(a.count_valid(), 2);
        assert_eq!(a.compressed(), vec![1.0, 3.0]);
        assert_eq!(a.get(&[1]), None);
    }

    #[test]
    fn test_explicit_mask() {
        let a = MaskedArray::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], Some(vec![false, true, false, false]))
            .unwrap();
        assert_eq!(a.get(&[0, 1]), None);
        assert_eq!(a.get(&[1, 0]), Some(3.0));
        assert_eq!(a.get_flat(3), Some(4.0));
        assert_eq!(a.filled(-1.0).iter().copied().collect::<Vec<_>>(), vec![1.0, -1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(MaskedArray::from_vec(&[2, 2], vec![1.0, 2.0, 3.0], None).is_err());
    }

    #[test]
    fn test_set_and_select() {
        let mut a = MaskedArray::fully_masked(&[2, 3], -999.0);
        a.set(&[1, 2], Some(5.0));
        assert_eq!(a.get(&[1, 2]), Some(5.0));
        let s = a.select(1, &[2]);
        assert_eq!(s.shape(), &[2, 1]);
        assert_eq!(s.get(&[1, 0]), Some(5.0));
        a.set(&[1, 2], None);
        assert!(a.is_masked(&[1, 2]));
    }

    #[test]
    fn test_ravel_unravel() {
        let shape = [2, 3, 4];
        for flat in 0..24 {
            let idx = unravel_index(flat, &shape);
            assert_eq!(ravel_index(&idx, &shape), flat);
        }
        assert_eq!(unravel_index(23, &shape), vec![1, 2, 3]);
        assert_eq!(unravel_index(0, &[]), Vec::<usize>::new());
    }
}
