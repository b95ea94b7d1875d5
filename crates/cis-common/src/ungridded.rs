//! Ungridded data: values at scattered points with parallel coordinate arrays.

use crate::coord::{Axis, Coord};
use crate::error::{CisError, Result};
use crate::hyperpoint::HyperPoint;
use crate::masked::MaskedArray;
use crate::metadata::Metadata;

/// A variable sampled at arbitrary points (aircraft tracks, swaths, stations).
///
/// Data and coordinates are stored flat; `original_shape` remembers the
/// reader's layout (e.g. a swath's scanline × pixel shape).
#[derive(Debug, Clone, PartialEq)]
pub struct UngriddedData {
    pub metadata: Metadata,
    pub filenames: Vec<String>,
    data: MaskedArray,
    coords: Vec<Coord>,
    original_shape: Vec<usize>,
}

impl UngriddedData {
    /// Create an ungridded variable. Data and every coordinate must hold the
    /// same number of elements; each axis role may appear at most once.
    pub fn new(data: MaskedArray, metadata: Metadata, coords: Vec<Coord>) -> Result<Self> {
        let n = data.len();
        let original_shape = data.shape().to_vec();
        let mut flat_coords: Vec<Coord> = Vec::with_capacity(coords.len());

        for coord in coords {
            if coord.len() != n {
                return Err(CisError::shape_mismatch(format!(
                    "coordinate '{}' has {} points but '{}' has {}",
                    coord.name(),
                    coord.len(),
                    metadata.name,
                    n
                )));
            }
            if let Some(axis) = coord.axis {
                if flat_coords.iter().any(|c| c.axis == Some(axis)) {
                    return Err(CisError::InvalidInput(format!(
                        "'{}' has more than one coordinate for axis {}",
                        metadata.name, axis
                    )));
                }
            }
            flat_coords.push(coord.flattened());
        }

        Ok(Self {
            metadata,
            filenames: Vec::new(),
            data: data.flattened(),
            coords: flat_coords,
            original_shape,
        })
    }

    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn data(&self) -> &MaskedArray {
        &self.data
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn coord(&self, axis: Axis) -> Option<&Coord> {
        self.coords.iter().find(|c| c.axis == Some(axis))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn original_shape(&self) -> &[usize] {
        &self.original_shape
    }

    /// A new variable on the same coordinates.
    pub fn with_same_coords(&self, data: MaskedArray, metadata: Metadata) -> Result<Self> {
        let mut out = Self::new(data, metadata, self.coords.clone())?;
        out.original_shape = self.original_shape.clone();
        out.filenames = self.filenames.clone();
        Ok(out)
    }

    /// Point `i`; masked if its value is masked or any coordinate is NaN.
    pub fn point_at(&self, i: usize) -> HyperPoint {
        let mut point = HyperPoint::default();
        let mut bad_coord = false;
        for coord in &self.coords {
            if let Some(axis) = coord.axis {
                let v = coord.values()[i];
                bad_coord |= v.is_nan();
                point.set(axis, Some(v));
            }
        }
        point.val = self.data.get(&[i]);
        point.masked = bad_coord || point.val.is_none();
        point
    }

    /// Every point, in storage order.
    pub fn hyper_points(&self) -> Vec<HyperPoint> {
        (0..self.len()).map(|i| self.point_at(i)).collect()
    }

    /// A sub-container holding the given points, in the given order.
    pub fn subset_indices(&self, indices: &[usize]) -> Result<Self> {
        let data = self.data.select(0, indices);
        let coords = self.coords.iter().map(|c| c.select(indices)).collect();
        let mut out = Self::new(data, self.metadata.clone(), coords)?;
        out.filenames = self.filenames.clone();
        Ok(out)
    }

    /// Wrap longitudes into the window starting at `range_start`.
    pub fn set_longitude_range(&mut self, range_start: f64) {
        for coord in &mut self.coords {
            if coord.axis == Some(Axis::X) {
                coord.set_longitude_range(range_start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> UngriddedData {
        let lat = Coord::new(vec![0.0, 1.0, 2.0], Metadata::new("lat"), Some(Axis::Y));
        let lon = Coord::new(vec![10.0, f64::NAN, 12.0], Metadata::new("lon"), Some(Axis::X));
        let data = MaskedArray::from_vec(&[3], vec![1.0, 2.0, 3.0], None).unwrap();
        UngriddedData::new(data, Metadata::new("aod"), vec![lat, lon]).unwrap()
    }

    #[test]
    fn test_lengths_checked() {
        let lat = Coord::new(vec![0.0, 1.0], Metadata::new("lat"), Some(Axis::Y));
        let data = MaskedArray::from_vec(&[3], vec![1.0, 2.0, 3.0], None).unwrap();
        assert!(UngriddedData::new(data, Metadata::new("aod"), vec![lat]).is_err());
    }

    #[test]
    fn test_duplicate_axis_rejected() {
        let a = Coord::new(vec![0.0], Metadata::new("lat"), Some(Axis::Y));
        let b = Coord::new(vec![0.0], Metadata::new("latitude"), Some(Axis::Y));
        let data = MaskedArray::from_vec(&[1], vec![1.0], None).unwrap();
        assert!(UngriddedData::new(data, Metadata::new("aod"), vec![a, b]).is_err());
    }

    #[test]
    fn test_nan_coordinate_masks_point() {
        let points = track().hyper_points();
        assert!(!points[0].masked);
        assert!(points[1].masked);
        assert_eq!(points[2].val, Some(3.0));
    }

    #[test]
    fn test_flat_compatible_shapes() {
        let lat = Coord::with_shape(vec![0.0, 1.0, 2.0, 3.0], vec![2, 2], Metadata::new("lat"), Some(Axis::Y))
            .unwrap();
        let data = MaskedArray::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], None).unwrap();
        let u = UngriddedData::new(data, Metadata::new("swath"), vec![lat]).unwrap();
        assert_eq!(u.len(), 4);
        assert_eq!(u.original_shape(), &[2, 2]);
        assert_eq!(u.coord(Axis::Y).unwrap().shape(), &[4]);
    }

    #[test]
    fn test_subset_indices() {
        let sub = track().subset_indices(&[2, 0]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.point_at(0).val, Some(3.0));
        assert_eq!(sub.point_at(1).lat, Some(0.0));
    }
}
