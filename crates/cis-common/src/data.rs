//! The capability set shared by gridded and ungridded containers.

use crate::coord::{Axis, Coord};
use crate::error::{CisError, Result};
use crate::gridded::GriddedData;
use crate::hyperpoint::HyperPoint;
use crate::masked::MaskedArray;
use crate::metadata::Metadata;
use crate::ungridded::UngriddedData;

/// Operations every data container supports.
pub trait CommonData {
    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// All coordinates (for gridded data: dimension coordinates first).
    fn coords(&self) -> Vec<&Coord>;

    /// The coordinate with the given role.
    fn coord(&self, axis: Axis) -> Result<&Coord> {
        self.coords()
            .into_iter()
            .find(|c| c.axis == Some(axis))
            .ok_or_else(|| {
                CisError::coordinate_not_found(format!(
                    "no {} coordinate in '{}' ({})",
                    axis,
                    self.name(),
                    self.filenames().join(", ")
                ))
            })
    }

    fn has_axis(&self, axis: Axis) -> bool {
        self.coords().iter().any(|c| c.axis == Some(axis))
    }

    fn shape(&self) -> Vec<usize>;

    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn masked_data(&self) -> &MaskedArray;

    fn is_gridded(&self) -> bool;

    /// Every element as a point, in row-major order.
    fn hyper_points(&self) -> Vec<HyperPoint>;

    /// Files this data was read from.
    fn filenames(&self) -> &[String];

    fn add_history(&mut self, record: &str) {
        self.metadata_mut().append_history(record);
    }

    fn count_valid(&self) -> usize {
        self.masked_data().count_valid()
    }
}

impl CommonData for GriddedData {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    fn coords(&self) -> Vec<&Coord> {
        self.all_coords()
    }

    fn shape(&self) -> Vec<usize> {
        GriddedData::shape(self).to_vec()
    }

    fn masked_data(&self) -> &MaskedArray {
        self.data()
    }

    fn is_gridded(&self) -> bool {
        true
    }

    fn hyper_points(&self) -> Vec<HyperPoint> {
        GriddedData::hyper_points(self)
    }

    fn filenames(&self) -> &[String] {
        &self.filenames
    }
}

impl CommonData for UngriddedData {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    fn coords(&self) -> Vec<&Coord> {
        UngriddedData::coords(self).iter().collect()
    }

    fn shape(&self) -> Vec<usize> {
        vec![UngriddedData::len(self)]
    }

    fn masked_data(&self) -> &MaskedArray {
        self.data()
    }

    fn is_gridded(&self) -> bool {
        false
    }

    fn hyper_points(&self) -> Vec<HyperPoint> {
        UngriddedData::hyper_points(self)
    }

    fn filenames(&self) -> &[String] {
        &self.filenames
    }
}

/// Either container variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Gridded(GriddedData),
    Ungridded(UngriddedData),
}

impl Dataset {
    pub fn as_gridded(&self) -> Option<&GriddedData> {
        match self {
            Dataset::Gridded(g) => Some(g),
            Dataset::Ungridded(_) => None,
        }
    }

    pub fn as_ungridded(&self) -> Option<&UngriddedData> {
        match self {
            Dataset::Gridded(_) => None,
            Dataset::Ungridded(u) => Some(u),
        }
    }

    fn inner(&self) -> &dyn CommonData {
        match self {
            Dataset::Gridded(g) => g,
            Dataset::Ungridded(u) => u,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn CommonData {
        match self {
            Dataset::Gridded(g) => g,
            Dataset::Ungridded(u) => u,
        }
    }

    /// Rotate longitudes into the window starting at `range_start`.
    pub fn set_longitude_range(&mut self, range_start: f64) {
        match self {
            Dataset::Gridded(g) => g.set_longitude_range(range_start),
            Dataset::Ungridded(u) => u.set_longitude_range(range_start),
        }
    }

    /// Short label for logs: "gridded" or "ungridded".
    pub fn kind_label(&self) -> &'static str {
        if self.is_gridded() {
            "gridded"
        } else {
            "ungridded"
        }
    }
}

impl CommonData for Dataset {
    fn metadata(&self) -> &Metadata {
        self.inner().metadata()
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        self.inner_mut().metadata_mut()
    }

    fn coords(&self) -> Vec<&Coord> {
        self.inner().coords()
    }

    fn shape(&self) -> Vec<usize> {
        self.inner().shape()
    }

    fn masked_data(&self) -> &MaskedArray {
        self.inner().masked_data()
    }

    fn is_gridded(&self) -> bool {
        matches!(self, Dataset::Gridded(_))
    }

    fn hyper_points(&self) -> Vec<HyperPoint> {
        self.inner().hyper_points()
    }

    fn filenames(&self) -> &[String] {
        self.inner().filenames()
    }
}

impl From<GriddedData> for Dataset {
    fn from(g: GriddedData) -> Self {
        Dataset::Gridded(g)
    }
}

impl From<UngriddedData> for Dataset {
    fn from(u: UngriddedData) -> Self {
        Dataset::Ungridded(u)
    }
}

/// Several variables sharing identical coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataList {
    items: Vec<Dataset>,
}

impl DataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Dataset>) -> Result<Self> {
        let mut list = Self::new();
        for item in items {
            list.push(item)?;
        }
        Ok(list)
    }

    /// Append a variable; its coordinates must match those already present.
    pub fn push(&mut self, item: Dataset) -> Result<()> {
        if let Some(first) = self.items.first() {
            if first.is_gridded() != item.is_gridded() || !same_coords(first, &item) {
                return Err(CisError::InvalidInput(format!(
                    "'{}' does not share the coordinates of '{}'",
                    item.name(),
                    first.name()
                )));
            }
        }
        self.items.push(item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Dataset> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dataset> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Dataset> {
        self.items.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|d| d.name()).collect()
    }

    pub fn is_gridded(&self) -> bool {
        self.first().map(|d| d.is_gridded()).unwrap_or(false)
    }

    /// Filenames of every variable, de-duplicated, in first-seen order.
    pub fn filenames(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.items.iter().flat_map(|d| d.filenames()) {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    pub fn into_vec(self) -> Vec<Dataset> {
        self.items
    }
}

impl IntoIterator for DataList {
    type Item = Dataset;
    type IntoIter = std::vec::IntoIter<Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a DataList {
    type Item = &'a Dataset;
    type IntoIter = std::slice::Iter<'a, Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn same_coords(a: &Dataset, b: &Dataset) -> bool {
    let ca = a.coords();
    let cb = b.coords();
    ca.len() == cb.len() && ca.iter().zip(&cb).all(|(x, y)| x.same_points(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, lats: Vec<f64>) -> Dataset {
        let n = lats.len();
        let lat = Coord::new(lats, Metadata::new("lat"), Some(Axis::Y));
        let data = MaskedArray::from_vec(&[n], vec![1.0; n], None).unwrap();
        UngriddedData::new(data, Metadata::new(name), vec![lat]).unwrap().into()
    }

    #[test]
    fn test_data_list_checks_coords() {
        let mut list = DataList::new();
        list.push(var("a", vec![0.0, 1.0])).unwrap();
        list.push(var("b", vec![0.0, 1.0])).unwrap();
        assert!(list.push(var("c", vec![0.0, 2.0])).is_err());
        assert_eq!(list.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_axis_is_coordinate_not_found() {
        let d = var("a", vec![0.0]);
        let err = d.coord(Axis::T).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CoordinateNotFound);
        assert!(d.coord(Axis::Y).is_ok());
    }

    #[test]
    fn test_dataset_dispatch() {
        let d = var("a", vec![0.0, 1.0]);
        assert!(!d.is_gridded());
        assert_eq!(d.len(), 2);
        assert_eq!(d.hyper_points().len(), 2);
        assert_eq!(d.kind_label(), "ungridded");
    }
}
