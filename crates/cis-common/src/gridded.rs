//! Gridded data: a masked N-D array over orthogonal dimension coordinates.

use crate::coord::{Axis, Coord};
use crate::error::{CisError, Result};
use crate::hyperpoint::HyperPoint;
use crate::masked::{ravel_index, unravel_index, MaskedArray};
use crate::metadata::Metadata;
use crate::ungridded::UngriddedData;

/// An auxiliary coordinate spanning a subset of the data dimensions.
///
/// `dims` lists, in order, which data dimensions the coordinate's own axes
/// correspond to. Scalar coordinates have no dims.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxCoord {
    pub coord: Coord,
    pub dims: Vec<usize>,
}

impl AuxCoord {
    /// Value of this coordinate at a full data multi-index.
    pub fn value_at(&self, index: &[usize]) -> f64 {
        if self.dims.is_empty() {
            return self.coord.values().first().copied().unwrap_or(f64::NAN);
        }
        let sub: Vec<usize> = self.dims.iter().map(|&d| index[d]).collect();
        self.coord.values()[ravel_index(&sub, self.coord.shape())]
    }
}

/// A variable defined on the Cartesian product of its dimension coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedData {
    pub metadata: Metadata,
    pub filenames: Vec<String>,
    data: MaskedArray,
    dim_coords: Vec<Coord>,
    aux_coords: Vec<AuxCoord>,
}

impl GriddedData {
    /// Create a gridded variable; one 1-D dimension coordinate per data axis.
    pub fn new(data: MaskedArray, metadata: Metadata, dim_coords: Vec<Coord>) -> Result<Self> {
        if dim_coords.len() != data.ndim() {
            return Err(CisError::shape_mismatch(format!(
                "'{}' has {} dimensions but {} dimension coordinates",
                metadata.name,
                data.ndim(),
                dim_coords.len()
            )));
        }
        for (i, (coord, &len)) in dim_coords.iter().zip(data.shape()).enumerate() {
            if coord.ndim() != 1 || coord.len() != len {
                return Err(CisError::shape_mismatch(format!(
                    "dimension coordinate '{}' has length {} but axis {} of '{}' has length {}",
                    coord.name(),
                    coord.len(),
                    i,
                    metadata.name,
                    len
                )));
            }
        }
        Ok(Self {
            metadata,
            filenames: Vec::new(),
            data,
            dim_coords,
            aux_coords: Vec::new(),
        })
    }

    /// Attach an auxiliary coordinate whose shape is the sub-shape `dims`.
    pub fn with_aux_coord(mut self, coord: Coord, dims: Vec<usize>) -> Result<Self> {
        self.add_aux_coord(coord, dims)?;
        Ok(self)
    }

    pub fn add_aux_coord(&mut self, coord: Coord, dims: Vec<usize>) -> Result<()> {
        let expected: Vec<usize> = dims
            .iter()
            .map(|&d| self.data.shape().get(d).copied())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                CisError::shape_mismatch(format!(
                    "auxiliary coordinate '{}' refers to a dimension '{}' does not have",
                    coord.name(),
                    self.metadata.name
                ))
            })?;
        let fits = if dims.is_empty() {
            coord.len() == 1
        } else {
            coord.shape() == expected.as_slice()
        };
        if !fits {
            return Err(CisError::shape_mismatch(format!(
                "auxiliary coordinate '{}' has shape {:?}, expected {:?}",
                coord.name(),
                coord.shape(),
                expected
            )));
        }
        self.aux_coords.push(AuxCoord { coord, dims });
        Ok(())
    }

    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn data(&self) -> &MaskedArray {
        &self.data
    }

    /// Replace the data with an array of identical shape.
    pub fn set_data(&mut self, data: MaskedArray) -> Result<()> {
        if data.shape() != self.data.shape() {
            return Err(CisError::shape_mismatch(format!(
                "new data shape {:?} does not match {:?} of '{}'",
                data.shape(),
                self.data.shape(),
                self.metadata.name
            )));
        }
        self.data = data;
        Ok(())
    }

    /// A new variable on the same coordinates.
    pub fn with_same_coords(&self, data: MaskedArray, metadata: Metadata) -> Result<Self> {
        let mut out = Self::new(data, metadata, self.dim_coords.clone())?;
        out.aux_coords = self.aux_coords.clone();
        out.filenames = self.filenames.clone();
        Ok(out)
    }

    pub fn dim_coords(&self) -> &[Coord] {
        &self.dim_coords
    }

    pub fn aux_coords(&self) -> &[AuxCoord] {
        &self.aux_coords
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Data dimension described by the dimension coordinate with this role.
    pub fn dim_of_axis(&self, axis: Axis) -> Option<usize> {
        self.dim_coords.iter().position(|c| c.axis == Some(axis))
    }

    /// Auxiliary coordinate with this role, if any.
    pub fn aux_of_axis(&self, axis: Axis) -> Option<&AuxCoord> {
        self.aux_coords.iter().find(|a| a.coord.axis == Some(axis))
    }

    /// All coordinates, dimension coordinates first.
    pub fn all_coords(&self) -> Vec<&Coord> {
        self.dim_coords
            .iter()
            .chain(self.aux_coords.iter().map(|a| &a.coord))
            .collect()
    }

    /// The cell-centre point at a multi-index, with the data value.
    pub fn point_at(&self, index: &[usize]) -> HyperPoint {
        let mut point = HyperPoint::default();
        for (d, coord) in self.dim_coords.iter().enumerate() {
            if let Some(axis) = coord.axis {
                point.set(axis, Some(coord.values()[index[d]]));
            }
        }
        // Auxiliary coordinates (e.g. hybrid pressure) describe the physical
        // position and take precedence over a dimension coordinate.
        for aux in &self.aux_coords {
            if let Some(axis) = aux.coord.axis {
                point.set(axis, Some(aux.value_at(index)));
            }
        }
        point.val = self.data.get(index);
        point.masked = self.data.is_masked(index);
        point
    }

    /// Every cell as a point, in row-major order.
    pub fn hyper_points(&self) -> Vec<HyperPoint> {
        (0..self.data.len())
            .map(|flat| self.point_at(&unravel_index(flat, self.shape())))
            .collect()
    }

    /// Rotate the longitude dimension into the window starting at
    /// `range_start`, re-ordering data so the coordinate stays increasing.
    pub fn set_longitude_range(&mut self, range_start: f64) {
        for aux in &mut self.aux_coords {
            if aux.coord.axis == Some(Axis::X) {
                aux.coord.set_longitude_range(range_start);
            }
        }
        let Some(dim) = self.dim_of_axis(Axis::X) else {
            return;
        };

        let mut rotated = self.dim_coords[dim].clone();
        rotated.set_longitude_range(range_start);
        let mut order: Vec<usize> = (0..rotated.len()).collect();
        order.sort_by(|&a, &b| rotated.values()[a].total_cmp(&rotated.values()[b]));

        self.dim_coords[dim] = rotated;
        if let Ok(rotated) = self.select_along(dim, &order) {
            *self = rotated;
        }
    }

    /// Keep the given positions along dimension `dim`, in the given order,
    /// together with the matching slices of auxiliary coordinates.
    pub fn select_along(&self, dim: usize, indices: &[usize]) -> Result<Self> {
        if dim >= self.ndim() {
            return Err(CisError::shape_mismatch(format!(
                "'{}' has no dimension {}",
                self.metadata.name, dim
            )));
        }
        let mut out = self.clone();
        out.data = self.data.select(dim, indices);
        out.dim_coords[dim] = self.dim_coords[dim].select(indices);
        for aux in &mut out.aux_coords {
            if let Some(pos) = aux.dims.iter().position(|&d| d == dim) {
                aux.coord = select_coord_along(&aux.coord, pos, indices)?;
            }
        }
        Ok(out)
    }

    /// Flatten to an ungridded variable of cell-centre points.
    pub fn to_ungridded(&self) -> Result<UngriddedData> {
        let points = self.hyper_points();
        let mut coords = Vec::new();
        for axis in Axis::ALL {
            let Some(template) = self.all_coords().into_iter().find(|c| c.axis == Some(axis)).cloned()
            else {
                continue;
            };
            let values: Vec<f64> = points
                .iter()
                .map(|p| p.get(axis).unwrap_or(f64::NAN))
                .collect();
            coords.push(Coord::new(values, template.metadata.clone(), Some(axis)));
        }
        let data = self.data.flattened();
        let mut out = UngriddedData::new(data, self.metadata.clone(), coords)?;
        out.filenames = self.filenames.clone();
        Ok(out)
    }
}

/// Keep the given positions of an N-D coordinate along one of its own axes.
fn select_coord_along(coord: &Coord, axis: usize, indices: &[usize]) -> Result<Coord> {
    if coord.ndim() == 1 {
        return Ok(coord.select(indices));
    }
    let old_shape = coord.shape();
    let mut shape = old_shape.to_vec();
    shape[axis] = indices.len();
    let len: usize = shape.iter().product();
    let values: Vec<f64> = (0..len)
        .map(|flat| {
            let mut index = unravel_index(flat, &shape);
            index[axis] = indices[index[axis]];
            coord.values()[ravel_index(&index, old_shape)]
        })
        .collect();
    Coord::with_shape(values, shape, coord.metadata.clone(), coord.axis)
}
