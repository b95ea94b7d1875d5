//! Grid-cell bin index: assigns scattered points to the cells of a target grid.

use std::collections::BTreeMap;

use cis_common::masked::{ravel_index, unravel_index};
use cis_common::{fix_longitude_range, Axis, CisError, Coord, HyperPoint, Result, UngriddedData};

/// Cell edges of one target dimension coordinate.
#[derive(Debug, Clone)]
pub struct CellAxis {
    axis: Axis,
    centres: Vec<f64>,
    lo: Vec<f64>,
    hi: Vec<f64>,
    /// Cell ids sorted by lower edge.
    order: Vec<usize>,
    /// The cell owning the overall upper edge, which is inclusive.
    last: usize,
    wrap_start: Option<f64>,
}

impl CellAxis {
    pub fn from_coord(coord: &Coord) -> Result<Self> {
        let axis = coord.axis.ok_or_else(|| {
            CisError::coordinate_not_found(format!(
                "coordinate '{}' has no axis role and cannot be binned",
                coord.name()
            ))
        })?;
        if coord.ndim() > 1 {
            return Err(CisError::InvalidInput(format!(
                "cannot bin onto multi-dimensional coordinate '{}'",
                coord.name()
            )));
        }
        if coord.is_empty() {
            return Err(CisError::InvalidInput(format!(
                "cannot bin onto empty coordinate '{}'",
                coord.name()
            )));
        }

        let bounds = coord.bounds_or_guess();
        let lo: Vec<f64> = bounds.iter().map(|b| b[0].min(b[1])).collect();
        let hi: Vec<f64> = bounds.iter().map(|b| b[0].max(b[1])).collect();
        let mut order: Vec<usize> = (0..lo.len()).collect();
        order.sort_by(|&a, &b| lo[a].total_cmp(&lo[b]).then(a.cmp(&b)));
        let last = (0..hi.len())
            .max_by(|&a, &b| hi[a].total_cmp(&hi[b]).then(lo[a].total_cmp(&lo[b])))
            .unwrap_or(0);
        let wrap_start = (axis == Axis::X).then(|| lo.iter().copied().fold(f64::INFINITY, f64::min));

        Ok(Self {
            axis,
            centres: coord.values().to_vec(),
            lo,
            hi,
            order,
            last,
            wrap_start,
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn len(&self) -> usize {
        self.lo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lo.is_empty()
    }

    /// Cell containing `value`: `lo <= v < hi`, or `v == hi` for the last cell.
    pub fn locate(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let value = match self.wrap_start {
            Some(start) => fix_longitude_range(value, start),
            None => value,
        };
        // Edges built as start + i * step can sit an ulp or two away from
        // values computed independently.
        let tol = 8.0 * f64::EPSILON * value.abs().max(1.0);
        let k = self.order.partition_point(|&c| self.lo[c] <= value + tol);
        let cell = *self.order.get(k.checked_sub(1)?)?;
        let inside = value < self.hi[cell] || (cell == self.last && value <= self.hi[cell] + tol);
        inside.then_some(cell)
    }
}

/// One occupied output cell.
#[derive(Debug, Clone)]
pub struct CellBucket<'a> {
    pub index: Vec<usize>,
    pub centre: HyperPoint,
    pub points: &'a [usize],
}

impl CellBucket<'_> {
    /// The source points of this cell as an ungridded sub-container.
    pub fn subset(&self, source: &UngriddedData) -> Result<UngriddedData> {
        source.subset_indices(self.points)
    }
}

/// Points bucketed by the target cell they fall into.
#[derive(Debug, Clone)]
pub struct GridCellBinIndex {
    axes: Vec<CellAxis>,
    shape: Vec<usize>,
    buckets: BTreeMap<usize, Vec<usize>>,
    dropped: Vec<usize>,
}

impl GridCellBinIndex {
    /// Bucket `points` onto the grid spanned by `target`, one coordinate per
    /// output dimension. Masked points, points lacking one of the target
    /// axes, and points outside every cell are dropped.
    pub fn build(points: &[HyperPoint], target: &[&Coord]) -> Result<Self> {
        let axes = target
            .iter()
            .map(|c| CellAxis::from_coord(c))
            .collect::<Result<Vec<_>>>()?;
        let shape: Vec<usize> = axes.iter().map(CellAxis::len).collect();

        let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut dropped = Vec::new();
        let mut index = vec![0usize; axes.len()];
        'points: for (i, p) in points.iter().enumerate() {
            if p.masked {
                dropped.push(i);
                continue;
            }
            for (d, cell_axis) in axes.iter().enumerate() {
                match p.get(cell_axis.axis).and_then(|v| cell_axis.locate(v)) {
                    Some(cell) => index[d] = cell,
                    None => {
                        dropped.push(i);
                        continue 'points;
                    }
                }
            }
            buckets.entry(ravel_index(&index, &shape)).or_default().push(i);
        }

        tracing::debug!(
            points = points.len(),
            cells = buckets.len(),
            dropped = dropped.len(),
            "built grid-cell bin index"
        );
        metrics::counter!("index_builds_total").increment(1);

        Ok(Self {
            axes,
            shape,
            buckets,
            dropped,
        })
    }

    /// Output grid shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn axes(&self) -> &[CellAxis] {
        &self.axes
    }

    /// Source points outside every cell, or masked.
    pub fn dropped(&self) -> &[usize] {
        &self.dropped
    }

    /// Source points in the cell at `index`; empty if the cell is unoccupied.
    pub fn bucket(&self, index: &[usize]) -> &[usize] {
        self.buckets
            .get(&ravel_index(index, &self.shape))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Centre of the cell at `index`.
    pub fn centre(&self, index: &[usize]) -> HyperPoint {
        let mut point = HyperPoint::default();
        for (cell_axis, &i) in self.axes.iter().zip(index) {
            point.set(cell_axis.axis, Some(cell_axis.centres[i]));
        }
        point
    }

    /// Occupied cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellBucket<'_>> + '_ {
        self.buckets.iter().map(move |(&flat, points)| {
            let index = unravel_index(flat, &self.shape);
            CellBucket {
                centre: self.centre(&index),
                index,
                points,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cis_common::Metadata;

    fn coord(values: Vec<f64>, bounds: Vec<[f64; 2]>, name: &str, axis: Axis) -> Coord {
        Coord::new(values, Metadata::new(name), Some(axis))
            .with_bounds(bounds)
            .unwrap()
    }

    fn unit_grid() -> (Coord, Coord) {
        (
            coord(vec![0.25, 0.75], vec![[0.0, 0.5], [0.5, 1.0]], "latitude", Axis::Y),
            coord(vec![0.25, 0.75], vec![[0.0, 0.5], [0.5, 1.0]], "longitude", Axis::X),
        )
    }

    #[test]
    fn test_locate_edges() {
        let (lat, _) = unit_grid();
        let axis = CellAxis::from_coord(&lat).unwrap();
        assert_eq!(axis.locate(0.0), Some(0));
        assert_eq!(axis.locate(0.5), Some(1));
        assert_eq!(axis.locate(1.0), Some(1));
        assert_eq!(axis.locate(1.01), None);
        assert_eq!(axis.locate(-0.01), None);
        assert_eq!(axis.locate(f64::NAN), None);
    }

    #[test]
    fn test_locate_descending_coordinate() {
        let lat = coord(vec![0.75, 0.25], vec![[1.0, 0.5], [0.5, 0.0]], "latitude", Axis::Y);
        let axis = CellAxis::from_coord(&lat).unwrap();
        assert_eq!(axis.locate(0.1), Some(1));
        assert_eq!(axis.locate(1.0), Some(0));
    }

    #[test]
    fn test_longitude_is_wrapped_into_grid_window() {
        let lon = coord(vec![-5.0, 5.0], vec![[-10.0, 0.0], [0.0, 10.0]], "longitude", Axis::X);
        let axis = CellAxis::from_coord(&lon).unwrap();
        assert_eq!(axis.locate(355.0), Some(0));
        assert_eq!(axis.locate(365.0), Some(1));
    }

    #[test]
    fn test_buckets_in_row_major_order() {
        let (lat, lon) = unit_grid();
        let points = vec![
            HyperPoint::new(0.25, 0.25).with_val(1.0),
            HyperPoint::new(0.75, 0.25).with_val(2.0),
            HyperPoint::new(0.25, 0.75).with_val(3.0),
            HyperPoint::new(0.75, 0.75).with_val(4.0),
        ];
        let index = GridCellBinIndex::build(&points, &[&lat, &lon]).unwrap();
        let cells: Vec<(Vec<usize>, Vec<usize>)> = index
            .cells()
            .map(|c| (c.index.clone(), c.points.to_vec()))
            .collect();
        assert_eq!(
            cells,
            vec![
                (vec![0, 0], vec![0]),
                (vec![0, 1], vec![2]),
                (vec![1, 0], vec![1]),
                (vec![1, 1], vec![3]),
            ]
        );
        let centre = index.centre(&[1, 0]);
        assert_eq!((centre.lat, centre.lon), (Some(0.75), Some(0.25)));
    }

    #[test]
    fn test_every_point_is_bucketed_once_or_dropped() {
        let (lat, lon) = unit_grid();
        let points: Vec<HyperPoint> = (0..50)
            .map(|i| {
                let f = i as f64 / 40.0 - 0.1;
                HyperPoint::new(f, 1.0 - f).with_val(i as f64).with_mask(i % 7 == 0)
            })
            .collect();
        let index = GridCellBinIndex::build(&points, &[&lat, &lon]).unwrap();
        let mut seen: Vec<usize> = index.cells().flat_map(|c| c.points.to_vec()).collect();
        seen.extend_from_slice(index.dropped());
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert!(index.dropped().contains(&0));
    }

    #[test]
    fn test_point_without_target_axis_is_dropped() {
        let (lat, _) = unit_grid();
        let time = coord(vec![0.5], vec![[0.0, 1.0]], "time", Axis::T);
        let points = vec![HyperPoint::new(0.2, 0.2), HyperPoint::new(0.2, 0.2).with_time(0.5)];
        let index = GridCellBinIndex::build(&points, &[&lat, &time]).unwrap();
        assert_eq!(index.dropped(), &[0]);
        assert_eq!(index.bucket(&[0, 0]), &[1]);
    }

    #[test]
    fn test_bucket_as_sub_container() {
        let (lat, lon) = unit_grid();
        let source = UngriddedData::new(
            cis_common::MaskedArray::from_vec(&[3], vec![1.0, 2.0, 3.0], None).unwrap(),
            Metadata::new("aod"),
            vec![
                Coord::new(vec![0.1, 0.9, 0.2], Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(vec![0.1, 0.9, 0.3], Metadata::new("longitude"), Some(Axis::X)),
            ],
        )
        .unwrap();
        let index = GridCellBinIndex::build(&source.hyper_points(), &[&lat, &lon]).unwrap();
        let first = index.cells().next().unwrap();
        assert_eq!(first.index, vec![0, 0]);
        let cell = first.subset(&source).unwrap();
        assert_eq!(cell.data().compressed(), vec![1.0, 3.0]);
        assert_eq!(cell.coord(Axis::Y).unwrap().values(), &[0.1, 0.2]);
    }
}
