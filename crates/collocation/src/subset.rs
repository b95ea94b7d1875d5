//! Subsetting datasets to coordinate ranges.

use std::fmt;

use cis_common::time::parse_time_value;
use cis_common::{
    fix_longitude_range, Axis, Bound, CisError, CommonData, Dataset, GriddedData, HistoryRecord, Result,
    UngriddedData,
};

use crate::params::split_top_level;

/// Closed limits on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimit {
    pub axis: Axis,
    pub start: f64,
    pub end: f64,
}

impl AxisLimit {
    /// Limit on `axis`; longitude ends below the start are taken to wrap.
    pub fn new(axis: Axis, start: f64, end: f64) -> Result<Self> {
        let end = if axis == Axis::X && end < start { end + 360.0 } else { end };
        if start.is_nan() || end.is_nan() || start > end {
            return Err(CisError::invalid_parameter(
                axis.to_string(),
                format!("start {} is after end {}", start, end),
            ));
        }
        Ok(Self { axis, start, end })
    }

    /// Whether `value` falls inside the limit. Longitudes are compared in
    /// the window beginning at the limit's start.
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let value = if self.axis == Axis::X {
            fix_longitude_range(value, self.start)
        } else {
            value
        };
        self.start <= value && value <= self.end
    }
}

/// Limits on several axes, e.g. `x=[-10,10],t=[2010-01,2010-02]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsetLimits {
    limits: Vec<AxisLimit>,
}

impl SubsetLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: AxisLimit) -> Result<Self> {
        if self.limits.iter().any(|l| l.axis == limit.axis) {
            return Err(CisError::invalid_options(format!(
                "axis {} is limited more than once",
                limit.axis
            )));
        }
        self.limits.push(limit);
        Ok(self)
    }

    /// Parse `axis=[start,end]` items. Time starts use the lower and ends
    /// the upper bound of partial datetimes.
    pub fn parse(s: &str) -> Result<Self> {
        let mut limits = Self::new();
        for item in split_top_level(s)?.into_iter().map(str::trim).filter(|i| !i.is_empty()) {
            let (name, range) = item.split_once('=').ok_or_else(|| {
                CisError::invalid_options(format!("subset limit '{}' is not of the form axis=[start,end]", item))
            })?;
            let axis = Axis::from_str(name).ok_or_else(|| {
                CisError::invalid_options(format!("'{}' is not an axis (x, y, z, p or t)", name.trim()))
            })?;
            let inner = range
                .trim()
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .ok_or_else(|| {
                    CisError::invalid_parameter(axis.to_string(), format!("'{}' is not of the form [start,end]", range))
                })?;
            let Some((start, end)) = inner.split_once(',') else {
                return Err(CisError::invalid_parameter(
                    axis.to_string(),
                    format!("'{}' needs a start and an end", range),
                ));
            };
            let (start, end) = if axis == Axis::T {
                (parse_time_value(start, Bound::Lower)?, parse_time_value(end, Bound::Upper)?)
            } else {
                (parse_number(axis, start)?, parse_number(axis, end)?)
            };
            limits = limits.with_limit(AxisLimit::new(axis, start, end)?)?;
        }
        if limits.limits.is_empty() {
            return Err(CisError::invalid_options(format!("no subset limits in '{}'", s)));
        }
        Ok(limits)
    }

    pub fn limits(&self) -> &[AxisLimit] {
        &self.limits
    }
}

impl fmt::Display for SubsetLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .limits
            .iter()
            .map(|l| format!("{}=[{},{}]", l.axis, l.start, l.end))
            .collect();
        write!(f, "{}", items.join(","))
    }
}

fn parse_number(axis: Axis, s: &str) -> Result<f64> {
    s.trim()
        .parse()
        .map_err(|_| CisError::invalid_parameter(axis.to_string(), format!("'{}' is not a number", s.trim())))
}

/// Restrict `data` to `limits`.
///
/// Gridded data is cut along dimension coordinates, preserving order;
/// ungridded data keeps the points inside every limit.
pub fn subset(data: &Dataset, limits: &SubsetLimits) -> Result<Dataset> {
    let mut out: Dataset = match data {
        Dataset::Gridded(g) => subset_gridded(g, limits)?.into(),
        Dataset::Ungridded(u) => subset_ungridded(u, limits)?.into(),
    };
    if out.count_valid() == 0 {
        return Err(CisError::EmptyResult(format!(
            "subsetting '{}' to {} left no valid points",
            data.name(),
            limits
        )));
    }
    let record = HistoryRecord::new("Subsetted")
        .field("limits", limits.to_string())
        .field("files", data.filenames().join(", "))
        .render();
    out.add_history(&record);
    tracing::info!(
        variable = data.name(),
        limits = %limits,
        before = data.len(),
        after = out.len(),
        "subset complete"
    );
    Ok(out)
}

fn subset_gridded(data: &GriddedData, limits: &SubsetLimits) -> Result<GriddedData> {
    let mut out = data.clone();
    for limit in limits.limits() {
        if let Some(dim) = out.dim_of_axis(limit.axis) {
            let keep: Vec<usize> = out.dim_coords()[dim]
                .values()
                .iter()
                .enumerate()
                .filter(|(_, &v)| limit.contains(v))
                .map(|(i, _)| i)
                .collect();
            out = out.select_along(dim, &keep)?;
            continue;
        }
        match out.aux_of_axis(limit.axis) {
            Some(aux) if aux.dims.is_empty() => {
                if !aux.coord.values().iter().any(|&v| limit.contains(v)) {
                    return Err(CisError::EmptyResult(format!(
                        "{} coordinate '{}' of '{}' lies outside [{}, {}]",
                        limit.axis,
                        aux.coord.name(),
                        data.name(),
                        limit.start,
                        limit.end
                    )));
                }
            }
            Some(aux) => {
                return Err(CisError::coordinate_not_found(format!(
                    "cannot subset '{}' on auxiliary coordinate '{}'",
                    data.name(),
                    aux.coord.name()
                )))
            }
            None => {
                return Err(CisError::coordinate_not_found(format!(
                    "'{}' has no {} coordinate to subset",
                    data.name(),
                    limit.axis
                )))
            }
        }
    }
    Ok(out)
}

fn subset_ungridded(data: &UngriddedData, limits: &SubsetLimits) -> Result<UngriddedData> {
    let mut coords = Vec::with_capacity(limits.limits().len());
    for limit in limits.limits() {
        let coord = data.coord(limit.axis).ok_or_else(|| {
            CisError::coordinate_not_found(format!("'{}' has no {} coordinate to subset", data.name(), limit.axis))
        })?;
        coords.push((limit, coord.values()));
    }
    let keep: Vec<usize> = (0..data.len())
        .filter(|&i| coords.iter().all(|(limit, values)| limit.contains(values[i])))
        .collect();
    data.subset_indices(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cis_common::{Coord, ErrorKind, MaskedArray, Metadata};

    fn track() -> Dataset {
        UngriddedData::new(
            MaskedArray::from_vec(&[4], vec![1.0, 2.0, 3.0, 4.0], None).unwrap(),
            Metadata::new("v"),
            vec![
                Coord::new(vec![0.0, 1.0, 2.0, 3.0], Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(vec![170.0, 179.0, -179.0, 0.0], Metadata::new("longitude"), Some(Axis::X)),
            ],
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_longitude_limit_across_dateline() {
        let limits = SubsetLimits::parse("x=[175,-175]").unwrap();
        assert_eq!(limits.limits()[0].end, 185.0);
        let out = subset(&track(), &limits).unwrap();
        assert_eq!(out.masked_data().compressed(), vec![2.0, 3.0]);
        assert!(out.metadata().history.contains("Subsetted"));
    }

    #[test]
    fn test_time_limits_use_interval_bounds() {
        let limits = SubsetLimits::parse("t=[2010-01,2010-01]").unwrap();
        let l = limits.limits()[0];
        assert!((l.end - l.start - (31.0 - 1.0 / 86_400.0)).abs() < 1e-6);
    }

    #[test]
    fn test_empty_subset() {
        let err = subset(&track(), &SubsetLimits::parse("y=[10,20]").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_missing_axis() {
        let err = subset(&track(), &SubsetLimits::parse("z=[0,10]").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CoordinateNotFound);
    }

    #[test]
    fn test_gridded_subset_keeps_order() {
        let grid = GriddedData::new(
            MaskedArray::from_vec(&[3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None).unwrap(),
            Metadata::new("g"),
            vec![
                Coord::new(vec![20.0, 10.0, 0.0], Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(vec![0.0, 90.0], Metadata::new("longitude"), Some(Axis::X)),
            ],
        )
        .unwrap()
        .with_aux_coord(Coord::scalar(500.0, Metadata::new("air_pressure"), Some(Axis::P)), vec![])
        .unwrap();
        let data = Dataset::from(grid);
        let out = subset(&data, &SubsetLimits::parse("y=[5,25],p=[400,600]").unwrap()).unwrap();
        let g = out.as_gridded().unwrap();
        assert_eq!(g.dim_coords()[0].values(), &[20.0, 10.0]);
        assert_eq!(g.data().compressed(), vec![1.0, 2.0, 3.0, 4.0]);

        let err = subset(&data, &SubsetLimits::parse("p=[600,700]").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_bad_limits() {
        for bad in ["y=[10,0]", "y", "q=[0,1]", "y=[0]", "y=[a,b]", "y=[0,1],y=[1,2]"] {
            assert!(SubsetLimits::parse(bad).is_err(), "{bad}");
        }
    }
}
