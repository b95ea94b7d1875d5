//! Aggregation grid specifications: `x=[-180,180,10],y,t=[2010-01,2010-02,P1D]`.

use cis_common::time::{parse_time_delta, parse_time_value, STD_CALENDAR, STD_TIME_UNITS};
use cis_common::{Axis, Bound, CisError, Coord, Metadata, Result};

use crate::params::split_top_level;

/// Tolerance when counting cells so that `(end - start) / delta` landing an
/// ulp above an integer does not add an empty cell.
const CELL_COUNT_TOLERANCE: f64 = 1e-9;

/// Upper limit on the number of cells along a single axis.
pub const MAX_AXIS_CELLS: usize = 10_000_000;

/// An explicit `[start, end, delta]` range on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub axis: Axis,
    pub start: f64,
    pub end: f64,
    pub delta: f64,
}

impl AxisRange {
    pub fn new(axis: Axis, start: f64, end: f64, delta: f64) -> Result<Self> {
        let bad = |message: String| CisError::invalid_parameter(axis.to_string(), message);
        if !(start.is_finite() && end.is_finite() && delta.is_finite()) {
            return Err(bad("start, end and delta must be finite".to_string()));
        }
        if delta <= 0.0 {
            return Err(bad(format!("delta must be positive, got {}", delta)));
        }
        if end <= start {
            return Err(bad(format!("end {} must be greater than start {}", end, start)));
        }
        if axis == Axis::X && end - start > 360.0 {
            return Err(bad(format!("longitude range [{}, {}] spans more than 360 degrees", start, end)));
        }
        let cells = ((end - start) / delta - CELL_COUNT_TOLERANCE).ceil();
        if cells > MAX_AXIS_CELLS as f64 {
            return Err(bad(format!(
                "delta {} over [{}, {}] gives more than {} cells",
                delta, start, end, MAX_AXIS_CELLS
            )));
        }
        Ok(Self { axis, start, end, delta })
    }

    /// Number of cells.
    pub fn cells(&self) -> usize {
        let n = ((self.end - self.start) / self.delta - CELL_COUNT_TOLERANCE).ceil();
        (n as usize).max(1)
    }

    /// Cell edges as `[lower, upper]`; the last cell is clipped to `end`.
    pub fn bounds(&self) -> Vec<[f64; 2]> {
        (0..self.cells())
            .map(|i| {
                let lo = self.start + i as f64 * self.delta;
                let hi = (self.start + (i + 1) as f64 * self.delta).min(self.end);
                [lo, hi]
            })
            .collect()
    }

    /// Cell-centre coordinate with bounds. `template` supplies names and
    /// units when the input carries a coordinate on this axis.
    pub fn to_coord(&self, template: Option<&Metadata>) -> Result<Coord> {
        let bounds = self.bounds();
        let centres = bounds.iter().map(|b| (b[0] + b[1]) / 2.0).collect();
        Coord::new(centres, axis_metadata(self.axis, template), Some(self.axis)).with_bounds(bounds)
    }
}

/// Metadata for a coordinate built on `axis`, copied from `template` when given.
pub fn axis_metadata(axis: Axis, template: Option<&Metadata>) -> Metadata {
    let mut metadata = match template {
        Some(t) => {
            let mut m = Metadata::new(t.name.clone());
            m.standard_name = t.standard_name.clone();
            m.long_name = t.long_name.clone();
            m.units = t.units.clone();
            m.calendar = t.calendar.clone();
            m
        }
        None => {
            let (name, units) = match axis {
                Axis::X => ("longitude", "degrees_east"),
                Axis::Y => ("latitude", "degrees_north"),
                Axis::Z => ("altitude", "m"),
                Axis::P => ("air_pressure", "hPa"),
                Axis::T => ("time", STD_TIME_UNITS),
            };
            Metadata::new(name).with_standard_name(name).with_units(units)
        }
    };
    if axis == Axis::T {
        metadata.units = STD_TIME_UNITS.to_string();
        metadata.calendar = Some(STD_CALENDAR.to_string());
    }
    metadata
}

/// What to do with one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisSpec {
    /// Collapse the axis entirely.
    Collapse(Axis),
    /// Bin the axis into regular cells.
    Range(AxisRange),
}

impl AxisSpec {
    pub fn axis(&self) -> Axis {
        match self {
            AxisSpec::Collapse(axis) => *axis,
            AxisSpec::Range(range) => range.axis,
        }
    }
}

/// An ordered set of axis specifications; each axis appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSpec {
    items: Vec<AxisSpec>,
}

impl GridSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of `axis` or `axis=[start,end,delta]`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut spec = Self::new();
        for item in split_top_level(s)? {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, range) = match item.split_once('=') {
                Some((name, range)) => (name.trim(), Some(range.trim())),
                None => (item, None),
            };
            let axis = Axis::from_str(name).ok_or_else(|| {
                CisError::invalid_options(format!(
                    "'{}' in grid specification '{}' is not an axis (x, y, z, p or t)",
                    name, s
                ))
            })?;
            let item = match range {
                None => AxisSpec::Collapse(axis),
                Some(range) => AxisSpec::Range(parse_range(axis, range)?),
            };
            spec.push(item)?;
        }
        if spec.items.is_empty() {
            return Err(CisError::invalid_options(format!("empty grid specification '{}'", s)));
        }
        Ok(spec)
    }

    pub fn push(&mut self, item: AxisSpec) -> Result<()> {
        if self.items.iter().any(|i| i.axis() == item.axis()) {
            return Err(CisError::invalid_options(format!(
                "axis {} appears more than once in the grid specification",
                item.axis()
            )));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn collapse(mut self, axis: Axis) -> Result<Self> {
        self.push(AxisSpec::Collapse(axis))?;
        Ok(self)
    }

    pub fn range(mut self, range: AxisRange) -> Result<Self> {
        self.push(AxisSpec::Range(range))?;
        Ok(self)
    }

    pub fn items(&self) -> &[AxisSpec] {
        &self.items
    }

    pub fn axes(&self) -> Vec<Axis> {
        self.items.iter().map(AxisSpec::axis).collect()
    }

    pub fn ranges(&self) -> Vec<AxisRange> {
        self.items
            .iter()
            .filter_map(|i| match i {
                AxisSpec::Range(r) => Some(*r),
                AxisSpec::Collapse(_) => None,
            })
            .collect()
    }

    pub fn collapsed(&self) -> Vec<Axis> {
        self.items
            .iter()
            .filter_map(|i| match i {
                AxisSpec::Collapse(axis) => Some(*axis),
                AxisSpec::Range(_) => None,
            })
            .collect()
    }

    pub fn has_ranges(&self) -> bool {
        self.items.iter().any(|i| matches!(i, AxisSpec::Range(_)))
    }
}

fn parse_range(axis: Axis, text: &str) -> Result<AxisRange> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| {
            CisError::invalid_parameter(
                axis.to_string(),
                format!("'{}' is not of the form [start,end,delta]", text),
            )
        })?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let &[start, end, delta] = parts.as_slice() else {
        return Err(CisError::invalid_parameter(
            axis.to_string(),
            format!("expected [start,end,delta], got '{}'", text),
        ));
    };
    let number = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| CisError::invalid_parameter(axis.to_string(), format!("'{}' is not a number", s)))
    };
    let (start, end, delta) = if axis == Axis::T {
        (
            parse_time_value(start, Bound::Lower)?,
            parse_time_value(end, Bound::Lower)?,
            parse_time_delta(delta)?,
        )
    } else {
        (number(start)?, number(end)?, number(delta)?)
    };
    AxisRange::new(axis, start, end, delta)
}
