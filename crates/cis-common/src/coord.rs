//! Coordinates: named numeric arrays with an axis role and optional cell bounds.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::{CisError, Result};
use crate::metadata::Metadata;
use crate::time::{TimeUnits, STD_CALENDAR, STD_TIME_UNITS};

/// The physical role of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// Longitude (degrees east)
    X,
    /// Latitude (degrees north)
    Y,
    /// Altitude (metres, positive up)
    Z,
    /// Air pressure
    P,
    /// Time (days since the standard epoch)
    T,
}

impl Axis {
    /// All axis roles in canonical order.
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::P, Axis::T];

    /// Parse an axis keyword (`x`, `y`, `z`, `p`, `t`, case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            "p" => Some(Axis::P),
            "t" => Some(Axis::T),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::P => "p",
            Axis::T => "t",
        }
    }

    /// Guess the role of a coordinate from its name and standard name.
    pub fn guess(name: &str, standard_name: Option<&str>) -> Option<Self> {
        let candidates = [standard_name.unwrap_or(""), name];
        for candidate in candidates {
            let lower = candidate.to_lowercase();
            let axis = match lower.as_str() {
                "longitude" | "lon" | "long" | "x" => Some(Axis::X),
                "latitude" | "lat" | "y" => Some(Axis::Y),
                "altitude" | "alt" | "height" | "z" => Some(Axis::Z),
                "air_pressure" | "pressure" | "pres" | "p" => Some(Axis::P),
                "time" | "t" => Some(Axis::T),
                _ => None,
            };
            if axis.is_some() {
                return axis;
            }
        }
        None
    }

    /// Whether this is a vertical axis.
    pub fn is_vertical(&self) -> bool {
        matches!(self, Axis::Z | Axis::P)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wrap a longitude into the 360° window starting at `range_start`.
pub fn fix_longitude_range(lon: f64, range_start: f64) -> f64 {
    let offset = (lon - range_start).rem_euclid(360.0);
    // rem_euclid rounds tiny negative offsets up to exactly 360.
    if offset >= 360.0 {
        range_start
    } else {
        offset + range_start
    }
}

/// A named coordinate array.
///
/// Values are stored flat in row-major order alongside their shape. Bounds,
/// when present, are one `[lower, upper]` pair per value and only exist for
/// one-dimensional coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub metadata: Metadata,
    pub axis: Option<Axis>,
    values: Vec<f64>,
    shape: Vec<usize>,
    bounds: Option<Vec<[f64; 2]>>,
}

impl Coord {
    /// Create a one-dimensional coordinate.
    pub fn new(values: Vec<f64>, metadata: Metadata, axis: Option<Axis>) -> Self {
        let shape = vec![values.len()];
        Self {
            metadata,
            axis,
            values,
            shape,
            bounds: None,
        }
    }

    /// Create a coordinate of arbitrary shape (used for auxiliary coordinates).
    pub fn with_shape(
        values: Vec<f64>,
        shape: Vec<usize>,
        metadata: Metadata,
        axis: Option<Axis>,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(CisError::shape_mismatch(format!(
                "coordinate '{}' has {} values but shape {:?}",
                metadata.name,
                values.len(),
                shape
            )));
        }
        Ok(Self {
            metadata,
            axis,
            values,
            shape,
            bounds: None,
        })
    }

    /// Create a scalar (zero-dimensional) coordinate.
    pub fn scalar(value: f64, metadata: Metadata, axis: Option<Axis>) -> Self {
        Self {
            metadata,
            axis,
            values: vec![value],
            shape: Vec::new(),
            bounds: None,
        }
    }

    /// Attach explicit cell bounds.
    pub fn with_bounds(mut self, bounds: Vec<[f64; 2]>) -> Result<Self> {
        self.set_bounds(Some(bounds))?;
        Ok(self)
    }

    pub fn set_bounds(&mut self, bounds: Option<Vec<[f64; 2]>>) -> Result<()> {
        if let Some(b) = &bounds {
            if self.shape.len() > 1 || b.len() != self.values.len() {
                return Err(CisError::shape_mismatch(format!(
                    "bounds for '{}' must have one pair per value of a 1-D coordinate",
                    self.name()
                )));
            }
        }
        self.bounds = bounds;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn bounds(&self) -> Option<&[[f64; 2]]> {
        self.bounds.as_deref()
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    /// Guess bounds as midpoints between successive values, extrapolating
    /// half a step at each edge. Latitude bounds are clamped to ±90.
    pub fn guess_bounds(&self) -> Vec<[f64; 2]> {
        let v = &self.values;
        let mut bounds = match v.len() {
            0 => Vec::new(),
            1 => vec![[v[0], v[0]]],
            n => {
                let mut edges = Vec::with_capacity(n + 1);
                edges.push(v[0] - (v[1] - v[0]) / 2.0);
                for w in v.windows(2) {
                    edges.push((w[0] + w[1]) / 2.0);
                }
                edges.push(v[n - 1] + (v[n - 1] - v[n - 2]) / 2.0);
                edges.windows(2).map(|e| [e[0], e[1]]).collect()
            }
        };
        if self.axis == Some(Axis::Y) {
            for b in &mut bounds {
                b[0] = b[0].clamp(-90.0, 90.0);
                b[1] = b[1].clamp(-90.0, 90.0);
            }
        }
        bounds
    }

    /// Explicit bounds if present, otherwise guessed ones.
    pub fn bounds_or_guess(&self) -> Cow<'_, [[f64; 2]]> {
        match &self.bounds {
            Some(b) => Cow::Borrowed(b.as_slice()),
            None => Cow::Owned(self.guess_bounds()),
        }
    }

    /// `Some(true)` if strictly increasing, `Some(false)` if strictly
    /// decreasing, `None` otherwise. Single values count as increasing.
    pub fn monotonic_direction(&self) -> Option<bool> {
        if self.values.len() < 2 {
            return Some(true);
        }
        if self.values.windows(2).all(|w| w[1] > w[0]) {
            Some(true)
        } else if self.values.windows(2).all(|w| w[1] < w[0]) {
            Some(false)
        } else {
            None
        }
    }

    /// Smallest non-NaN value.
    pub fn min(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Largest non-NaN value.
    pub fn max(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Start of the longitude window the values currently lie in.
    pub fn wrap_start(&self) -> Option<f64> {
        if self.axis != Some(Axis::X) {
            return None;
        }
        if self.values.iter().any(|&v| v > 180.0) {
            Some(0.0)
        } else {
            Some(-180.0)
        }
    }

    /// Whether a 1-D longitude coordinate covers the whole circle, so that
    /// interpolation may cross the seam between the last and first value.
    pub fn is_circular(&self) -> bool {
        if self.axis != Some(Axis::X) || self.ndim() != 1 || self.values.len() < 2 {
            return false;
        }
        if self.monotonic_direction().is_none() {
            return false;
        }
        let n = self.values.len();
        let step = (self.values[1] - self.values[0]).abs();
        let span = (self.values[n - 1] - self.values[0]).abs() + step;
        (span - 360.0).abs() < 1e-6 * 360.0
    }

    /// Rotate longitude values (and bounds) into the window starting at
    /// `range_start`. The value order is unchanged; gridded containers
    /// re-sort afterwards.
    pub fn set_longitude_range(&mut self, range_start: f64) {
        let shifted: Vec<f64> = self
            .values
            .iter()
            .map(|&v| fix_longitude_range(v, range_start))
            .collect();
        if let Some(bounds) = &mut self.bounds {
            for ((b, old), new) in bounds.iter_mut().zip(&self.values).zip(&shifted) {
                let offset = new - old;
                b[0] += offset;
                b[1] += offset;
            }
        }
        self.values = shifted;
    }

    /// New 1-D coordinate keeping only the given positions, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let values: Vec<f64> = indices.iter().map(|&i| self.values[i]).collect();
        let bounds = self
            .bounds
            .as_ref()
            .map(|b| indices.iter().map(|&i| b[i]).collect());
        Self {
            metadata: self.metadata.clone(),
            axis: self.axis,
            shape: vec![values.len()],
            values,
            bounds,
        }
    }

    /// The same values as a one-dimensional coordinate (bounds kept if already 1-D).
    pub fn flattened(&self) -> Self {
        let mut flat = self.clone();
        if self.shape.len() != 1 {
            flat.shape = vec![self.values.len()];
            flat.bounds = None;
        }
        flat
    }

    /// Replace the values with a same-length vector (shape unchanged).
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(CisError::shape_mismatch(format!(
                "coordinate '{}' expects {} values, got {}",
                self.name(),
                self.values.len(),
                values.len()
            )));
        }
        let mut coord = self.clone();
        coord.values = values;
        Ok(coord)
    }

    /// Whether two coordinates hold identical values, shapes and roles.
    pub fn same_points(&self, other: &Coord) -> bool {
        self.axis == other.axis
            && self.shape == other.shape
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Convert time values to days since the standard epoch, rewriting units.
    pub fn convert_to_std_time(&mut self) -> Result<()> {
        if self.axis != Some(Axis::T) {
            return Err(CisError::InvalidTime(format!(
                "coordinate '{}' is not a time coordinate",
                self.name()
            )));
        }
        let units = TimeUnits::parse(&self.metadata.units, self.metadata.calendar.as_deref())?;
        if units.is_standard() {
            return Ok(());
        }
        for v in &mut self.values {
            *v = units.to_std_days(*v);
        }
        if let Some(bounds) = &mut self.bounds {
            for b in bounds.iter_mut() {
                b[0] = units.to_std_days(b[0]);
                b[1] = units.to_std_days(b[1]);
            }
        }
        self.metadata.units = STD_TIME_UNITS.to_string();
        self.metadata.calendar = Some(STD_CALENDAR.to_string());
        Ok(())
    }
}

/// Find the coordinate with the given role.
pub fn find_axis<'a, I>(coords: I, axis: Axis) -> Option<&'a Coord>
where
    I: IntoIterator<Item = &'a Coord>,
{
    coords.into_iter().find(|c| c.axis == Some(axis))
}
