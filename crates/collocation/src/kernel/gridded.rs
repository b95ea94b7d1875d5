//! Interpolation of a gridded source onto arbitrary points.
//!
//! Each source dimension contributes a bracket: one or two `(index, weight)`
//! pairs. The value at a point is the weighted sum over the Cartesian
//! product of brackets, which is N-linear interpolation for the linear method
//! and a single cell for the nearest method. Hybrid vertical coordinates
//! (an auxiliary pressure or altitude varying with the horizontal position)
//! are handled by interpolating a vertical profile first.

use cis_common::{
    fix_longitude_range, AuxCoord, Axis, CisError, Coord, GriddedData, HyperPoint, Result,
};

use crate::params::{Params, PluginSpec};

/// Index/weight pairs along one source dimension.
pub type Bracket = Vec<(usize, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GriddedMethod {
    Linear,
    Nearest,
}

/// Linear or nearest-cell interpolation of a gridded source.
#[derive(Debug, Clone)]
pub struct GriddedKernel {
    spec: PluginSpec,
    method: GriddedMethod,
    extrapolate: bool,
    nn_vertical: bool,
}

impl GriddedKernel {
    /// Accepts `extrapolate` and `nn_vertical` flags; both default to false.
    pub fn from_spec(method: GriddedMethod, spec: &PluginSpec) -> Result<Self> {
        let mut params = Params::new(format!("kernel '{}'", spec.name), &spec.params);
        let extrapolate = params.take_bool("extrapolate")?.unwrap_or(false);
        let nn_vertical = params.take_bool("nn_vertical")?.unwrap_or(false);
        params.finish()?;
        Ok(Self {
            spec: spec.clone(),
            method,
            extrapolate,
            nn_vertical,
        })
    }

    pub fn linear() -> Self {
        Self {
            spec: PluginSpec::new("linear"),
            method: GriddedMethod::Linear,
            extrapolate: false,
            nn_vertical: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    pub fn method(&self) -> GriddedMethod {
        self.method
    }

    pub fn extrapolate(&self) -> bool {
        self.extrapolate
    }

    pub fn nn_vertical(&self) -> bool {
        self.nn_vertical
    }
}

// ============================================================================
// Per-dimension lookup
// ============================================================================

/// Bracketing along one monotonic 1-D coordinate.
#[derive(Debug, Clone)]
pub struct AxisLookup {
    /// Values in ascending order.
    ascending: Vec<f64>,
    increasing: bool,
    circular: bool,
    window_start: Option<f64>,
}

impl AxisLookup {
    pub fn new(coord: &Coord) -> Result<Self> {
        let increasing = coord.monotonic_direction().ok_or_else(|| {
            CisError::InvalidInput(format!(
                "coordinate '{}' must be strictly monotonic to interpolate",
                coord.name()
            ))
        })?;
        let mut ascending = coord.values().to_vec();
        if !increasing {
            ascending.reverse();
        }
        let circular = coord.is_circular();
        let window_start = match (coord.axis, ascending.first(), ascending.last()) {
            (Some(Axis::X), Some(&first), _) if circular => Some(first),
            // Centre the unused part of the circle on the grid's gap so
            // values just outside either edge stay close to it.
            (Some(Axis::X), Some(&first), Some(&last)) => Some(first - (360.0 - (last - first)) / 2.0),
            _ => None,
        };
        Ok(Self {
            ascending,
            increasing,
            circular,
            window_start,
        })
    }

    fn len(&self) -> usize {
        self.ascending.len()
    }

    /// Storage index of the k-th ascending value.
    fn storage(&self, k: usize) -> usize {
        if self.increasing {
            k
        } else {
            self.len() - 1 - k
        }
    }

    fn segment(&self, lo: usize, hi: usize, value: f64) -> Bracket {
        let (a, b) = (self.ascending[lo], self.ascending[hi]);
        let w = (value - a) / (b - a);
        vec![(self.storage(lo), 1.0 - w), (self.storage(hi), w)]
    }

    /// Linear bracket for `value`, or `None` when out of range and not
    /// extrapolating.
    pub fn linear(&self, value: f64, extrapolate: bool) -> Option<Bracket> {
        if value.is_nan() {
            return None;
        }
        let n = self.len();
        if n == 1 {
            return Some(vec![(0, 1.0)]);
        }
        let value = match self.window_start {
            Some(start) => fix_longitude_range(value, start),
            None => value,
        };
        let last = self.ascending[n - 1];
        if self.circular && value > last {
            let gap = self.ascending[0] + 360.0 - last;
            let w = (value - last) / gap;
            return Some(vec![(self.storage(n - 1), 1.0 - w), (self.storage(0), w)]);
        }

        let k = self.ascending.partition_point(|&a| a <= value);
        match k {
            0 => extrapolate.then(|| self.segment(0, 1, value)),
            k if k == n => {
                if value == last {
                    Some(vec![(self.storage(n - 1), 1.0)])
                } else {
                    extrapolate.then(|| self.segment(n - 2, n - 1, value))
                }
            }
            k => Some(self.segment(k - 1, k, value)),
        }
    }

    /// Nearest-cell bracket; out-of-range values clamp to the edge only when
    /// extrapolating. Halfway values go to the lower storage index.
    pub fn nearest(&self, value: f64, extrapolate: bool) -> Option<Bracket> {
        let bracket = match self.linear(value, false) {
            Some(b) => b,
            None if extrapolate && !value.is_nan() => {
                let probe = self.linear(value, true)?;
                // Clamp to whichever edge the extrapolation leans towards.
                let edge = if probe[1].1 > 1.0 { probe[1].0 } else { probe[0].0 };
                return Some(vec![(edge, 1.0)]);
            }
            None => return None,
        };
        let chosen = match bracket.as_slice() {
            [(i, _)] => *i,
            [(i, wi), (j, wj)] => {
                if wi > wj || (wi == wj && i < j) {
                    *i
                } else {
                    *j
                }
            }
            _ => return None,
        };
        Some(vec![(chosen, 1.0)])
    }

    pub fn bracket(&self, value: f64, method: GriddedMethod, extrapolate: bool) -> Option<Bracket> {
        match method {
            GriddedMethod::Linear => self.linear(value, extrapolate),
            GriddedMethod::Nearest => self.nearest(value, extrapolate),
        }
    }
}

/// How one source dimension is resolved for a query point.
#[derive(Debug, Clone)]
pub enum DimLookup {
    /// Always this index (length-1 dimensions).
    Fixed(usize),
    /// Interpolated along the dimension coordinate with this role.
    Axis(Axis, AxisLookup),
    /// Resolved through a hybrid vertical profile.
    Hybrid,
}

#[derive(Debug, Clone)]
struct HybridVertical<'a> {
    dim: usize,
    levels: usize,
    aux: &'a AuxCoord,
    axis: Axis,
}

// ============================================================================
// Interpolator
// ============================================================================

/// A gridded source prepared for repeated point queries.
#[derive(Debug, Clone)]
pub struct GriddedInterpolator<'a> {
    source: &'a GriddedData,
    kernel: GriddedKernel,
    lookups: Vec<DimLookup>,
    hybrid: Option<HybridVertical<'a>>,
}

impl<'a> GriddedInterpolator<'a> {
    /// Prepare `source` for queries by points carrying `sample_axes`.
    ///
    /// Every source dimension longer than one must be reachable from a
    /// sample coordinate; otherwise the coordinate is reported missing.
    pub fn new(source: &'a GriddedData, kernel: &GriddedKernel, sample_axes: &[Axis]) -> Result<Self> {
        let hybrid = find_hybrid(source, sample_axes);
        let mut lookups = Vec::with_capacity(source.ndim());
        for (dim, coord) in source.dim_coords().iter().enumerate() {
            if hybrid.as_ref().is_some_and(|h| h.dim == dim) {
                lookups.push(DimLookup::Hybrid);
                continue;
            }
            if coord.len() == 1 {
                lookups.push(DimLookup::Fixed(0));
                continue;
            }
            match coord.axis {
                Some(axis) if sample_axes.contains(&axis) => {
                    lookups.push(DimLookup::Axis(axis, AxisLookup::new(coord)?));
                }
                Some(axis) => {
                    return Err(CisError::coordinate_not_found(format!(
                        "sample has no {axis} coordinate to match '{}' of {}",
                        coord.name(),
                        describe(source)
                    )))
                }
                None => {
                    return Err(CisError::coordinate_not_found(format!(
                        "dimension '{}' of {} has no recognised coordinate role",
                        coord.name(),
                        describe(source)
                    )))
                }
            }
        }
        tracing::debug!(
            variable = %source.metadata.name,
            kernel = kernel.name(),
            hybrid = hybrid.is_some(),
            "prepared gridded interpolator"
        );
        Ok(Self {
            source,
            kernel: kernel.clone(),
            lookups,
            hybrid,
        })
    }

    pub fn source(&self) -> &GriddedData {
        self.source
    }

    pub fn kernel(&self) -> &GriddedKernel {
        &self.kernel
    }

    pub fn lookups(&self) -> &[DimLookup] {
        &self.lookups
    }

    pub fn has_hybrid_vertical(&self) -> bool {
        self.hybrid.is_some()
    }

    /// Bracket for `value` along source dimension `dim`.
    pub fn dim_bracket(&self, dim: usize, value: Option<f64>) -> Option<Bracket> {
        match &self.lookups[dim] {
            DimLookup::Fixed(i) => Some(vec![(*i, 1.0)]),
            DimLookup::Axis(_, lookup) => {
                lookup.bracket(value?, self.kernel.method, self.kernel.extrapolate)
            }
            DimLookup::Hybrid => None,
        }
    }

    /// Interpolated value at `point`; `None` when out of range or masked.
    pub fn value_at(&self, point: &HyperPoint) -> Option<f64> {
        let mut brackets = Vec::with_capacity(self.lookups.len());
        for (dim, lookup) in self.lookups.iter().enumerate() {
            match lookup {
                DimLookup::Axis(axis, _) => brackets.push(self.dim_bracket(dim, point.get(*axis))?),
                DimLookup::Fixed(_) => brackets.push(self.dim_bracket(dim, None)?),
                DimLookup::Hybrid => brackets.push(Vec::new()),
            }
        }
        match &self.hybrid {
            None => self.combine(&brackets),
            Some(hybrid) => self.vertical_profile(hybrid, &mut brackets, point.get(hybrid.axis)?),
        }
    }

    /// Weighted sum of data over the product of brackets. Zero-weight
    /// corners are skipped so exact grid hits ignore masked neighbours.
    pub fn combine(&self, brackets: &[Bracket]) -> Option<f64> {
        let data = self.source.data();
        weighted_sum(brackets, |index| data.get(index))
    }

    fn vertical_profile(&self, hybrid: &HybridVertical<'_>, brackets: &mut [Bracket], target: f64) -> Option<f64> {
        let mut profile = Vec::with_capacity(hybrid.levels);
        for level in 0..hybrid.levels {
            brackets[hybrid.dim] = vec![(level, 1.0)];
            let value = self.combine(brackets);
            let height = weighted_sum(brackets, |index| {
                Some(hybrid.aux.value_at(index)).filter(|v| !v.is_nan())
            });
            if let (Some(value), Some(height)) = (value, height) {
                profile.push((height, value));
            }
        }
        if profile.is_empty() || target.is_nan() {
            return None;
        }

        if self.kernel.nn_vertical || self.kernel.method == GriddedMethod::Nearest {
            let mut best = profile[0];
            for &(height, value) in &profile[1..] {
                if (height - target).abs() < (best.0 - target).abs() {
                    best = (height, value);
                }
            }
            return Some(best.1);
        }

        profile.sort_by(|a, b| a.0.total_cmp(&b.0));
        let n = profile.len();
        if n == 1 {
            return (profile[0].0 == target || self.kernel.extrapolate).then_some(profile[0].1);
        }
        let k = profile.partition_point(|&(h, _)| h <= target);
        let (lo, hi) = match k {
            0 if !self.kernel.extrapolate => return None,
            0 => (0, 1),
            k if k == n && profile[n - 1].0 == target => return Some(profile[n - 1].1),
            k if k == n && !self.kernel.extrapolate => return None,
            k if k == n => (n - 2, n - 1),
            k => (k - 1, k),
        };
        let (h0, v0) = profile[lo];
        let (h1, v1) = profile[hi];
        if h1 == h0 {
            return Some(v0);
        }
        let w = (target - h0) / (h1 - h0);
        Some(v0 * (1.0 - w) + v1 * w)
    }
}

/// Sum `weight * value(index)` over the product of brackets.
fn weighted_sum<F>(brackets: &[Bracket], value: F) -> Option<f64>
where
    F: Fn(&[usize]) -> Option<f64>,
{
    if brackets.iter().any(Vec::is_empty) {
        return None;
    }
    let mut counters = vec![0usize; brackets.len()];
    let mut index = vec![0usize; brackets.len()];
    let mut total = 0.0;
    loop {
        let mut weight = 1.0;
        for (d, b) in brackets.iter().enumerate() {
            let (i, w) = b[counters[d]];
            index[d] = i;
            weight *= w;
        }
        if weight != 0.0 {
            total += weight * value(&index)?;
        }

        // Odometer increment, last dimension fastest.
        let mut d = brackets.len();
        loop {
            if d == 0 {
                return Some(total);
            }
            d -= 1;
            counters[d] += 1;
            if counters[d] < brackets[d].len() {
                break;
            }
            counters[d] = 0;
        }
    }
}

/// Locate a hybrid vertical auxiliary coordinate the sample can be matched on.
fn find_hybrid<'a>(source: &'a GriddedData, sample_axes: &[Axis]) -> Option<HybridVertical<'a>> {
    source.aux_coords().iter().find_map(|aux| {
        let axis = aux.coord.axis.filter(|a| a.is_vertical())?;
        if aux.dims.is_empty() || !sample_axes.contains(&axis) || source.dim_of_axis(axis).is_some() {
            return None;
        }
        let dim = aux.dims.iter().copied().find(|&d| {
            let coord = &source.dim_coords()[d];
            coord.len() > 1 && coord.axis.map_or(true, |a| a.is_vertical())
        })?;
        Some(HybridVertical {
            dim,
            levels: source.shape()[dim],
            aux,
            axis,
        })
    })
}

fn describe(source: &GriddedData) -> String {
    if source.filenames.is_empty() {
        format!("variable '{}'", source.metadata.name)
    } else {
        format!(
            "variable '{}' in {}",
            source.metadata.name,
            source.filenames.join(", ")
        )
    }
}
