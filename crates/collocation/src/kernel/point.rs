//! Point kernels over candidate HyperPoints.

use std::fmt;

use cis_common::{Axis, HyperPoint, Result};

use super::gridded::GriddedMethod;
use crate::params::{Params, PluginSpec};

/// The candidate points handed to a kernel: the whole source, or the subset
/// chosen by a constraint, in constraint order.
#[derive(Debug, Clone, Copy)]
pub struct Candidates<'a> {
    source: &'a [HyperPoint],
    indices: Option<&'a [usize]>,
}

impl<'a> Candidates<'a> {
    pub fn all(source: &'a [HyperPoint]) -> Self {
        Self {
            source,
            indices: None,
        }
    }

    pub fn subset(source: &'a [HyperPoint], indices: &'a [usize]) -> Self {
        Self {
            source,
            indices: Some(indices),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.map_or(self.source.len(), <[usize]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates with their source index.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (usize, &'a HyperPoint)> + 'a> {
        let source = self.source;
        match self.indices {
            Some(indices) => Box::new(indices.iter().map(move |&i| (i, &source[i]))),
            None => Box::new(source.iter().enumerate()),
        }
    }

    /// Values of the non-masked candidates.
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + 'a {
        self.iter().filter_map(|(_, p)| p.valid_value())
    }
}

/// A reduction from candidate points to one or more values. `None` marks a
/// masked output.
pub trait PointKernel: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// The specification the kernel was built from, for history records.
    fn spec(&self) -> &PluginSpec;

    /// Name suffix of each output variable.
    fn output_suffixes(&self) -> &'static [&'static str] {
        &[""]
    }

    /// The gridded method this kernel means when the source is gridded.
    fn gridded_equivalent(&self) -> Option<GriddedMethod> {
        None
    }

    /// The distance this kernel minimises, for kernels that pick a single
    /// nearest candidate.
    fn nearest_metric(&self) -> Option<NearestMetric> {
        None
    }

    /// One value per output suffix.
    fn compute(&self, sample: &HyperPoint, candidates: Candidates<'_>) -> Vec<Option<f64>>;
}

// ============================================================================
// Nearest
// ============================================================================

/// How the nearest kernels measure distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearestMetric {
    /// Haversine distance, ties broken by altitude, pressure then time.
    Full,
    /// Haversine distance only.
    Horizontal,
    /// Absolute difference along one axis.
    Along(Axis),
}

impl NearestMetric {
    fn distances(&self, sample: &HyperPoint, p: &HyperPoint) -> Option<[f64; 4]> {
        let along = |axis| sample.axis_distance(p, axis);
        match self {
            NearestMetric::Full => {
                let h = sample.haversine_km(p).unwrap_or(0.0);
                let rest = |axis| along(axis).unwrap_or(0.0);
                Some([h, rest(Axis::Z), rest(Axis::P), rest(Axis::T)])
            }
            NearestMetric::Horizontal => Some([sample.haversine_km(p)?, 0.0, 0.0, 0.0]),
            NearestMetric::Along(axis) => Some([along(*axis)?, 0.0, 0.0, 0.0]),
        }
    }
}

/// Value of the closest non-masked candidate; ties go to the lower source index.
#[derive(Debug, Clone)]
pub struct NearestKernel {
    spec: PluginSpec,
    metric: NearestMetric,
}

impl NearestKernel {
    pub fn new(spec: &PluginSpec, metric: NearestMetric) -> Result<Self> {
        Params::new(format!("kernel '{}'", spec.name), &spec.params).finish()?;
        Ok(Self {
            spec: spec.clone(),
            metric,
        })
    }

    pub fn metric(&self) -> NearestMetric {
        self.metric
    }
}

impl PointKernel for NearestKernel {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    fn gridded_equivalent(&self) -> Option<GriddedMethod> {
        (self.metric == NearestMetric::Full).then_some(GriddedMethod::Nearest)
    }

    fn nearest_metric(&self) -> Option<NearestMetric> {
        Some(self.metric)
    }

    fn compute(&self, sample: &HyperPoint, candidates: Candidates<'_>) -> Vec<Option<f64>> {
        let mut best: Option<(usize, [f64; 4], f64)> = None;
        for (i, p) in candidates.iter() {
            let Some(value) = p.valid_value() else {
                continue;
            };
            let Some(d) = self.metric.distances(sample, p) else {
                continue;
            };
            if d.iter().any(|v| v.is_nan()) {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_i, best_d, _)) => {
                    let ord = d
                        .iter()
                        .zip(best_d)
                        .map(|(a, b)| a.total_cmp(b))
                        .find(|o| o.is_ne())
                        .unwrap_or(std::cmp::Ordering::Equal);
                    ord.is_lt() || (ord.is_eq() && i < *best_i)
                }
            };
            if better {
                best = Some((i, d, value));
            }
        }
        vec![best.map(|(_, _, v)| v)]
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Running sums for mean / standard deviation.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Accumulator {
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        // Welford's update
        let mut acc = Self::default();
        for v in values {
            acc.count += 1;
            let delta = v - acc.mean;
            acc.mean += delta / acc.count as f64;
            acc.m2 += delta * (v - acc.mean);
        }
        acc
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample standard deviation; masked below two values.
    fn std_dev(&self) -> Option<f64> {
        (self.count > 1).then(|| (self.m2 / (self.count - 1) as f64).max(0.0).sqrt())
    }
}

macro_rules! simple_kernel {
    ($(#[$doc:meta])* $kernel:ident, |$values:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $kernel {
            spec: PluginSpec,
        }

        impl $kernel {
            pub fn new(spec: &PluginSpec) -> Result<Self> {
                Params::new(format!("kernel '{}'", spec.name), &spec.params).finish()?;
                Ok(Self { spec: spec.clone() })
            }
        }

        impl PointKernel for $kernel {
            fn name(&self) -> &str {
                &self.spec.name
            }

            fn spec(&self) -> &PluginSpec {
                &self.spec
            }

            fn compute(&self, _sample: &HyperPoint, candidates: Candidates<'_>) -> Vec<Option<f64>> {
                let $values = candidates.valid_values();
                vec![$body]
            }
        }
    };
}

simple_kernel!(
    /// Arithmetic mean of the non-masked candidates.
    MeanKernel,
    |values| Accumulator::from_values(values).mean()
);

simple_kernel!(
    /// Sample standard deviation (n - 1); masked below two values.
    StdDevKernel,
    |values| Accumulator::from_values(values).std_dev()
);

simple_kernel!(
    /// Largest non-masked value.
    MaxKernel,
    |values| values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
);

simple_kernel!(
    /// Smallest non-masked value.
    MinKernel,
    |values| values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
);

simple_kernel!(
    /// Sum of the non-masked values; masked when there are none.
    SumKernel,
    |values| values.fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v))
);

simple_kernel!(
    /// Number of non-masked candidates. Never masked.
    CountKernel,
    |values| Some(values.count() as f64)
);

/// Mean, sample standard deviation and number of contributing points.
#[derive(Debug, Clone)]
pub struct MomentsKernel {
    spec: PluginSpec,
}

impl MomentsKernel {
    pub const SUFFIXES: [&'static str; 3] = ["", "_std_dev", "_num_points"];

    pub fn new(spec: &PluginSpec) -> Result<Self> {
        Params::new(format!("kernel '{}'", spec.name), &spec.params).finish()?;
        Ok(Self { spec: spec.clone() })
    }
}

impl PointKernel for MomentsKernel {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    fn output_suffixes(&self) -> &'static [&'static str] {
        &Self::SUFFIXES
    }

    fn compute(&self, _sample: &HyperPoint, candidates: Candidates<'_>) -> Vec<Option<f64>> {
        let acc = Accumulator::from_values(candidates.valid_values());
        vec![acc.mean(), acc.std_dev(), Some(acc.count as f64)]
    }
}
