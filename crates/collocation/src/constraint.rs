//! Constraints: per-sample filters choosing which source points are eligible.

use std::borrow::Cow;

use cis_common::{Axis, CisError, Coord, HyperPoint, Result};

use crate::index::{GridCellBinIndex, HaversineIndex, ScaledIndex, Separation};
use crate::kernel::{Candidates, NearestMetric};
use crate::params::{Params, PluginSpec};

/// Separations as given by the user, before matching against the datasets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeparationParams {
    /// Horizontal, km.
    pub h_sep: Option<f64>,
    /// Altitude, metres.
    pub a_sep: Option<f64>,
    /// Pressure, source units.
    pub p_sep: Option<f64>,
    /// Whichever vertical axis both datasets carry, altitude preferred.
    pub v_sep: Option<f64>,
    /// Time, days.
    pub t_sep: Option<f64>,
}

impl SeparationParams {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self> {
        let mut params = Params::new(format!("constraint '{}'", spec.name), &spec.params);
        let out = Self {
            h_sep: params.take_km("h_sep")?,
            a_sep: params.take_metres("a_sep")?,
            p_sep: params.take_separation("p_sep")?,
            v_sep: params.take_separation("v_sep")?,
            t_sep: params.take_days("t_sep")?,
        };
        params.finish()?;
        Ok(out)
    }

    /// Match the separations to the axes both datasets carry.
    pub fn resolve(&self, source_axes: &[Axis], sample_axes: &[Axis]) -> Result<Separation> {
        let both = |axis: Axis| source_axes.contains(&axis) && sample_axes.contains(&axis);
        let require = |param: &str, axis: Axis| -> Result<()> {
            if both(axis) {
                return Ok(());
            }
            let holder = if source_axes.contains(&axis) { "sample" } else { "source" };
            Err(CisError::coordinate_not_found(format!(
                "{param} needs a {axis} coordinate but the {holder} data has none"
            )))
        };

        let mut sep = Separation::default();
        if let Some(h) = self.h_sep {
            require("h_sep", Axis::Y)?;
            require("h_sep", Axis::X)?;
            sep.horizontal_km = Some(h);
        }
        if let Some(a) = self.a_sep {
            require("a_sep", Axis::Z)?;
            sep.altitude = Some(a);
        }
        if let Some(p) = self.p_sep {
            require("p_sep", Axis::P)?;
            sep.pressure = Some(p);
        }
        if let Some(v) = self.v_sep {
            let slot = if both(Axis::Z) {
                &mut sep.altitude
            } else if both(Axis::P) {
                &mut sep.pressure
            } else {
                return Err(CisError::coordinate_not_found(
                    "v_sep needs an altitude or pressure coordinate in both datasets",
                ));
            };
            if slot.is_some() {
                return Err(CisError::invalid_options(
                    "v_sep constrains the same vertical axis as a_sep or p_sep",
                ));
            }
            *slot = Some(v);
        }
        if let Some(t) = self.t_sep {
            require("t_sep", Axis::T)?;
            sep.time_days = Some(t);
        }
        Ok(sep)
    }
}

/// A constraint resolved from the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Source points within every given separation of the sample point.
    Separation {
        spec: PluginSpec,
        params: SeparationParams,
    },
    /// Source points inside the sample's grid cell.
    Bin { spec: PluginSpec },
    /// The whole source.
    Dummy { spec: PluginSpec },
}

impl Constraint {
    pub fn separation(spec: &PluginSpec) -> Result<Self> {
        Ok(Constraint::Separation {
            params: SeparationParams::from_spec(spec)?,
            spec: spec.clone(),
        })
    }

    pub fn bin(spec: &PluginSpec) -> Result<Self> {
        Params::new(format!("constraint '{}'", spec.name), &spec.params).finish()?;
        Ok(Constraint::Bin { spec: spec.clone() })
    }

    pub fn dummy(spec: &PluginSpec) -> Result<Self> {
        Params::new(format!("constraint '{}'", spec.name), &spec.params).finish()?;
        Ok(Constraint::Dummy { spec: spec.clone() })
    }

    pub fn name(&self) -> &str {
        &self.spec().name
    }

    pub fn spec(&self) -> &PluginSpec {
        match self {
            Constraint::Separation { spec, .. } | Constraint::Bin { spec } | Constraint::Dummy { spec } => spec,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Constraint::Dummy { .. })
    }
}

/// Eligible source indices for one sample point.
#[derive(Debug, Clone)]
pub enum CandidateSet<'a> {
    All,
    Indices(Cow<'a, [usize]>),
}

impl CandidateSet<'_> {
    pub fn view<'s>(&'s self, source: &'s [HyperPoint]) -> Candidates<'s> {
        match self {
            CandidateSet::All => Candidates::all(source),
            CandidateSet::Indices(indices) => Candidates::subset(source, indices),
        }
    }
}

/// A constraint bound to one source, with whatever index it needs.
#[derive(Debug)]
pub enum ConstraintIndex {
    All,
    Separation(ScaledIndex),
    Bin(GridCellBinIndex),
    /// No constraint and a horizontal nearest kernel: only the great-circle
    /// nearest point is a candidate.
    NearestHorizontal(HaversineIndex),
    /// A single-dimension separation that ranks points the way the kernel
    /// does: only the nearest point, if within the separation, is a candidate.
    NearestWithin(ScaledIndex),
}

impl ConstraintIndex {
    /// Build the index for `constraint` over `source`. `target` holds the
    /// sample's dimension coordinates and is required by the bin constraint.
    /// `nearest` is the kernel's metric when it picks a single nearest point.
    pub fn build(
        constraint: &Constraint,
        source: &[HyperPoint],
        source_axes: &[Axis],
        sample_axes: &[Axis],
        target: Option<&[&Coord]>,
        nearest: Option<NearestMetric>,
    ) -> Result<Self> {
        match constraint {
            Constraint::Dummy { .. } => match nearest {
                Some(NearestMetric::Horizontal) => {
                    tracing::debug!("nearest horizontal lookup through the haversine index");
                    Ok(ConstraintIndex::NearestHorizontal(HaversineIndex::build(source)))
                }
                _ => Ok(ConstraintIndex::All),
            },
            Constraint::Separation { params, .. } => {
                let sep = params.resolve(source_axes, sample_axes)?;
                let index = ScaledIndex::build(source, sep);
                match nearest {
                    Some(metric) if index.ranks_like(metric) => {
                        tracing::debug!(?metric, "nearest lookup through the separation index");
                        Ok(ConstraintIndex::NearestWithin(index))
                    }
                    _ => Ok(ConstraintIndex::Separation(index)),
                }
            }
            Constraint::Bin { .. } => {
                let target = target.ok_or_else(|| {
                    CisError::invalid_options("the bin constraint needs a gridded sample")
                })?;
                for coord in target {
                    if let Some(axis) = coord.axis {
                        if !source_axes.contains(&axis) {
                            return Err(CisError::coordinate_not_found(format!(
                                "cannot bin onto '{}': the source has no {axis} coordinate",
                                coord.name()
                            )));
                        }
                    }
                }
                Ok(ConstraintIndex::Bin(GridCellBinIndex::build(source, target)?))
            }
        }
    }

    /// Candidates for `sample`; `cell` is the sample's grid index.
    pub fn candidates(&self, sample: &HyperPoint, cell: &[usize]) -> CandidateSet<'_> {
        match self {
            ConstraintIndex::All => CandidateSet::All,
            ConstraintIndex::Separation(index) => CandidateSet::Indices(Cow::Owned(index.within(sample))),
            ConstraintIndex::Bin(index) => CandidateSet::Indices(Cow::Borrowed(index.bucket(cell))),
            ConstraintIndex::NearestHorizontal(index) => {
                let nearest = match (sample.lat, sample.lon) {
                    (Some(lat), Some(lon)) => index.nearest(lat, lon).map(|(id, _)| id),
                    _ => None,
                };
                CandidateSet::Indices(Cow::Owned(nearest.into_iter().collect()))
            }
            ConstraintIndex::NearestWithin(index) => {
                CandidateSet::Indices(Cow::Owned(index.nearest_within(sample).into_iter().collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> PluginSpec {
        PluginSpec::parse(s).unwrap()
    }

    #[test]
    fn test_separation_params_units() {
        let params = SeparationParams::from_spec(&spec("separation[h_sep=10km,a_sep=0.5km,t_sep=PT6H]")).unwrap();
        assert_eq!(params.h_sep, Some(10.0));
        assert_eq!(params.a_sep, Some(500.0));
        assert_eq!(params.t_sep, Some(0.25));
    }

    #[test]
    fn test_separation_rejects_unknown_param() {
        assert!(SeparationParams::from_spec(&spec("separation[radius=3]")).is_err());
    }

    #[test]
    fn test_v_sep_prefers_altitude() {
        let params = SeparationParams {
            v_sep: Some(100.0),
            ..Default::default()
        };
        let axes = [Axis::X, Axis::Y, Axis::Z, Axis::P];
        let sep = params.resolve(&axes, &axes).unwrap();
        assert_eq!(sep.altitude, Some(100.0));
        assert_eq!(sep.pressure, None);

        let sep = params.resolve(&[Axis::P], &[Axis::P, Axis::Z]).unwrap();
        assert_eq!(sep.pressure, Some(100.0));
    }

    #[test]
    fn test_missing_axis_is_reported() {
        let params = SeparationParams {
            t_sep: Some(1.0),
            ..Default::default()
        };
        let err = params.resolve(&[Axis::X, Axis::Y], &[Axis::X, Axis::Y, Axis::T]).unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::CoordinateNotFound);
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn test_missing_parameters_drop_dimensions() {
        let sep = SeparationParams::default().resolve(&[], &[]).unwrap();
        assert_eq!(sep, Separation::default());
    }

    #[test]
    fn test_bin_requires_gridded_sample() {
        let constraint = Constraint::bin(&spec("bin")).unwrap();
        let err = ConstraintIndex::build(&constraint, &[], &[], &[], None, None).unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::InvalidOptions);
    }

    #[test]
    fn test_separation_candidates() {
        let source = vec![
            HyperPoint::new(0.0, 0.0).with_val(10.0),
            HyperPoint::new(0.0, 5.0).with_val(20.0),
            HyperPoint::new(0.0, 100.0).with_val(30.0),
        ];
        let constraint = Constraint::separation(&spec("separation[h_sep=1000]")).unwrap();
        let axes = [Axis::X, Axis::Y];
        let index = ConstraintIndex::build(&constraint, &source, &axes, &axes, None, None).unwrap();
        let set = index.candidates(&HyperPoint::new(0.0, 2.0), &[0]);
        let values: Vec<f64> = set.view(&source).valid_values().collect();
        assert_eq!(values, vec![10.0, 20.0]);
    }

    #[test]
    fn test_dummy_with_horizontal_nearest_offers_one_candidate() {
        let source = vec![
            HyperPoint::new(0.0, 0.0).with_val(10.0),
            HyperPoint::new(0.0, 3.0).with_val(20.0).with_mask(true),
            HyperPoint::new(0.0, 5.0).with_val(30.0),
        ];
        let constraint = Constraint::dummy(&spec("dummy")).unwrap();
        let axes = [Axis::X, Axis::Y];
        let index = ConstraintIndex::build(
            &constraint,
            &source,
            &axes,
            &axes,
            None,
            Some(NearestMetric::Horizontal),
        )
        .unwrap();
        assert!(matches!(index, ConstraintIndex::NearestHorizontal(_)));
        let set = index.candidates(&HyperPoint::new(0.0, 3.1), &[0]);
        assert_eq!(set.view(&source).valid_values().collect::<Vec<_>>(), vec![30.0]);

        let full = ConstraintIndex::build(&constraint, &source, &axes, &axes, None, Some(NearestMetric::Full)).unwrap();
        assert!(matches!(full, ConstraintIndex::All));
    }

    #[test]
    fn test_single_dimension_separation_with_matching_nearest() {
        let source = vec![
            HyperPoint::new(0.0, 0.0).with_val(10.0),
            HyperPoint::new(0.0, 5.0).with_val(20.0),
        ];
        let constraint = Constraint::separation(&spec("separation[h_sep=100]")).unwrap();
        let axes = [Axis::X, Axis::Y];
        let index = ConstraintIndex::build(
            &constraint,
            &source,
            &axes,
            &axes,
            None,
            Some(NearestMetric::Horizontal),
        )
        .unwrap();
        assert!(matches!(index, ConstraintIndex::NearestWithin(_)));
        let near = index.candidates(&HyperPoint::new(0.0, 0.5), &[0]);
        assert_eq!(near.view(&source).valid_values().collect::<Vec<_>>(), vec![10.0]);
        // Nearest is point 0 at ~267 km, outside the separation.
        let far = index.candidates(&HyperPoint::new(0.0, 2.4), &[0]);
        assert!(far.view(&source).is_empty());

        let other = ConstraintIndex::build(
            &constraint,
            &source,
            &axes,
            &axes,
            None,
            Some(NearestMetric::Along(Axis::T)),
        )
        .unwrap();
        assert!(matches!(other, ConstraintIndex::Separation(_)));
    }
}
