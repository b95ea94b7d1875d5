//! JSON dataset documents.
//!
//! A document holds one or more variables. Each variable is either gridded
//! (data in row-major order over `dim_coords`, plus optional `aux_coords`
//! with the data dimensions they span) or ungridded (flat data with one
//! coordinate array per axis). Masked values and NaN coordinates are `null`.
//!
//! ```json
//! {
//!   "variables": [
//!     {
//!       "kind": "ungridded",
//!       "metadata": { "name": "AOD550", "units": "1", "missing_value": -999.0 },
//!       "data": [0.12, null, 0.3],
//!       "coords": [
//!         { "metadata": { "name": "latitude", "units": "degrees_north" }, "axis": "Y", "values": [1.0, 2.0, 3.0] },
//!         { "metadata": { "name": "longitude", "units": "degrees_east" }, "values": [10.0, 11.0, 12.0] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Coordinates without an `axis` have their role guessed from their name.
//! Time coordinates are converted to days since the standard epoch on read.

use std::path::Path;

use cis_common::{
    Axis, CisError, CommonData, Coord, DataList, Dataset, GriddedData, MaskedArray, Metadata, Result, UngriddedData,
};
use serde::{Deserialize, Serialize};

/// A whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDocument {
    pub variables: Vec<VariableDocument>,
}

/// One variable with its coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariableDocument {
    Gridded {
        metadata: Metadata,
        shape: Vec<usize>,
        data: Vec<Option<f64>>,
        dim_coords: Vec<CoordDocument>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        aux_coords: Vec<AuxCoordDocument>,
    },
    Ungridded {
        metadata: Metadata,
        data: Vec<Option<f64>>,
        coords: Vec<CoordDocument>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordDocument {
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
    pub values: Vec<Option<f64>>,
    /// Shape of a multi-dimensional or scalar coordinate; 1-D when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxCoordDocument {
    #[serde(flatten)]
    pub coord: CoordDocument,
    pub dims: Vec<usize>,
}

// ============================================================================
// Document -> data model
// ============================================================================

impl CoordDocument {
    fn into_coord(self) -> Result<Coord> {
        let axis = self
            .axis
            .or_else(|| Axis::guess(&self.metadata.name, self.metadata.standard_name.as_deref()));
        let values: Vec<f64> = self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let mut coord = match self.shape {
            Some(shape) if shape.is_empty() => {
                let value = values.first().copied().ok_or_else(|| {
                    CisError::InvalidInput(format!("scalar coordinate '{}' has no value", self.metadata.name))
                })?;
                Coord::scalar(value, self.metadata, axis)
            }
            Some(shape) => Coord::with_shape(values, shape, self.metadata, axis)?,
            None => Coord::new(values, self.metadata, axis),
        };
        if let Some(bounds) = self.bounds {
            coord.set_bounds(Some(bounds))?;
        }
        if coord.axis == Some(Axis::T) && coord.metadata.units.contains(" since ") {
            coord.convert_to_std_time()?;
        }
        Ok(coord)
    }

    fn from_coord(coord: &Coord) -> Self {
        Self {
            metadata: coord.metadata.clone(),
            axis: coord.axis,
            values: coord.values().iter().map(|v| (!v.is_nan()).then_some(*v)).collect(),
            shape: (coord.ndim() != 1).then(|| coord.shape().to_vec()),
            bounds: coord.bounds().map(<[[f64; 2]]>::to_vec),
        }
    }
}

impl VariableDocument {
    pub fn name(&self) -> &str {
        match self {
            VariableDocument::Gridded { metadata, .. } | VariableDocument::Ungridded { metadata, .. } => &metadata.name,
        }
    }

    fn into_dataset(self, filename: &str) -> Result<Dataset> {
        match self {
            VariableDocument::Gridded {
                metadata,
                shape,
                data,
                dim_coords,
                aux_coords,
            } => {
                let fill = metadata.fill_value();
                let data = MaskedArray::from_options(&shape, &data, fill)?;
                let dims = dim_coords
                    .into_iter()
                    .map(CoordDocument::into_coord)
                    .collect::<Result<Vec<_>>>()?;
                let mut grid = GriddedData::new(data, metadata, dims)?.with_filenames(vec![filename.to_string()]);
                for aux in aux_coords {
                    grid.add_aux_coord(aux.coord.into_coord()?, aux.dims)?;
                }
                Ok(grid.into())
            }
            VariableDocument::Ungridded { metadata, data, coords } => {
                let fill = metadata.fill_value();
                let data = MaskedArray::from_options(&[data.len()], &data, fill)?;
                let coords = coords
                    .into_iter()
                    .map(CoordDocument::into_coord)
                    .collect::<Result<Vec<_>>>()?;
                Ok(UngriddedData::new(data, metadata, coords)?
                    .with_filenames(vec![filename.to_string()])
                    .into())
            }
        }
    }

    fn from_dataset(data: &Dataset) -> Self {
        let values: Vec<Option<f64>> = data.masked_data().iter().collect();
        match data {
            Dataset::Gridded(g) => VariableDocument::Gridded {
                metadata: g.metadata.clone(),
                shape: g.shape().to_vec(),
                data: values,
                dim_coords: g.dim_coords().iter().map(CoordDocument::from_coord).collect(),
                aux_coords: g
                    .aux_coords()
                    .iter()
                    .map(|a| AuxCoordDocument {
                        coord: CoordDocument::from_coord(&a.coord),
                        dims: a.dims.clone(),
                    })
                    .collect(),
            },
            Dataset::Ungridded(u) => VariableDocument::Ungridded {
                metadata: u.metadata.clone(),
                data: values,
                coords: u.coords().iter().map(CoordDocument::from_coord).collect(),
            },
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// Parse a document from a file.
pub fn read_document(path: &Path) -> Result<DatasetDocument> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CisError::InvalidInput(format!("{}: {}", path.display(), e)))
}

/// Read the named variables from each file. Ungridded variables spread
/// over several files are concatenated; gridded ones must come from one file.
pub fn read_variables(variables: &[String], files: &[String]) -> Result<DataList> {
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        documents.push((file.as_str(), read_document(Path::new(file))?));
    }

    let mut list = DataList::new();
    for variable in variables {
        let mut parts = Vec::new();
        for (file, document) in &documents {
            let found = document
                .variables
                .iter()
                .find(|v| v.name() == variable)
                .ok_or_else(|| CisError::VariableNotFound {
                    variable: variable.clone(),
                    file: file.to_string(),
                })?;
            parts.push(found.clone().into_dataset(file)?);
        }
        let dataset = combine(variable, parts)?;
        tracing::debug!(variable = %variable, kind = dataset.kind_label(), points = dataset.len(), "read variable");
        list.push(dataset)?;
    }
    Ok(list)
}

/// Read every variable of one file, e.g. a sample dataset.
pub fn read_all(file: &str) -> Result<DataList> {
    let document = read_document(Path::new(file))?;
    let mut list = DataList::new();
    for variable in document.variables {
        list.push(variable.into_dataset(file)?)?;
    }
    Ok(list)
}

fn combine(variable: &str, mut parts: Vec<Dataset>) -> Result<Dataset> {
    if parts.len() == 1 {
        return parts.pop().ok_or_else(|| CisError::InvalidInput(format!("no data for '{}'", variable)));
    }
    let mut pieces = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Dataset::Ungridded(u) => pieces.push(u),
            Dataset::Gridded(_) => {
                return Err(CisError::InvalidInput(format!(
                    "gridded variable '{}' cannot be combined across files",
                    variable
                )))
            }
        }
    }
    concatenate(pieces).map(Dataset::from)
}

/// Join ungridded variables point-wise; they must carry the same axes.
pub fn concatenate(pieces: Vec<UngriddedData>) -> Result<UngriddedData> {
    let Some(first) = pieces.first() else {
        return Err(CisError::InvalidInput("nothing to concatenate".to_string()));
    };
    let axes: Vec<Option<Axis>> = first.coords().iter().map(|c| c.axis).collect();
    let mut data: Vec<Option<f64>> = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); axes.len()];
    let mut filenames = Vec::new();
    for piece in &pieces {
        let piece_axes: Vec<Option<Axis>> = piece.coords().iter().map(|c| c.axis).collect();
        if piece_axes != axes {
            return Err(CisError::InvalidInput(format!(
                "'{}' in {} has different coordinates from {}",
                piece.metadata.name,
                piece.filenames.join(", "),
                first.filenames.join(", ")
            )));
        }
        data.extend(piece.data().iter());
        for (column, coord) in values.iter_mut().zip(piece.coords()) {
            column.extend_from_slice(coord.values());
        }
        filenames.extend(piece.filenames.iter().cloned());
    }
    let coords = first
        .coords()
        .iter()
        .zip(values)
        .map(|(template, v)| Coord::new(v, template.metadata.clone(), template.axis))
        .collect();
    let fill = first.metadata.fill_value();
    let array = MaskedArray::from_options(&[data.len()], &data, fill)?;
    Ok(UngriddedData::new(array, first.metadata.clone(), coords)?.with_filenames(filenames))
}

/// Serialise a data list to pretty JSON.
pub fn to_document(list: &DataList) -> DatasetDocument {
    DatasetDocument {
        variables: list.iter().map(VariableDocument::from_dataset).collect(),
    }
}

/// Write a data list to `path`.
pub fn write_datalist(path: &Path, list: &DataList) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_document(list))?;
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), variables = list.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const POINTS: &str = r#"{
      "variables": [
        {
          "kind": "ungridded",
          "metadata": { "name": "AOD550", "units": "1", "missing_value": -999.0 },
          "data": [0.12, null, 0.3],
          "coords": [
            { "metadata": { "name": "latitude" }, "values": [1.0, 2.0, 3.0] },
            { "metadata": { "name": "longitude" }, "values": [10.0, 11.0, 12.0] },
            { "metadata": { "name": "time", "units": "hours since 2010-01-01 00:00:00" }, "values": [0.0, 12.0, 24.0] }
          ]
        }
      ]
    }"#;

    #[test]
    fn test_read_guesses_axes_and_converts_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.json");
        std::fs::write(&path, POINTS).unwrap();
        let file = path.to_string_lossy().to_string();

        let list = read_variables(&["AOD550".to_string()], &[file.clone()]).unwrap();
        let data = list.first().unwrap().as_ungridded().unwrap();
        assert_eq!(data.data().count_valid(), 2);
        assert!(data.coord(Axis::Y).is_some());
        let time = data.coord(Axis::T).unwrap();
        assert!((time.values()[1] - time.values()[0] - 0.5).abs() < 1e-9);
        assert_eq!(data.filenames, vec![file]);
    }

    #[test]
    fn test_missing_variable_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.json");
        std::fs::write(&path, POINTS).unwrap();
        let err = read_variables(&["RH".to_string()], &[path.to_string_lossy().to_string()]).unwrap_err();
        assert!(err.to_string().contains("RH"));
        assert!(err.to_string().contains("points.json"));
    }

    #[test]
    fn test_files_are_concatenated() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, POINTS).unwrap();
        std::fs::write(&b, POINTS).unwrap();
        let files = vec![a.to_string_lossy().to_string(), b.to_string_lossy().to_string()];
        let list = read_variables(&["AOD550".to_string()], &files).unwrap();
        let data = list.first().unwrap();
        assert_eq!(data.len(), 6);
        assert_eq!(data.filenames().len(), 2);
    }

    #[test]
    fn test_gridded_write_then_read() {
        let grid = GriddedData::new(
            MaskedArray::from_options(&[2, 2], &[Some(1.0), None, Some(3.0), Some(4.0)], -1.0).unwrap(),
            Metadata::new("t").with_missing_value(-1.0),
            vec![
                Coord::new(vec![0.0, 1.0], Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(vec![0.0, 1.0], Metadata::new("longitude"), Some(Axis::X))
                    .with_bounds(vec![[-0.5, 0.5], [0.5, 1.5]])
                    .unwrap(),
            ],
        )
        .unwrap()
        .with_aux_coord(Coord::scalar(500.0, Metadata::new("air_pressure"), Some(Axis::P)), vec![])
        .unwrap();
        let list = DataList::from_vec(vec![grid.clone().into()]).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");
        write_datalist(&path, &list).unwrap();
        let back = read_all(&path.to_string_lossy()).unwrap();
        let read = back.first().unwrap().as_gridded().unwrap();
        assert_eq!(read.data(), grid.data());
        assert_eq!(read.dim_coords(), grid.dim_coords());
        assert_eq!(read.aux_coords(), grid.aux_coords());
    }

    #[test]
    fn test_malformed_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"variables\": [{\"kind\": \"cube\"}]}").unwrap();
        let err = read_document(&path).unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::InvalidInput);
    }
}
