use cis_common::{CisError, CommonData, DataList, Dataset, MaskedArray, Metadata, Result};

/// The sample's coordinates, onto which output variables are attached.
pub(crate) struct OutputTemplate<'a> {
    sample: &'a Dataset,
    shape: Vec<usize>,
}

impl<'a> OutputTemplate<'a> {
    pub(crate) fn from_dataset(sample: &'a Dataset) -> Result<Self> {
        let shape = match sample {
            Dataset::Gridded(g) => g.shape().to_vec(),
            Dataset::Ungridded(u) => vec![u.len()],
        };
        Ok(Self { sample, shape })
    }

    fn attach(&self, data: MaskedArray, metadata: Metadata, filenames: Vec<String>) -> Result<Dataset> {
        Ok(match self.sample {
            Dataset::Gridded(g) => g.with_same_coords(data, metadata)?.with_filenames(filenames).into(),
            Dataset::Ungridded(u) => u.with_same_coords(data, metadata)?.with_filenames(filenames).into(),
        })
    }
}

/// Metadata for one kernel output derived from the source variable.
fn output_metadata(source: &Metadata, base_name: &str, suffix: &str, fill: f64) -> Metadata {
    let mut metadata = source.clone();
    metadata.name = format!("{}{}", base_name, suffix);
    metadata.missing_value = Some(fill);
    let described = source.display_name().to_string();
    match suffix {
        "_std_dev" => {
            metadata.standard_name = None;
            metadata.long_name = Some(format!("Corrected sample standard deviation of {}", described));
        }
        "_num_points" => {
            metadata.standard_name = None;
            metadata.long_name = Some(format!("Number of points used to calculate the mean of {}", described));
            metadata.units = "1".to_string();
        }
        _ => {}
    }
    metadata
}

/// Wrap raw kernel outputs into variables on the sample's coordinates.
pub(crate) fn build_outputs(
    template: &OutputTemplate<'_>,
    source: &Dataset,
    base_name: &str,
    suffixes: &[&str],
    values: Vec<Vec<Option<f64>>>,
    history: &str,
) -> Result<DataList> {
    if values.len() != suffixes.len() {
        return Err(CisError::shape_mismatch(format!(
            "kernel produced {} outputs but names {}",
            values.len(),
            suffixes.len()
        )));
    }
    let fill = source.metadata().fill_value();
    let mut out = DataList::new();
    for (suffix, column) in suffixes.iter().zip(values) {
        let data = MaskedArray::from_options(&template.shape, &column, fill)?;
        let mut metadata = output_metadata(source.metadata(), base_name, suffix, fill);
        metadata.append_history(history);
        out.push(template.attach(data, metadata, source.filenames().to_vec())?)?;
    }
    Ok(out)
}
