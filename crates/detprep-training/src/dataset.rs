use crate::error::{PrepError, PrepResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Tag marking samples that take part in training (both partitions).
pub const TRAINING_TAG: &str = "training";

/// A single labeled object in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// `[top_left_x, top_left_y, width, height]`, relative to image size, in `[0, 1]`.
    pub bounding_box: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detections {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

/// One image plus its tags and label fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub filepath: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    /// Label field name -> detections. A `null` value means the sample is unlabeled for that field.
    #[serde(default)]
    pub fields: BTreeMap<String, Option<Detections>>,
}

impl Sample {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Detections stored under `label_field`, if the field is present and non-null.
    pub fn label_field(&self, label_field: &str) -> Option<&Detections> {
        self.fields.get(label_field).and_then(Option::as_ref)
    }
}

/// A named collection of samples in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub samples: Vec<Sample>,
}

impl Dataset {
    #[must_use]
    pub fn new(name: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self { name: name.into(), samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn view(&self) -> DatasetView<'_> {
        DatasetView { samples: self.samples.iter().collect() }
    }

    /// Samples carrying `tag`, in dataset order.
    #[must_use]
    pub fn match_tags(&self, tag: &str) -> DatasetView<'_> {
        self.view().match_tags(tag)
    }
}

/// An ordered selection of samples borrowed from a `Dataset`.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    samples: Vec<&'a Sample>,
}

impl<'a> DatasetView<'a> {
    #[must_use]
    pub fn match_tags(self, tag: &str) -> Self {
        Self { samples: self.samples.into_iter().filter(|s| s.has_tag(tag)).collect() }
    }

    /// Reorder with a seeded RNG. The same seed over the same view always gives the same order.
    #[must_use]
    pub fn shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
        self
    }

    #[must_use]
    pub fn skip(self, n: usize) -> Self {
        Self { samples: self.samples.into_iter().skip(n).collect() }
    }

    #[must_use]
    pub fn take(self, n: usize) -> Self {
        Self { samples: self.samples.into_iter().take(n).collect() }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[&'a Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Sample> + '_ {
        self.samples.iter().copied()
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.samples.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Source of named datasets.
pub trait DatasetStore {
    /// Load a dataset by name. Unknown names fail with `PrepError::DatasetNotFound`.
    fn load_dataset(&self, name: &str) -> PrepResult<Dataset>;
}

/// Datasets stored as `<root>/<name>.jsonl`, one `Sample` per line.
///
/// Relative sample filepaths are resolved against `root`.
#[derive(Debug, Clone)]
pub struct JsonlDatasetStore {
    root: PathBuf,
}

impl JsonlDatasetStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn dataset_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.jsonl"))
    }
}

impl DatasetStore for JsonlDatasetStore {
    fn load_dataset(&self, name: &str) -> PrepResult<Dataset> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(PrepError::DatasetNotFound(name.to_string()));
        }
        let path = self.dataset_path(name);
        if !path.is_file() {
            return Err(PrepError::DatasetNotFound(format!("{} ({})", name, path.display())));
        }

        let mut samples = read_jsonl_dataset(&path)?;
        for sample in &mut samples {
            if sample.filepath.is_relative() {
                sample.filepath = self.root.join(&sample.filepath);
            }
        }
        tracing::debug!(dataset = name, samples = samples.len(), "Loaded dataset");
        Ok(Dataset::new(name, samples))
    }
}

pub fn write_jsonl_dataset(path: &Path, samples: &[Sample]) -> PrepResult<()> {
    let mut out = String::new();
    for sample in samples {
        out.push_str(&serde_json::to_string(sample)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

pub fn read_jsonl_dataset(path: &Path) -> PrepResult<Vec<Sample>> {
    let contents = std::fs::read_to_string(path)?;
    let mut samples = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: Sample = serde_json::from_str(line).map_err(|e| {
            PrepError::Dataset(format!("failed to parse {} line {}: {}", path.display(), idx + 1, e))
        })?;
        samples.push(sample);
    }

    Ok(samples)
}
