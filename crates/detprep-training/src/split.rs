use crate::config::validate_training_fraction;
use crate::dataset::{DatasetStore, DatasetView, TRAINING_TAG};
use crate::error::PrepResult;
use crate::export::{DatasetExporter, ExportSummary};
use crate::layout::FilepathSet;

/// Seed for the train/validation shuffle.
pub const SPLIT_SEED: u64 = 51;

/// Partition sizes for `n` samples.
///
/// Both sizes are floored independently, so up to one sample can fall into
/// neither partition. That remainder is dropped, not redistributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub total: usize,
    pub val_len: usize,
    pub train_len: usize,
}

impl SplitPlan {
    pub fn new(total: usize, training_fraction: f64) -> PrepResult<Self> {
        validate_training_fraction(training_fraction)?;
        let train_parts = fraction_parts(training_fraction);
        let train_len = floor_share(total, train_parts).min(total);
        let val_len = floor_share(total, FRACTION_SCALE - train_parts).min(total - train_len);
        Ok(Self { total, val_len, train_len })
    }

    /// Samples in neither partition.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.total - self.val_len - self.train_len
    }

    /// Validation is the first `val_len` samples, training the next `train_len`.
    #[must_use]
    pub fn partition<'a>(&self, view: DatasetView<'a>) -> (DatasetView<'a>, DatasetView<'a>) {
        let val = view.clone().take(self.val_len);
        let train = view.skip(self.val_len).take(self.train_len);
        (val, train)
    }
}

/// Fractions are resolved to this many parts before any flooring.
const FRACTION_SCALE: u128 = 1_000_000_000;

/// `fraction` (already validated to `[0, 1]`) as parts of `FRACTION_SCALE`.
///
/// Rounding here keeps `1 - 0.8` at exactly 0.2, which plain `f64` math does not.
fn fraction_parts(fraction: f64) -> u128 {
    (fraction * FRACTION_SCALE as f64).round().clamp(0.0, FRACTION_SCALE as f64) as u128
}

/// `floor(total * parts / FRACTION_SCALE)` in integer arithmetic.
fn floor_share(total: usize, parts: u128) -> usize {
    let share = total as u128 * parts / FRACTION_SCALE;
    usize::try_from(share).unwrap_or(total)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub plan: SplitPlan,
    pub val: ExportSummary,
    pub train: ExportSummary,
}

/// Split the `"training"` samples of a dataset and export both partitions.
pub fn split_and_export(
    store: &dyn DatasetStore,
    exporter: &dyn DatasetExporter,
    dataset_name: &str,
    filepaths: &FilepathSet,
    label_field: &str,
    training_fraction: f64,
) -> PrepResult<SplitSummary> {
    tracing::info!(dataset = dataset_name, training_fraction, "Exporting dataset to TFRecords");

    let dataset = store.load_dataset(dataset_name)?;
    let view = dataset.match_tags(TRAINING_TAG).shuffle(SPLIT_SEED);

    let plan = SplitPlan::new(view.len(), training_fraction)?;
    if plan.dropped() > 0 {
        tracing::debug!(dropped = plan.dropped(), total = plan.total, "Samples left out of both partitions");
    }
    let (val_view, train_view) = plan.partition(view);

    let val = exporter.export(&val_view, &filepaths.val_export_dir, label_field)?;
    let train = exporter.export(&train_view, &filepaths.train_export_dir, label_field)?;

    tracing::info!(val = plan.val_len, train = plan.train_len, "Finished exporting dataset to TFRecords");
    Ok(SplitSummary { plan, val, train })
}
