use crate::dataset::{DatasetView, Sample};
use crate::error::{PrepError, PrepResult};
use crate::label_map::{ClassNameList, LabelMap};
use crate::layout::RECORD_FILE_NAME;
use crate::tfrecord::RecordWriter;
use prost::Message;
use std::cell::RefCell;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

/// `tf.train.Example` and friends, as defined in `tensorflow/core/example/{example,feature}.proto`.
pub mod proto {
    use std::collections::BTreeMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Example {
        #[prost(message, optional, tag = "1")]
        pub features: ::core::option::Option<Features>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Features {
        #[prost(btree_map = "string, message", tag = "1")]
        pub feature: BTreeMap<String, Feature>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Feature {
        #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
        pub kind: ::core::option::Option<feature::Kind>,
    }

    pub mod feature {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "1")]
            BytesList(super::BytesList),
            #[prost(message, tag = "2")]
            FloatList(super::FloatList),
            #[prost(message, tag = "3")]
            Int64List(super::Int64List),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BytesList {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub value: Vec<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FloatList {
        #[prost(float, repeated, tag = "1")]
        pub value: Vec<f32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Int64List {
        #[prost(int64, repeated, tag = "1")]
        pub value: Vec<i64>,
    }

    impl Feature {
        pub fn bytes(values: Vec<Vec<u8>>) -> Self {
            Self { kind: Some(feature::Kind::BytesList(BytesList { value: values })) }
        }

        pub fn floats(values: Vec<f32>) -> Self {
            Self { kind: Some(feature::Kind::FloatList(FloatList { value: values })) }
        }

        pub fn int64s(values: Vec<i64>) -> Self {
            Self { kind: Some(feature::Kind::Int64List(Int64List { value: values })) }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub export_dir: PathBuf,
    pub record_file: PathBuf,
    pub samples: usize,
    pub objects: usize,
}

/// Writes a selection of samples to an export directory.
pub trait DatasetExporter {
    fn export(&self, samples: &DatasetView<'_>, export_dir: &Path, label_field: &str) -> PrepResult<ExportSummary>;
}

/// Exports samples as `<export_dir>/tf.records` in the TF Object Detection layout.
///
/// Without a label map, class ids are assigned in first-seen order across every
/// `export` call on the same exporter, so the partitions of one run agree.
#[derive(Debug, Clone, Default)]
pub struct TfObjectDetectionExporter {
    label_map: Option<LabelMap>,
    seen: RefCell<ClassNameList>,
}

impl TfObjectDetectionExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take class ids from `label_map` instead of assigning them in first-seen order.
    #[must_use]
    pub fn with_label_map(label_map: LabelMap) -> Self {
        Self { label_map: Some(label_map), seen: RefCell::default() }
    }

    fn class_id(&self, label: &str, seen: &mut ClassNameList) -> PrepResult<i64> {
        if let Some(map) = &self.label_map {
            return map
                .id_of(label)
                .map(i64::from)
                .ok_or_else(|| PrepError::Export(format!("label '{label}' is not in the label map")));
        }
        seen.push(label);
        let idx = seen.iter().position(|n| n == label).unwrap_or(seen.len() - 1);
        Ok(idx as i64 + 1)
    }

    fn make_example(&self, sample: &Sample, label_field: &str, seen: &mut ClassNameList) -> PrepResult<proto::Example> {
        use proto::Feature;

        let metadata = sample.metadata.ok_or_else(|| {
            PrepError::Export(format!("sample '{}' has no image metadata (width/height)", sample.id))
        })?;
        let encoded = std::fs::read(&sample.filepath).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to read image {}: {}", sample.filepath.display(), e))
        })?;
        let filename = sample
            .filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let detections = sample.label_field(label_field).map(|d| d.detections.as_slice()).unwrap_or_default();
        let mut xmins = Vec::with_capacity(detections.len());
        let mut xmaxs = Vec::with_capacity(detections.len());
        let mut ymins = Vec::with_capacity(detections.len());
        let mut ymaxs = Vec::with_capacity(detections.len());
        let mut texts = Vec::with_capacity(detections.len());
        let mut labels = Vec::with_capacity(detections.len());
        for detection in detections {
            let [x, y, w, h] = detection.bounding_box;
            xmins.push(x as f32);
            xmaxs.push((x + w) as f32);
            ymins.push(y as f32);
            ymaxs.push((y + h) as f32);
            texts.push(detection.label.as_bytes().to_vec());
            labels.push(self.class_id(&detection.label, seen)?);
        }

        let mut features = proto::Features::default();
        let mut put = |key: &str, feature: Feature| {
            features.feature.insert(key.to_string(), feature);
        };
        put("image/height", Feature::int64s(vec![i64::from(metadata.height)]));
        put("image/width", Feature::int64s(vec![i64::from(metadata.width)]));
        put("image/filename", Feature::bytes(vec![filename.into_bytes()]));
        put("image/source_id", Feature::bytes(vec![sample.id.as_bytes().to_vec()]));
        put("image/encoded", Feature::bytes(vec![encoded]));
        put("image/format", Feature::bytes(vec![image_format(&sample.filepath).into_bytes()]));
        put("image/object/bbox/xmin", Feature::floats(xmins));
        put("image/object/bbox/xmax", Feature::floats(xmaxs));
        put("image/object/bbox/ymin", Feature::floats(ymins));
        put("image/object/bbox/ymax", Feature::floats(ymaxs));
        put("image/object/class/text", Feature::bytes(texts));
        put("image/object/class/label", Feature::int64s(labels));

        Ok(proto::Example { features: Some(features) })
    }
}

impl DatasetExporter for TfObjectDetectionExporter {
    fn export(&self, samples: &DatasetView<'_>, export_dir: &Path, label_field: &str) -> PrepResult<ExportSummary> {
        std::fs::create_dir_all(export_dir)?;
        let record_file = export_dir.join(RECORD_FILE_NAME);
        let file = std::fs::File::create(&record_file)?;
        let mut writer = RecordWriter::new(BufWriter::new(file));

        let mut seen = self.seen.borrow_mut();
        let mut objects = 0;
        for sample in samples.iter() {
            let example = self.make_example(sample, label_field, &mut seen)?;
            objects += sample.label_field(label_field).map_or(0, |d| d.detections.len());
            writer.write_record(&example.encode_to_vec())?;
        }
        let written = writer.records_written();
        writer.finish()?.into_inner().map_err(|e| PrepError::Io(e.into_error()))?.sync_all()?;

        tracing::info!(
            export_dir = %export_dir.display(),
            samples = written,
            objects,
            "Exported TFRecords"
        );
        Ok(ExportSummary { export_dir: export_dir.to_path_buf(), record_file, samples: written, objects })
    }
}

fn image_format(path: &Path) -> String {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "jpeg".to_string(),
        _ => ext,
    }
}
