//! Integration tests for the `detprep` preparation commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASE_MODELS: &str = r#"{
  "ssd_mobilenet_v2": {
    "base_pipeline_file": "ssd_mobilenet_v2_320x320_coco17_tpu-8.config",
    "model_name": "ssd_mobilenet_v2_320x320_coco17_tpu-8",
    "pretrained_checkpoint": "ssd_mobilenet_v2_320x320_coco17_tpu-8.tar.gz"
  },
  "efficientdet_d0": {
    "base_pipeline_file": "ssd_efficientdet_d0_512x512_coco17_tpu-8.config",
    "model_name": "efficientdet_d0_coco17_tpu-32",
    "pretrained_checkpoint": "efficientdet_d0_coco17_tpu-32.tar.gz"
  }
}"#;

/// Helper to lay out a self-contained environment and return its config file
fn setup(temp_dir: &TempDir) -> PathBuf {
    let base = temp_dir.path();
    fs::write(base.join("base_models.json"), BASE_MODELS).unwrap();
    fs::create_dir_all(base.join("datasets")).unwrap();

    let config = format!(
        "dataset_export_root = \"{}\"\nmodel_export_root = \"{}\"\ntraining_root = \"{}\"\ndeploy_dir = \"{}\"\nbase_models_file = \"{}\"\ndatasets_root = \"{}\"\n",
        base.join("dataset-export").display(),
        base.join("model-export").display(),
        base.join("training").display(),
        base.join("deploy").display(),
        base.join("base_models.json").display(),
        base.join("datasets").display(),
    );
    let path = base.join("detprep-test.toml");
    fs::write(&path, config).unwrap();
    path
}

fn detprep(temp_dir: &TempDir, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("detprep").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("--config")
        .arg(config);
    cmd
}

fn write_pets_dataset(temp_dir: &TempDir) {
    let line = r#"{"id":"a","filepath":"images/a.jpg","tags":["training"],"metadata":{"width":640,"height":480},"fields":{"ground_truth":{"detections":[{"label":"cat","bounding_box":[0.1,0.1,0.2,0.2]},{"label":"dog","bounding_box":[0.5,0.5,0.2,0.2]}]}}}"#;
    fs::write(temp_dir.path().join("datasets/pets.jsonl"), format!("{line}\n")).unwrap();
}

#[test]
fn test_paths_json() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    let output = detprep(&temp_dir, &config)
        .args(["paths", "birds", "ssd_mobilenet_v2", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let base = temp_dir.path();
    assert_eq!(
        json["train_record_file"].as_str().unwrap(),
        base.join("dataset-export/birds/train/tf.records").to_str().unwrap()
    );
    assert_eq!(
        json["label_map_file"].as_str().unwrap(),
        base.join("dataset-export/birds/label_map.pbtxt").to_str().unwrap()
    );
    assert_eq!(
        json["pipeline_file"].as_str().unwrap(),
        base.join("deploy/ssd_mobilenet_v2_320x320_coco17_tpu-8.config").to_str().unwrap()
    );
    assert_eq!(json["base_pipeline_file"], "ssd_mobilenet_v2_320x320_coco17_tpu-8.config");
}

#[test]
fn test_train_new_run_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    detprep(&temp_dir, &config)
        .args(["train", "birds", "ssd_mobilenet_v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Training run 'birds' ready"));

    assert!(!temp_dir.path().join("dataset-export").exists());
}

#[test]
fn test_train_duplicate_run_exits_with_status_one() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);
    fs::create_dir_all(temp_dir.path().join("dataset-export/birds")).unwrap();

    detprep(&temp_dir, &config)
        .args(["train", "birds", "ssd_mobilenet_v2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_train_unknown_model_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    detprep(&temp_dir, &config)
        .args(["train", "birds", "yolo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yolo"));
}

#[test]
fn test_models_list() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    detprep(&temp_dir, &config)
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("ssd_mobilenet_v2"))
        .stdout(predicate::str::contains("efficientdet_d0"));
}

#[test]
fn test_label_map_prints_mapping() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);
    write_pets_dataset(&temp_dir);

    detprep(&temp_dir, &config)
        .args(["label-map", "pets-run", "ssd_mobilenet_v2", "--dataset", "pets", "--label-field", "ground_truth"])
        .assert()
        .success()
        .stdout(predicate::eq("item {\n  name: \"cat\"\n  id: 1\n}\nitem {\n  name: \"dog\"\n  id: 2\n}\n"));
}

#[test]
fn test_label_map_save_then_count_classes() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);
    write_pets_dataset(&temp_dir);
    fs::create_dir_all(temp_dir.path().join("dataset-export/pets-run")).unwrap();

    detprep(&temp_dir, &config)
        .args([
            "label-map",
            "pets-run",
            "ssd_mobilenet_v2",
            "--dataset",
            "pets",
            "--label-field",
            "ground_truth",
            "--save",
        ])
        .assert()
        .success();
    assert!(temp_dir.path().join("dataset-export/pets-run/label_map.pbtxt").is_file());

    detprep(&temp_dir, &config)
        .args(["count-classes", "pets-run", "ssd_mobilenet_v2"])
        .assert()
        .success()
        .stdout(predicate::eq("2\n"));
}

#[test]
fn test_count_classes_without_label_map_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    detprep(&temp_dir, &config)
        .args(["count-classes", "birds", "ssd_mobilenet_v2"])
        .assert()
        .failure();
}

#[test]
fn test_export_writes_both_record_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);
    write_pets_dataset(&temp_dir);
    let images = temp_dir.path().join("datasets/images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("a.jpg"), b"jpeg").unwrap();

    detprep(&temp_dir, &config)
        .args([
            "export",
            "pets-run",
            "ssd_mobilenet_v2",
            "--dataset",
            "pets",
            "--label-field",
            "ground_truth",
            "--training-fraction",
            "0.5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 'pets'"));

    let run_dir = temp_dir.path().join("dataset-export/pets-run");
    assert!(run_dir.join("val/tf.records").is_file());
    assert!(run_dir.join("train/tf.records").is_file());
}

#[test]
fn test_export_unknown_dataset_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);

    detprep(&temp_dir, &config)
        .args(["export", "run", "ssd_mobilenet_v2", "--dataset", "missing", "--label-field", "ground_truth"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_download_config_runs_script_with_upstream_url() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let config = setup(&temp_dir);
    let out = temp_dir.path().join("url.txt");
    let script = temp_dir.path().join("fetch.sh");
    fs::write(&script, format!("#!/bin/sh\nprintf '%s' \"$1\" > '{}'\n", out.display())).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    detprep(&temp_dir, &config)
        .env("DETPREP_DOWNLOAD_SCRIPT", &script)
        .args(["download-config", "birds", "ssd_mobilenet_v2"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(out).unwrap(),
        "https://raw.githubusercontent.com/tensorflow/models/master/research/object_detection/configs/tf2/ssd_mobilenet_v2_320x320_coco17_tpu-8.config"
    );
}

#[test]
fn test_no_command_prints_help() {
    Command::cargo_bin("detprep")
        .unwrap()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}
