use crate::error::{PrepError, PrepResult};
use crate::layout::FilepathSet;
use std::path::PathBuf;
use std::process::Command;

/// Fetches a remote file. Implementations decide where the file lands.
pub trait ConfigFetcher {
    fn fetch(&self, url: &str) -> PrepResult<()>;
}

/// Runs a helper script with the URL as its only argument.
///
/// A non-zero exit status is a hard failure.
#[derive(Debug, Clone)]
pub struct ScriptFetcher {
    script: PathBuf,
}

impl ScriptFetcher {
    #[must_use]
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }
}

impl ConfigFetcher for ScriptFetcher {
    fn fetch(&self, url: &str) -> PrepResult<()> {
        tracing::debug!(script = %self.script.display(), url, "Running download script");
        let status = Command::new(&self.script).arg(url).status().map_err(|e| {
            PrepError::Download(format!("failed to run {}: {}", self.script.display(), e))
        })?;
        if !status.success() {
            return Err(PrepError::Download(format!(
                "{} exited with {} for {}",
                self.script.display(),
                status,
                url
            )));
        }
        Ok(())
    }
}

/// `url_base` joined with the base pipeline filename.
pub fn base_config_url(url_base: &str, filepaths: &FilepathSet) -> String {
    if url_base.ends_with('/') {
        format!("{}{}", url_base, filepaths.base_pipeline_file)
    } else {
        format!("{}/{}", url_base, filepaths.base_pipeline_file)
    }
}

/// Download the base training pipeline config for the chosen model.
pub fn download_base_config(fetcher: &dyn ConfigFetcher, url_base: &str, filepaths: &FilepathSet) -> PrepResult<()> {
    tracing::info!("Downloading base training configuration file");
    let url = base_config_url(url_base, filepaths);
    fetcher.fetch(&url)?;
    tracing::info!(url = %url, "Finished downloading base training configuration file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_models::{BaseModelCatalog, BaseModelMetadata};
    use crate::config::DEFAULT_CONFIG_URL_BASE;
    use crate::layout::TrainingLayout;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MockFetcher {
        urls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ConfigFetcher for MockFetcher {
        fn fetch(&self, url: &str) -> PrepResult<()> {
            self.urls.borrow_mut().push(url.to_string());
            if self.fail { Err(PrepError::Download("404".to_string())) } else { Ok(()) }
        }
    }

    fn filepaths(base: &Path) -> FilepathSet {
        let catalog = BaseModelCatalog::new(BTreeMap::from([(
            "ssd".to_string(),
            BaseModelMetadata {
                base_pipeline_file: "ssd_mobilenet_v2_320x320_coco17_tpu-8.config".to_string(),
                model_name: "ssd_mobilenet_v2_320x320_coco17_tpu-8".to_string(),
                pretrained_checkpoint: "ssd.tar.gz".to_string(),
            },
        )]));
        TrainingLayout::for_base_dir(base).build_filepaths(&catalog, "run", "ssd").unwrap()
    }

    #[test]
    fn test_download_fetches_upstream_url() {
        let temp = TempDir::new().unwrap();
        let fetcher = MockFetcher::default();
        download_base_config(&fetcher, DEFAULT_CONFIG_URL_BASE, &filepaths(temp.path())).unwrap();

        assert_eq!(
            *fetcher.urls.borrow(),
            vec![
                "https://raw.githubusercontent.com/tensorflow/models/master/research/object_detection/configs/tf2/ssd_mobilenet_v2_320x320_coco17_tpu-8.config"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_url_base_without_trailing_slash() {
        let temp = TempDir::new().unwrap();
        let url = base_config_url("http://mirror.local/configs", &filepaths(temp.path()));
        assert_eq!(url, "http://mirror.local/configs/ssd_mobilenet_v2_320x320_coco17_tpu-8.config");
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let fetcher = MockFetcher { fail: true, ..Default::default() };
        let err = download_base_config(&fetcher, DEFAULT_CONFIG_URL_BASE, &filepaths(temp.path())).unwrap_err();
        assert!(matches!(err, PrepError::Download(_)));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fetch.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_script_fetcher_passes_url_argument() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("url.txt");
        let script = write_script(temp.path(), &format!("printf '%s' \"$1\" > '{}'", out.display()));

        ScriptFetcher::new(script).fetch("http://example.test/a.config").unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "http://example.test/a.config");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_fetcher_non_zero_exit_is_error() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "exit 3");
        let err = ScriptFetcher::new(script).fetch("http://example.test/a.config").unwrap_err();
        assert!(matches!(err, PrepError::Download(_)));
    }

    #[test]
    fn test_script_fetcher_missing_script_is_error() {
        let temp = TempDir::new().unwrap();
        let err = ScriptFetcher::new(temp.path().join("missing.sh")).fetch("http://x").unwrap_err();
        assert!(matches!(err, PrepError::Download(_)));
    }
}
