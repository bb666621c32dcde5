//! Local routing dataset provisioning for running an OSRM instance next to
//! the pipeline (integration tests, development).
//!
//! Downloads a Geofabrik extract once and runs the MLD preprocessing chain in
//! the `osrm/osrm-backend` docker image. Every step is skipped when its
//! output is already on disk.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

pub const OSRM_IMAGE: &str = "osrm/osrm-backend";

/// A Geofabrik extract, e.g. `north-america/us/nevada`.
#[derive(Debug, Clone)]
pub struct OsmExtract {
    pub region: String,
}

impl OsmExtract {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into() }
    }

    /// Last path component, used for file names.
    pub fn name(&self) -> &str {
        self.region.rsplit('/').next().unwrap_or("region")
    }

    pub fn download_url(&self) -> String {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", self.region)
    }
}

#[derive(Debug, Clone)]
pub struct RoutingDatasetConfig {
    pub extract: OsmExtract,
    pub data_root: PathBuf,
    /// Lua profile name inside the image, without extension.
    pub profile: String,
}

impl RoutingDatasetConfig {
    pub fn new(extract: OsmExtract, data_root: impl Into<PathBuf>) -> Self {
        Self {
            extract,
            data_root: data_root.into(),
            profile: "car".to_string(),
        }
    }
}

/// Paths of a prepared dataset.
#[derive(Debug, Clone)]
pub struct RoutingDataset {
    pub data_dir: PathBuf,
    pub osrm_base: PathBuf,
}

#[derive(Debug)]
pub enum DatasetError {
    Io(io::Error),
    Download(reqwest::Error),
    Preprocess(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(err) => write!(f, "dataset io error: {}", err),
            DatasetError::Download(err) => write!(f, "extract download failed: {}", err),
            DatasetError::Preprocess(msg) => write!(f, "preprocessing failed: {}", msg),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<io::Error> for DatasetError {
    fn from(err: io::Error) -> Self {
        DatasetError::Io(err)
    }
}

impl From<reqwest::Error> for DatasetError {
    fn from(err: reqwest::Error) -> Self {
        DatasetError::Download(err)
    }
}

impl RoutingDataset {
    pub fn ensure(config: &RoutingDatasetConfig) -> Result<Self, DatasetError> {
        let root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let name = config.extract.name();
        let data_dir = root.join(name);
        fs::create_dir_all(&data_dir)?;

        let pbf = format!("{}-latest.osm.pbf", name);
        let osrm = format!("{}-latest.osrm", name);
        let dataset = Self {
            osrm_base: data_dir.join(&osrm),
            data_dir,
        };

        let pbf_path = dataset.data_dir.join(&pbf);
        if !pbf_path.exists() {
            info!(url = %config.extract.download_url(), "downloading extract");
            download(&config.extract.download_url(), &pbf_path)?;
        }

        if !dataset.osrm_base.exists() {
            let profile = format!("/opt/{}.lua", config.profile);
            dataset.run_tool(&["osrm-extract", "-p", &profile, &format!("/data/{}", pbf)])?;
        }

        if !dataset.is_partitioned() {
            let target = format!("/data/{}", osrm);
            dataset.run_tool(&["osrm-partition", &target])?;
            dataset.run_tool(&["osrm-customize", &target])?;
        }

        Ok(dataset)
    }

    /// Container path of the `.osrm` base, as `osrm-routed` expects it.
    pub fn container_path(&self) -> String {
        let file = self
            .osrm_base
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        format!("/data/{}", file)
    }

    fn is_partitioned(&self) -> bool {
        ["osrm.partition", "osrm.mldgr", "osrm.cells"]
            .iter()
            .all(|ext| self.osrm_base.with_extension(ext).exists())
    }

    fn run_tool(&self, args: &[&str]) -> Result<(), DatasetError> {
        info!(tool = args[0], "running osrm preprocessing");
        let status = Command::new("docker")
            .args(["run", "--rm", "-t", "-v"])
            .arg(format!("{}:/data", self.data_dir.display()))
            .arg(OSRM_IMAGE)
            .args(args)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(DatasetError::Preprocess(format!("{} exited with {}", args[0], status)))
        }
    }
}

fn download(url: &str, dest: &Path) -> Result<(), DatasetError> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let partial = dest.with_extension("part");
    let mut writer = BufWriter::new(File::create(&partial)?);
    writer.write_all(&response.bytes()?)?;
    writer.flush()?;
    fs::rename(partial, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_name_and_url() {
        let extract = OsmExtract::new("north-america/us/nevada");
        assert_eq!(extract.name(), "nevada");
        assert_eq!(
            extract.download_url(),
            "https://download.geofabrik.de/north-america/us/nevada-latest.osm.pbf"
        );
    }

    #[test]
    fn test_container_path() {
        let dataset = RoutingDataset {
            data_dir: PathBuf::from("/tmp/osrm/nevada"),
            osrm_base: PathBuf::from("/tmp/osrm/nevada/nevada-latest.osrm"),
        };
        assert_eq!(dataset.container_path(), "/data/nevada-latest.osrm");
        assert!(!dataset.is_partitioned());
    }
}
