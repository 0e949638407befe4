//! Self-hosted OSRM dataset provisioning (download + preprocess).
//!
//! Prepares a Geofabrik extract for `osrm-routed` with the Lua profile that
//! matches a request's transport mode. Preprocessing runs inside the
//! `osrm/osrm-backend` docker image.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct GeofabrikRegion {
    /// Geofabrik region path, e.g. "south-america/brazil/sudeste".
    pub path: String,
}

impl GeofabrikRegion {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("region")
    }

    pub fn url(&self) -> String {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", self.path)
    }
}

/// OSRM Lua profile a dataset is extracted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Car,
    Foot,
    Bicycle,
}

impl TravelMode {
    /// Maps a request profile onto an extraction profile; unknown modes drive.
    pub fn from_profile(profile: &str) -> Self {
        match profile.to_ascii_lowercase().as_str() {
            "walking" | "foot" => TravelMode::Foot,
            "cycling" | "bike" | "bicycle" => TravelMode::Bicycle,
            _ => TravelMode::Car,
        }
    }

    fn lua(&self) -> &'static str {
        match self {
            TravelMode::Car => "/opt/car.lua",
            TravelMode::Foot => "/opt/foot.lua",
            TravelMode::Bicycle => "/opt/bicycle.lua",
        }
    }

    fn dir_name(&self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Foot => "foot",
            TravelMode::Bicycle => "bicycle",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmDatasetConfig {
    pub region: GeofabrikRegion,
    pub data_root: PathBuf,
    pub mode: TravelMode,
}

impl OsrmDatasetConfig {
    pub fn new(region: GeofabrikRegion, data_root: impl Into<PathBuf>, profile: &str) -> Self {
        Self {
            region,
            data_root: data_root.into(),
            mode: TravelMode::from_profile(profile),
        }
    }
}

/// A dataset ready for `osrm-routed --algorithm mld`.
#[derive(Debug, Clone)]
pub struct OsrmDataset {
    /// Directory to mount at `/data`.
    pub data_dir: PathBuf,
    pub osrm_base: PathBuf,
}

impl OsrmDataset {
    /// Downloads and preprocesses whatever is missing; reruns are cheap.
    pub fn ensure(config: &OsrmDatasetConfig) -> Result<Self> {
        let data_root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let data_dir = data_root
            .join(config.region.name())
            .join(config.mode.dir_name());
        fs::create_dir_all(&data_dir)?;

        let stem = format!("{}-latest", config.region.name());
        let pbf_path = data_dir.join(format!("{stem}.osm.pbf"));
        if !pbf_path.exists() {
            info!(url = %config.region.url(), "downloading extract");
            download(&config.region.url(), &pbf_path)?;
        }

        let osrm_base = data_dir.join(format!("{stem}.osrm"));
        if !mld_ready(&osrm_base) {
            info!(mode = ?config.mode, dir = %data_dir.display(), "preprocessing extract");
            run_docker(
                &["osrm-extract", "-p", config.mode.lua(), &format!("/data/{stem}.osm.pbf")],
                &data_dir,
            )?;
            run_docker(&["osrm-partition", &format!("/data/{stem}.osrm")], &data_dir)?;
            run_docker(&["osrm-customize", &format!("/data/{stem}.osrm")], &data_dir)?;
        }

        Ok(Self { data_dir, osrm_base })
    }

    /// Path of the `.osrm` base as seen inside the container.
    pub fn container_path(&self) -> String {
        let name = self
            .osrm_base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("/data/{name}")
    }
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::blocking::Client::builder()
        .timeout(None)
        .build()?
        .get(url)
        .send()?
        .error_for_status()?;

    let tmp_path = dest.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    response.copy_to(&mut writer)?;
    writer.flush()?;
    fs::rename(tmp_path, dest)?;
    Ok(())
}

fn mld_ready(osrm_base: &Path) -> bool {
    ["osrm.partition", "osrm.mldgr", "osrm.cells"]
        .iter()
        .all(|ext| osrm_base.with_extension(ext).exists())
}

fn run_docker(args: &[&str], data_dir: &Path) -> Result<()> {
    let status = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-t")
        .arg("-v")
        .arg(format!("{}:/data", data_dir.display()))
        .arg("osrm/osrm-backend")
        .args(args)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Process(format!(
            "docker {} exited with {}",
            args.first().copied().unwrap_or_default(),
            status
        )))
    }
}
