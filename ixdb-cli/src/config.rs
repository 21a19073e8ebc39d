//! CLI configuration: command-line flags, optionally layered over an
//! `ixdb.toml` in the working directory.

use std::path::PathBuf;

use serde::Deserialize;

/// Page sizes this core's on-disk format supports, matching the reference
/// B+Tree layout's assumptions at each size.
pub const PAGE_SIZES: [u16; 4] = [512, 1024, 2048, 4096];

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    page_size: Option<u16>,
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub page_size: u16,
    pub data_dir: PathBuf,
}

impl Config {
    /// Merge `ixdb.toml` (if present in the current directory) under the
    /// explicit CLI flags, which always win.
    pub fn resolve(cli_page_size: Option<u16>, cli_data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let file_config = match std::fs::read_to_string("ixdb.toml") {
            Ok(contents) => toml::from_str(&contents)?,
            Err(_) => FileConfig::default(),
        };

        let page_size = cli_page_size.or(file_config.page_size).unwrap_or(1024);
        if !PAGE_SIZES.contains(&page_size) {
            anyhow::bail!("page size {page_size} is not one of {PAGE_SIZES:?}");
        }

        let data_dir = cli_data_dir
            .or(file_config.data_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config { page_size, data_dir })
    }

    pub fn table_path(&self, table: &str, extension: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.{extension}"))
    }
}
