//! Locating and loading the plugin and module configuration files.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rt::{ModuleConfig, NetdataEnv, PluginConfig};

const PLUGIN_CONFIG_FILE: &str = "go.d.conf";
const MODULES_CONFIG_DIR: &str = "go.d";

/// Configuration directories in lookup order.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    dirs: Vec<PathBuf>,
}

impl ConfigLocator {
    /// An explicit directory wins; otherwise the agent's user and stock
    /// directories, falling back to the installation layout next to the
    /// executable.
    pub fn new(explicit: Option<&Path>, netdata_env: &NetdataEnv) -> Self {
        if let Some(dir) = explicit {
            return Self::from_dirs(vec![dir.to_path_buf()]);
        }

        let dirs: Vec<PathBuf> = netdata_env
            .config_dirs()
            .into_iter()
            .map(Path::to_path_buf)
            .collect();
        if !dirs.is_empty() {
            return Self::from_dirs(dirs);
        }

        // <prefix>/usr/libexec/netdata/plugins.d/<exe> -> <prefix>/etc/netdata
        let fallback = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("../../../../etc/netdata")));
        Self::from_dirs(fallback.into_iter().collect())
    }

    pub fn from_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Load `relative` from the first directory where it loads cleanly.
    ///
    /// A file that fails to load is reported and the next directory is
    /// tried. `None` when the file exists nowhere.
    fn load<T>(
        &self,
        relative: &Path,
        loader: impl Fn(&Path) -> netdata_plugin_error::Result<T>,
    ) -> Result<Option<T>> {
        let mut last_error = None;

        for path in self.dirs.iter().map(|dir| dir.join(relative)) {
            if !path.is_file() {
                continue;
            }

            match loader(&path) {
                Ok(config) => {
                    tracing::debug!("loaded configuration from {}", path.display());
                    return Ok(Some(config));
                }
                Err(e) => {
                    tracing::error!("failed to load {}: {:#}", path.display(), e);
                    last_error = Some((path, e));
                }
            }
        }

        match last_error {
            Some((path, e)) => Err(e).with_context(|| format!("loading {}", path.display())),
            None => Ok(None),
        }
    }

    /// The plugin configuration, or the defaults when there is no file.
    pub fn plugin_config(&self) -> Result<PluginConfig> {
        let config = self.load(Path::new(PLUGIN_CONFIG_FILE), PluginConfig::from_yaml_file)?;
        Ok(config.unwrap_or_else(|| {
            tracing::info!("no {} found, using defaults", PLUGIN_CONFIG_FILE);
            PluginConfig::default()
        }))
    }

    pub fn module_config(&self, module: &str) -> Result<Option<ModuleConfig>> {
        let relative = Path::new(MODULES_CONFIG_DIR).join(format!("{module}.conf"));
        self.load(&relative, ModuleConfig::from_yaml_file)
    }
}
