// Config location resolution
// Decided once at startup; portable mode keeps the config next to the executable
use std::env;
use std::path::{Path, PathBuf};

use directories::BaseDirs;

use super::store::CONFIG_FILE_NAME;
use crate::error::ConfigError;

pub const APP_DIR_NAME: &str = "AudioPopFix";
pub const PORTABLE_MARKER: &str = "portable.mode";
pub const PORTABLE_ENV: &str = "AUDIOPOPFIX_PORTABLE";
pub const CONFIG_DIR_ENV: &str = "AUDIOPOPFIX_CONFIG";

/// Inputs to location resolution, gathered from flags and the environment
#[derive(Debug, Clone, Default)]
pub struct LocationOptions {
    pub portable_flag: bool,
    pub config_dir_flag: Option<PathBuf>,
    pub exe_dir: PathBuf,
    pub portable_env: Option<String>,
    pub config_dir_env: Option<String>,
    pub user_config_dir: Option<PathBuf>,
}

impl LocationOptions {
    /// Fill in everything except the flags from the running process
    pub fn from_process(
        portable_flag: bool,
        config_dir_flag: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let exe = env::current_exe().map_err(|source| ConfigError::Io {
            path: PathBuf::from("<current executable>"),
            source,
        })?;
        let exe_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            portable_flag,
            config_dir_flag,
            exe_dir,
            portable_env: env::var(PORTABLE_ENV).ok(),
            config_dir_env: env::var(CONFIG_DIR_ENV).ok(),
            user_config_dir: BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()),
        })
    }

    /// `--portable`, a marker file next to the executable, or `AUDIOPOPFIX_PORTABLE=1`
    pub fn is_portable(&self) -> bool {
        self.portable_flag
            || self.exe_dir.join(PORTABLE_MARKER).is_file()
            || self.portable_env.as_deref().map(str::trim) == Some("1")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub dir: PathBuf,
    pub portable: bool,
}

impl ConfigLocation {
    /// Precedence: flag, env override, portable exe dir, per-user config dir
    pub fn resolve(options: &LocationOptions) -> Result<Self, ConfigError> {
        let portable = options.is_portable();
        let env_override = options
            .config_dir_env
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let dir = if let Some(dir) = options.config_dir_flag.clone().or(env_override) {
            dir
        } else if portable {
            options.exe_dir.clone()
        } else {
            options
                .user_config_dir
                .as_ref()
                .map(|base| base.join(APP_DIR_NAME))
                .ok_or(ConfigError::NoUserDir)?
        };

        Ok(Self { dir, portable })
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}
