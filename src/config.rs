// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ambient configuration plumbing: where the config file and runtime socket
//! live, plus the output defaults and loop-feeder period knobs layered on
//! top via CLI/RON-file/built-in-default merging.

use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use ron::Options;
use ron::extensions::Extensions;
use serde::Deserialize;
use serde::Serialize;
use tracing::Level;
use tracing::metadata::ParseLevelError;

use crate::prelude::*;

fn fallback_config_parent_dir() -> Result<PathBuf> {
    Ok(Path::join(
        &home::home_dir().ok_or(anyhow!("unable to determine home dir"))?,
        ".config",
    ))
}

pub fn default_config_file_dir() -> PathBuf {
    Path::join(
        &env::var("XDG_CONFIG_HOME")
            .log(loc!())
            .ok()
            .map(Into::into)
            .or(fallback_config_parent_dir().log(loc!()).ok())
            .unwrap_or_else(|| "/etc".into()),
        "wl-frontend",
    )
}

pub fn default_config_file(name: &str) -> PathBuf {
    Path::join(&default_config_file_dir(), format!("{name}.ron"))
}

/// `$XDG_RUNTIME_DIR`, falling back to `/tmp`.
pub fn runtime_dir() -> PathBuf {
    env::var_os("XDG_RUNTIME_DIR")
        .map(Into::into)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// `$XDG_DATA_HOME`, falling back to `/tmp`.
pub fn data_home_dir() -> PathBuf {
    env::var_os("XDG_DATA_HOME")
        .map(Into::into)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn default_socket_name() -> String {
    "wayland-0".to_string()
}

pub fn maybe_read_ron_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(loc!(), || format!("unable to read config file {path:?}"))?;
    let config: T = Options::default()
        .with_default_extension(Extensions::IMPLICIT_SOME)
        .from_str(&config_str)
        .with_context(loc!(), || format!("error parsing config file {path:?}"))?;
    Ok(Some(config))
}

pub fn print_default_config_and_exit<T: Serialize + Default>() -> ! {
    println!(
        "{}",
        ron::ser::to_string_pretty::<T>(&Default::default(), ron::ser::PrettyConfig::default())
            .expect("default config must be serializable")
    );
    std::process::exit(0);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SerializableLevel(pub Level);

impl FromStr for SerializableLevel {
    type Err = ParseLevelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Level::from_str(s)?))
    }
}

impl Serialize for SerializableLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for SerializableLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self(Level::from_str(&s).map_err(serde::de::Error::custom)?))
    }
}

pub static LOG_PRIV_DATA: AtomicBool = AtomicBool::new(false);

pub fn set_log_priv_data(val: bool) {
    LOG_PRIV_DATA.store(val, Ordering::Relaxed);
}

pub fn get_log_priv_data() -> bool {
    LOG_PRIV_DATA.load(Ordering::Relaxed)
}

/// Default output geometry/mode advertised until the Output backend
/// supplies real values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDefaults {
    pub width: i32,
    pub height: i32,
    pub physical_width_mm: i32,
    pub physical_height_mm: i32,
    pub refresh_mhz: i32,
    pub scale: i32,
    pub name: &'static str,
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
            physical_width_mm: 200,
            physical_height_mm: 150,
            refresh_mhz: 60_000,
            scale: 1,
            name: "out",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WlFrontendConfig {
    pub socket_name: String,
    pub log_file: Option<PathBuf>,
    pub stderr_log_level: SerializableLevel,
    pub file_log_level: SerializableLevel,
    pub log_priv_data: bool,
    /// Period of the event-loop feeder timer.
    pub loop_feeder_period_ms: u64,
    pub output: OutputDefaults,
}

impl Default for WlFrontendConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            log_file: None,
            stderr_log_level: SerializableLevel(Level::INFO),
            file_log_level: SerializableLevel(Level::TRACE),
            log_priv_data: false,
            loop_feeder_period_ms: 60,
            output: OutputDefaults::default(),
        }
    }
}

/// CLI overrides, merged on top of the config file which is itself merged
/// on top of `WlFrontendConfig::default()`.
#[derive(Parser, Debug)]
#[command(version, about = "Wayland protocol frontend for a display-server compositor")]
pub struct Args {
    /// Print the default config as RON and exit.
    #[arg(long)]
    pub print_default_config: bool,

    #[arg(long)]
    pub config_file: Option<PathBuf>,

    #[arg(long)]
    pub socket_name: Option<String>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long)]
    pub stderr_log_level: Option<SerializableLevel>,

    #[arg(long)]
    pub file_log_level: Option<SerializableLevel>,

    #[arg(long)]
    pub log_priv_data: Option<bool>,

    #[arg(long)]
    pub loop_feeder_period_ms: Option<u64>,
}

impl Args {
    pub fn load_config(self) -> Result<WlFrontendConfig> {
        if self.print_default_config {
            print_default_config_and_exit::<WlFrontendConfig>();
        }

        let config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| default_config_file("wlfrontendd"));
        let mut cfg = maybe_read_ron_file::<WlFrontendConfig>(&config_file)
            .location(loc!())?
            .unwrap_or_default();

        if let Some(v) = self.socket_name {
            cfg.socket_name = v;
        }
        if let Some(v) = self.log_file {
            cfg.log_file = Some(v);
        }
        if let Some(v) = self.stderr_log_level {
            cfg.stderr_log_level = v;
        }
        if let Some(v) = self.file_log_level {
            cfg.file_log_level = v;
        }
        if let Some(v) = self.log_priv_data {
            cfg.log_priv_data = v;
        }
        if let Some(v) = self.loop_feeder_period_ms {
            cfg.loop_feeder_period_ms = v;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_ron() {
        let cfg = WlFrontendConfig::default();
        let s = ron::ser::to_string(&cfg).unwrap();
        let parsed: WlFrontendConfig = ron::de::from_str(&s).unwrap();
        assert_eq!(cfg, parsed);
    }
}
