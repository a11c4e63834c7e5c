//! engine/registry.rs
//! Backend registry and factory functions.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::config::StreamConfig;
use crate::engine::backends::raw::RawEngine;
use crate::engine::types::CodecEngine;
use crate::types::StreamError;

/// Stable backend identifiers.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Pass-through PCM engine, always compiled.
    Raw     = 0x0000,
    /// Native libopus through the `opus` crate.
    Libopus = 0x0001,
}

/// Preference order used when the config does not pin an engine.
pub const DEFAULT_ENGINE_PREFERENCE: &[EngineKind] = &[EngineKind::Libopus];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub kind: EngineKind,
    pub name: &'static str,
    pub compiled: bool,
    pub supports_parallel: bool,
}

pub fn resolve(kind: EngineKind) -> EngineInfo {
    match kind {
        EngineKind::Raw => EngineInfo {
            kind,
            name: "raw",
            compiled: true,
            supports_parallel: true,
        },
        EngineKind::Libopus => EngineInfo {
            kind,
            name: "libopus",
            compiled: cfg!(feature = "libopus"),
            supports_parallel: false,
        },
    }
}

/// Every backend compiled into this build.
pub fn available_engines() -> Vec<EngineKind> {
    [EngineKind::Libopus, EngineKind::Raw]
        .into_iter()
        .filter(|k| resolve(*k).compiled)
        .collect()
}

/// Pick the first compiled backend from `preferences`.
pub fn select_engine(preferences: &[EngineKind]) -> Result<EngineKind, StreamError> {
    preferences
        .iter()
        .copied()
        .find(|k| resolve(*k).compiled)
        .ok_or_else(|| {
            StreamError::config(format!(
                "no codec engine available (wanted one of {:?}, compiled: {:?})",
                preferences,
                available_engines()
            ))
        })
}

/// Engine the registry hands out when nothing is pinned.
pub fn default_engine() -> Option<EngineKind> {
    select_engine(DEFAULT_ENGINE_PREFERENCE).ok()
}

/// Build an engine instance for `config`.
pub fn create_engine(kind: EngineKind, config: &StreamConfig) -> Result<Box<dyn CodecEngine>, StreamError> {
    match kind {
        EngineKind::Raw => Ok(Box::new(RawEngine::new(config.channels))),
        #[cfg(feature = "libopus")]
        EngineKind::Libopus => {
            let engine = crate::engine::backends::libopus::LibopusEngine::new(
                config.rate,
                config.channels,
                config.application,
            )?;
            Ok(Box::new(engine))
        }
        #[cfg(not(feature = "libopus"))]
        EngineKind::Libopus => Err(StreamError::config(
            "libopus engine not compiled in (enable the `libopus` feature)",
        )),
    }
}

/// Resolve the engine `config` asks for (or the default) and build it.
pub fn engine_for(config: &StreamConfig) -> Result<Box<dyn CodecEngine>, StreamError> {
    let kind = match config.engine {
        Some(kind) => select_engine(&[kind])?,
        None => select_engine(DEFAULT_ENGINE_PREFERENCE)?,
    };
    tracing::debug!(engine = resolve(kind).name, "codec engine selected");
    create_engine(kind, config)
}
