//! config.rs
//! Stream construction options.
//!
//! Keys mirror the recognized option names (`rate`, `channels`, `frameSize`,
//! `application`, `parallel`) so configs can be loaded straight from JSON.

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::types::{FrameGeometry, StreamError};

/// Encoding-profile hint handed to the engine (libopus application values).
#[repr(i32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Application {
    Voip               = 2048,
    #[default]
    Audio              = 2049,
    RestrictedLowdelay = 2051,
}

fn default_parallel() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    pub rate: u32,
    pub channels: u16,

    /// Samples per channel per frame. Required by the encoder.
    #[serde(default)]
    pub frame_size: Option<usize>,

    #[serde(default)]
    pub application: Application,

    /// Enables engine-level parallel work when the engine supports it.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Pin a backend instead of using the registry preference.
    #[serde(default)]
    pub engine: Option<EngineKind>,

    // Initial controls, applied through the StreamBase setters at construction.
    #[serde(default)]
    pub bitrate: Option<i32>,
    #[serde(default)]
    pub fec: Option<bool>,
    #[serde(default)]
    pub packet_loss: Option<f64>,
}

impl StreamConfig {
    pub fn new(rate: u32, channels: u16) -> Self {
        Self {
            rate,
            channels,
            frame_size: None,
            application: Application::default(),
            parallel: default_parallel(),
            engine: None,
            bitrate: None,
            fec: None,
            packet_loss: None,
        }
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = Some(frame_size);
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.application = application;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_bitrate(mut self, bitrate: i32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_fec(mut self, enabled: bool) -> Self {
        self.fec = Some(enabled);
        self
    }

    pub fn with_packet_loss(mut self, fraction: f64) -> Self {
        self.packet_loss = Some(fraction);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        serde_json::from_str(json).map_err(|e| StreamError::config(format!("invalid stream config: {e}")))
    }

    /// Geometry for the encode direction.
    ///
    /// A zero-sized frame would never complete, so it is rejected here rather
    /// than left to the engine.
    pub fn encoder_geometry(&self) -> Result<FrameGeometry, StreamError> {
        let frame_size = self
            .frame_size
            .ok_or_else(|| StreamError::config("frameSize is required for encoding"))?;
        if frame_size == 0 {
            return Err(StreamError::config("frameSize must be non-zero"));
        }
        if self.channels == 0 {
            return Err(StreamError::config("channels must be non-zero"));
        }
        let geometry = FrameGeometry::new(self.rate, self.channels, frame_size);
        if geometry.checked_required_bytes().is_none() {
            return Err(StreamError::config(format!(
                "frameSize {frame_size} with {} channels overflows the frame length",
                self.channels
            )));
        }
        Ok(geometry)
    }

    /// Geometry for the decode direction. `frame_size` is 0 when not configured.
    pub fn decoder_geometry(&self) -> Result<FrameGeometry, StreamError> {
        if self.channels == 0 {
            return Err(StreamError::config("channels must be non-zero"));
        }
        Ok(FrameGeometry::new(self.rate, self.channels, self.frame_size.unwrap_or(0)))
    }
}
