//! Encoder configuration
//!
//! A plain value struct describing the target stream. The configuration is
//! immutable once accepted by `configure`; profile/level/constraint-set
//! fields are forwarded to the backend only when positive.

use serde::{Deserialize, Serialize};

/// Sentinel framerate meaning the encoder decides on its own.
pub const ANY_FRAMERATE: i32 = -1;

/// Cyclic intra-refresh mode.
pub const INTRA_REFRESH_CYCLIC: i32 = 0;

/// Default bitrate of 5 MBit/s.
const DEFAULT_BITRATE: u32 = 5_000_000;

/// Default keyframe interval of 15 seconds.
const DEFAULT_I_FRAME_INTERVAL_SECS: i32 = 15;

/// Target stream configuration for the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Target framerate; [`ANY_FRAMERATE`] lets the encoder decide.
    pub framerate: i32,

    /// Target bitrate in bits per second (constant-bitrate control).
    pub bitrate: u32,

    /// Intra-refresh mode forwarded to the backend.
    pub intra_refresh_mode: i32,

    /// Keyframe interval in seconds; forwarded only when positive.
    pub i_frame_interval_secs: i32,

    /// H.264 profile indication; forwarded only when positive.
    pub profile_idc: i32,

    /// H.264 level indication; forwarded only when positive.
    pub level_idc: i32,

    /// H.264 constraint-set flags; forwarded only when positive.
    pub constraint_set: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            framerate: ANY_FRAMERATE,
            bitrate: DEFAULT_BITRATE,
            intra_refresh_mode: INTRA_REFRESH_CYCLIC,
            i_frame_interval_secs: DEFAULT_I_FRAME_INTERVAL_SECS,
            profile_idc: 0,
            level_idc: 0,
            constraint_set: 0,
        }
    }
}

impl EncoderConfig {
    /// Create a configuration with the given dimensions and the default
    /// rate-control settings.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Cyclic intra-refresh macroblock count.
    ///
    /// 10% of all macroblocks in a frame get refreshed at one time, so a
    /// whole frame is updated after about 10 frames. Integer division at
    /// each step is deliberate.
    pub fn intra_refresh_mbs(&self) -> i32 {
        let mbs_x = (self.width as i32 + 15) / 16;
        let mbs_y = (self.height as i32 + 15) / 16;
        mbs_x * mbs_y * 10 / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.framerate, ANY_FRAMERATE);
        assert_eq!(config.bitrate, 5_000_000);
        assert_eq!(config.i_frame_interval_secs, 15);
        assert_eq!(config.intra_refresh_mode, INTRA_REFRESH_CYCLIC);
        assert_eq!(config.profile_idc, 0);
    }

    #[test]
    fn test_intra_refresh_mbs_vga() {
        // ((640+15)/16) * ((480+15)/16) * 10 / 100 = 40 * 30 * 10 / 100
        let config = EncoderConfig::with_resolution(640, 480);
        assert_eq!(config.intra_refresh_mbs(), 120);
    }

    #[test]
    fn test_intra_refresh_mbs_720p() {
        // 80 * 45 macroblocks
        let config = EncoderConfig::with_resolution(1280, 720);
        assert_eq!(config.intra_refresh_mbs(), 360);
    }

    #[test]
    fn test_intra_refresh_mbs_rounds_up_partial_macroblocks() {
        // 1081 rows span 68 macroblock rows, not 67.
        let config = EncoderConfig::with_resolution(1920, 1081);
        assert_eq!(config.intra_refresh_mbs(), 120 * 68 * 10 / 100);
    }

    #[test]
    fn test_with_resolution_keeps_rate_defaults() {
        let config = EncoderConfig::with_resolution(1920, 1080);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.bitrate, EncoderConfig::default().bitrate);
    }
}
