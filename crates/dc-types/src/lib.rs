#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fixture pixel buffers hold 16-bit depth values.
pub const DEPTH_PIXEL_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    pub enabled: bool,
    pub alpha: f32,
    pub delta: u8,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalParams {
    pub enabled: bool,
    pub alpha: f32,
    pub delta: u8,
    pub persistence: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HolesParams {
    pub enabled: bool,
    pub mode: u32,
}

/// One filter test scenario, assembled by the fixture loader from a pair of
/// metadata files plus the raw per-frame pixel buffers they name.
///
/// Constructed default, populated by the loader's two-phase merge, then
/// treated as frozen for the duration of a single test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    pub input_res_x: u32,
    pub input_res_y: u32,
    pub output_res_x: u32,
    pub output_res_y: u32,
    pub downsample_scale: u32,
    /// Scale factor for raw depth values.
    pub depth_units: f32,
    pub focal_length: f32,
    /// Stored in millimeters. Fixture metadata carries meters; the loader
    /// converts on ingestion.
    pub stereo_baseline: f32,
    pub spatial: SpatialParams,
    pub temporal: TemporalParams,
    pub holes: HolesParams,
    pub frames_sequence_size: usize,
    pub input_frame_names: Vec<String>,
    pub output_frame_names: Vec<String>,
    #[serde(skip)]
    pub input_frames: Vec<Vec<u8>>,
    #[serde(skip)]
    pub output_frames: Vec<Vec<u8>>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            input_res_x: 0,
            input_res_y: 0,
            output_res_x: 0,
            output_res_y: 0,
            downsample_scale: 1,
            depth_units: 0.0,
            focal_length: 0.0,
            stereo_baseline: 0.0,
            spatial: SpatialParams::default(),
            temporal: TemporalParams::default(),
            holes: HolesParams::default(),
            frames_sequence_size: 0,
            input_frame_names: Vec::new(),
            output_frame_names: Vec::new(),
            input_frames: Vec::new(),
            output_frames: Vec::new(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("downsample scale must be a positive integer")]
    ZeroDownsampleScale,
    #[error("{field} must be strictly positive")]
    ZeroResolution { field: &'static str },
    #[error("declared output_res_{axis}={declared} does not match the padded expectation {expected}")]
    OutputResolutionMismatch {
        axis: &'static str,
        declared: u32,
        expected: u32,
    },
    #[error("{field}={value} must be strictly positive")]
    NonPositiveCalibration { field: &'static str, value: f32 },
    #[error("frame sequence must contain at least one frame")]
    EmptyFrameSequence,
    #[error("{role} frame count {actual} does not match declared sequence length {expected}")]
    FrameCount {
        role: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{role} frame {index} holds {actual} bytes but the resolution implies {expected}")]
    FrameBufferSize {
        role: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{filter} {parameter}={value} is outside [{min}, {max}]")]
    ParameterOutOfRange {
        filter: &'static str,
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Output dimensions are always rounded up to the next multiple of 4: the
/// filter pipeline's block-alignment rule. Integer arithmetic throughout.
pub fn padded_output_extent(input: u32, scale: u32) -> Result<u32, ConfigError> {
    if scale == 0 {
        return Err(ConfigError::ZeroDownsampleScale);
    }
    Ok(((input / scale) + 3) / 4 * 4)
}

impl TestConfig {
    /// The output resolution the padding rule predicts for this input
    /// resolution and downsample scale.
    pub fn expected_output_resolution(&self) -> Result<(u32, u32), ConfigError> {
        Ok((
            padded_output_extent(self.input_res_x, self.downsample_scale)?,
            padded_output_extent(self.input_res_y, self.downsample_scale)?,
        ))
    }

    fn expected_frame_bytes(res_x: u32, res_y: u32) -> usize {
        res_x as usize * res_y as usize * DEPTH_PIXEL_BYTES
    }

    /// Enforce every load-time invariant. The first violation is returned;
    /// any violation is fatal for the test case.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (expected_x, expected_y) = self.expected_output_resolution()?;
        if self.output_res_x != expected_x {
            return Err(ConfigError::OutputResolutionMismatch {
                axis: "x",
                declared: self.output_res_x,
                expected: expected_x,
            });
        }
        if self.output_res_y != expected_y {
            return Err(ConfigError::OutputResolutionMismatch {
                axis: "y",
                declared: self.output_res_y,
                expected: expected_y,
            });
        }

        for (field, value) in [
            ("input_res_x", self.input_res_x),
            ("input_res_y", self.input_res_y),
            ("output_res_x", self.output_res_x),
            ("output_res_y", self.output_res_y),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroResolution { field });
            }
        }

        if !(self.depth_units > 0.0) {
            return Err(ConfigError::NonPositiveCalibration {
                field: "depth_units",
                value: self.depth_units,
            });
        }
        if !(self.focal_length > 0.0) {
            return Err(ConfigError::NonPositiveCalibration {
                field: "focal_length",
                value: self.focal_length,
            });
        }
        if !(self.stereo_baseline.abs() > 0.0) {
            return Err(ConfigError::NonPositiveCalibration {
                field: "stereo_baseline",
                value: self.stereo_baseline,
            });
        }

        if self.frames_sequence_size == 0 {
            return Err(ConfigError::EmptyFrameSequence);
        }
        for (role, frames) in [
            ("input", &self.input_frames),
            ("output", &self.output_frames),
        ] {
            if frames.len() != self.frames_sequence_size {
                return Err(ConfigError::FrameCount {
                    role,
                    expected: self.frames_sequence_size,
                    actual: frames.len(),
                });
            }
        }

        let input_bytes = Self::expected_frame_bytes(self.input_res_x, self.input_res_y);
        for (index, frame) in self.input_frames.iter().enumerate() {
            if frame.len() != input_bytes {
                return Err(ConfigError::FrameBufferSize {
                    role: "input",
                    index,
                    expected: input_bytes,
                    actual: frame.len(),
                });
            }
        }
        let output_bytes = Self::expected_frame_bytes(self.output_res_x, self.output_res_y);
        for (index, frame) in self.output_frames.iter().enumerate() {
            if frame.len() != output_bytes {
                return Err(ConfigError::FrameBufferSize {
                    role: "output",
                    index,
                    expected: output_bytes,
                    actual: frame.len(),
                });
            }
        }

        // Parameter thresholds mirror the filter intrinsics.
        if self.spatial.enabled {
            check_range("spatial", "alpha", f64::from(self.spatial.alpha), 0.25, 1.0)?;
            check_range("spatial", "delta", f64::from(self.spatial.delta), 1.0, 50.0)?;
            check_range(
                "spatial",
                "iterations",
                f64::from(self.spatial.iterations),
                1.0,
                5.0,
            )?;
        }
        if self.temporal.enabled {
            check_range("temporal", "alpha", f64::from(self.temporal.alpha), 0.0, 1.0)?;
            check_range("temporal", "delta", f64::from(self.temporal.delta), 1.0, 100.0)?;
            check_range(
                "temporal",
                "persistence",
                f64::from(self.temporal.persistence),
                0.0,
                8.0,
            )?;
        }
        if self.holes.enabled {
            check_range("holes", "mode", f64::from(self.holes.mode), 0.0, 2.0)?;
        }

        Ok(())
    }
}

fn check_range(
    filter: &'static str,
    parameter: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::ParameterOutOfRange {
            filter,
            parameter,
            value,
            min,
            max,
        });
    }
    Ok(())
}
