#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use dc_types::TestConfig;
use thiserror::Error;

/// The fixture metadata format has no explicit end marker; the recorder
/// terminates a file with free-form trailer lines instead. Two lines that
/// fail to split into a key/value pair (cumulative, not consecutive) are
/// therefore treated as end-of-file. Existing fixture files rely on this
/// rule, so it must not change.
pub const INVALID_LINE_STRIKES: u32 = 2;

/// Per-frame pixel files referenced from the metadata carry this suffix.
pub const FRAME_FILE_SUFFIX: &str = ".raw";

#[derive(Debug, Error)]
pub enum MetaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("attribute {key:?} holds non-numeric value {value:?}")]
    InvalidNumber { key: String, value: String },
    #[error("metadata declares an empty frame sequence")]
    EmptyFrameSequence,
    #[error("frame index key {index} is missing from the metadata dictionary")]
    MissingFrameName { index: usize },
}

/// The semantic attributes the projection recognizes. Everything else in the
/// dictionary is carried but ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    ResX,
    ResY,
    FocalLength,
    DepthUnits,
    StereoBaseline,
    Downscale,
    SpatialMarker,
    SpatialAlpha,
    SpatialDelta,
    SpatialIterations,
    TemporalMarker,
    TemporalAlpha,
    TemporalDelta,
    TemporalPersistence,
    HolesMarker,
    HolesMode,
    FramesSequenceLength,
}

impl Attr {
    /// Literal key names as written by the reference recorder.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ResX => "Resolution_x",
            Self::ResY => "Resolution_y",
            Self::FocalLength => "Focal Length",
            Self::DepthUnits => "Depth Units",
            Self::StereoBaseline => "Stereo Baseline",
            Self::Downscale => "Scale",
            Self::SpatialMarker => "Spatial Filter Params:",
            Self::SpatialAlpha => "SpatialAlpha",
            Self::SpatialDelta => "SpatialDelta",
            Self::SpatialIterations => "SpatialIterations",
            Self::TemporalMarker => "Temporal Filter Params:",
            Self::TemporalAlpha => "TemporalAlpha",
            Self::TemporalDelta => "TemporalDelta",
            Self::TemporalPersistence => "TemporalPersistency",
            Self::HolesMarker => "Holes Filling Mode:",
            Self::HolesMode => "HolesFilling",
            Self::FramesSequenceLength => "Frames sequence length",
        }
    }
}

/// Raw key/value mapping for one metadata file. Transient: discarded after
/// projection into a `TestConfig`.
pub type AttributeDict = BTreeMap<String, String>;

/// Split each line on the first `,`. The key is the prefix; the value is the
/// first whitespace-delimited token of the remainder (EOL discrepancies in
/// recorded files make the tail untrustworthy). Duplicate keys: last wins.
/// Lines without a `,` count as invalid and trigger the two-strikes
/// termination rule.
#[must_use]
pub fn parse_dict(text: &str) -> AttributeDict {
    let mut dict = AttributeDict::new();
    let mut strikes = 0;

    for line in text.lines() {
        match line.split_once(',') {
            Some((key, rest)) => {
                let value = rest.split_whitespace().next().unwrap_or_default();
                dict.insert(key.to_owned(), value.to_owned());
            }
            None => {
                strikes += 1;
                if strikes >= INVALID_LINE_STRIKES {
                    break;
                }
            }
        }
    }

    dict
}

/// Project the recognized attributes into a partially populated
/// `TestConfig`.
///
/// The projection does not distinguish input-frame from output-frame
/// metadata: resolution and frame names always land in the input-side
/// fields, and the caller assigns the semantic role during the merge. The
/// three filter marker keys toggle their enable flags by presence alone;
/// their values are ignored.
pub fn project_config(dict: &AttributeDict) -> Result<TestConfig, MetaError> {
    let mut cfg = TestConfig {
        input_res_x: parse_attr(dict, Attr::ResX)?.unwrap_or(0),
        input_res_y: parse_attr(dict, Attr::ResY)?.unwrap_or(0),
        focal_length: parse_attr(dict, Attr::FocalLength)?.unwrap_or(0.0),
        depth_units: parse_attr(dict, Attr::DepthUnits)?.unwrap_or(0.0),
        stereo_baseline: parse_attr(dict, Attr::StereoBaseline)?.unwrap_or(0.0),
        downsample_scale: parse_attr(dict, Attr::Downscale)?.unwrap_or(1),
        ..TestConfig::default()
    };

    cfg.spatial.enabled = dict.contains_key(Attr::SpatialMarker.key());
    cfg.spatial.alpha = parse_attr(dict, Attr::SpatialAlpha)?.unwrap_or(0.0);
    cfg.spatial.delta = parse_attr(dict, Attr::SpatialDelta)?.unwrap_or(0);
    cfg.spatial.iterations = parse_attr(dict, Attr::SpatialIterations)?.unwrap_or(0);

    cfg.temporal.enabled = dict.contains_key(Attr::TemporalMarker.key());
    cfg.temporal.alpha = parse_attr(dict, Attr::TemporalAlpha)?.unwrap_or(0.0);
    cfg.temporal.delta = parse_attr(dict, Attr::TemporalDelta)?.unwrap_or(0);
    cfg.temporal.persistence = parse_attr(dict, Attr::TemporalPersistence)?.unwrap_or(0);

    cfg.holes.enabled = dict.contains_key(Attr::HolesMarker.key());
    cfg.holes.mode = parse_attr(dict, Attr::HolesMode)?.unwrap_or(0);

    cfg.frames_sequence_size = parse_attr(dict, Attr::FramesSequenceLength)?.unwrap_or(0);
    if cfg.frames_sequence_size == 0 {
        // Without a frame count the caller cannot know what to load.
        return Err(MetaError::EmptyFrameSequence);
    }

    for index in 0..cfg.frames_sequence_size {
        let stem = dict
            .get(index.to_string().as_str())
            .ok_or(MetaError::MissingFrameName { index })?;
        cfg.input_frame_names
            .push(format!("{stem}{FRAME_FILE_SUFFIX}"));
    }

    Ok(cfg)
}

/// Parse one metadata file into a partial configuration.
pub fn parse_metadata(path: &Path) -> Result<TestConfig, MetaError> {
    let text = fs::read_to_string(path)?;
    project_config(&parse_dict(&text))
}

fn parse_attr<T: FromStr>(dict: &AttributeDict, attr: Attr) -> Result<Option<T>, MetaError> {
    match dict.get(attr.key()) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| MetaError::InvalidNumber {
                key: attr.key().to_owned(),
                value: raw.clone(),
            }),
        None => Ok(None),
    }
}
