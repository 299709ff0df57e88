#![forbid(unsafe_code)]

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use dc_meta::MetaError;
use dc_profile::{DiffVerdict, ProfileError, profile_diffs};
use dc_types::{ConfigError, TestConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Eager prefetch assumes short sequences; above this length the loader
/// emits a performance advisory but continues.
pub const LONG_SEQUENCE_ADVISORY: usize = 50;

/// The four files every fixture case must provide, by fixed suffix.
pub const REQUIRED_FIXTURE_FILES: [(&str, &str); 4] = [
    ("input_pixels", ".Input.raw"),
    ("input_metadata", ".Input.csv"),
    ("output_pixels", ".Output.raw"),
    ("output_metadata", ".Output.csv"),
];

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Meta(#[from] MetaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Where fixture files live. Defaults to the platform temp directory, the
/// drop target of the reference recorder.
#[derive(Debug, Clone)]
pub struct FixtureLayout {
    pub root: PathBuf,
}

impl FixtureLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Case-level file: `<root>/<case>.0<suffix>`. Frame sequences are
    /// always zero-indexed in the fixture naming convention.
    #[must_use]
    pub fn case_file(&self, case: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{case}.0{suffix}"))
    }

    /// Per-frame pixel file referenced by name from the metadata.
    #[must_use]
    pub fn frame_path(&self, frame_name: &str) -> PathBuf {
        self.root.join(frame_name)
    }
}

impl Default for FixtureLayout {
    fn default() -> Self {
        Self::temp()
    }
}

/// A record in the per-case diagnostic ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseRecord {
    /// Named context value captured for failure reports.
    Capture { name: String, value: String },
    /// Informational only; never affects pass/fail.
    Warning { message: String },
    /// A recorded check with continue-on-failure semantics.
    Check {
        name: String,
        pass: bool,
        detail: String,
    },
}

/// Per-case reporting sink: captures, warnings and recorded checks, in the
/// order they were produced. Warnings are mirrored to the tracing layer.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLedger {
    records: Vec<CaseRecord>,
}

impl CaseLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn capture(&mut self, name: &str, value: impl Display) {
        self.records.push(CaseRecord::Capture {
            name: name.to_owned(),
            value: value.to_string(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.records.push(CaseRecord::Warning { message });
    }

    /// Record one check outcome without aborting; returns `pass` so callers
    /// can combine results.
    pub fn check(&mut self, name: &str, pass: bool, detail: impl Into<String>) -> bool {
        let detail = detail.into();
        if !pass {
            tracing::warn!(check = name, detail = %detail, "recorded check failed");
        }
        self.records.push(CaseRecord::Check {
            name: name.to_owned(),
            pass,
            detail,
        });
        pass
    }

    #[must_use]
    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<CaseRecord> {
        self.records
    }

    #[must_use]
    pub fn failed_checks(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, CaseRecord::Check { pass: false, .. }))
            .count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, CaseRecord::Warning { .. }))
            .count()
    }
}

/// Loader result. Missing fixture files are an expected condition (fixtures
/// are not checked into every environment), so they skip rather than fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(TestConfig),
    Skipped { missing: Vec<PathBuf> },
}

/// Locate, parse, merge, prefetch and validate one fixture case.
///
/// Fatal errors (malformed metadata, padding mismatch, invariant
/// violations) come back as `Err` with the configuration context already
/// captured in the ledger; absent files come back as `Ok(Skipped)`.
pub fn load_test_case(
    layout: &FixtureLayout,
    name: &str,
    ledger: &mut CaseLedger,
) -> Result<LoadOutcome, HarnessError> {
    let mut missing = Vec::new();
    for (role, suffix) in REQUIRED_FIXTURE_FILES {
        let path = layout.case_file(name, suffix);
        ledger.capture(role, path.display());
        if !path.exists() {
            ledger.warn(format!(
                "required test file is not present: {}; case will be skipped",
                path.display()
            ));
            missing.push(path);
        }
    }
    if !missing.is_empty() {
        return Ok(LoadOutcome::Skipped { missing });
    }

    let input_meta = dc_meta::parse_metadata(&layout.case_file(name, ".Input.csv"))?;
    let output_meta = dc_meta::parse_metadata(&layout.case_file(name, ".Output.csv"))?;

    let mut config = TestConfig {
        name: name.to_owned(),
        frames_sequence_size: input_meta.frames_sequence_size,
        ..TestConfig::default()
    };
    if config.frames_sequence_size > LONG_SEQUENCE_ADVISORY {
        ledger.warn(format!(
            "input sequence is long ({} frames); prefetch performance may suffer",
            config.frames_sequence_size
        ));
    }

    config.input_frame_names = input_meta.input_frame_names;
    // The metadata parser is role-agnostic: the output parse carries its
    // frame names in the input-side field.
    config.output_frame_names = output_meta.input_frame_names;

    // Prefetch the whole sequence eagerly, in frame order. Buffer position
    // must equal frame index.
    for index in 0..config.frames_sequence_size {
        let input_name = config
            .input_frame_names
            .get(index)
            .ok_or(MetaError::MissingFrameName { index })?;
        let output_name = config
            .output_frame_names
            .get(index)
            .ok_or(MetaError::MissingFrameName { index })?;
        config
            .input_frames
            .push(fs::read(layout.frame_path(input_name))?);
        config
            .output_frames
            .push(fs::read(layout.frame_path(output_name))?);
    }

    config.input_res_x = input_meta.input_res_x;
    config.input_res_y = input_meta.input_res_y;
    config.output_res_x = output_meta.input_res_x;
    config.output_res_y = output_meta.input_res_y;
    config.depth_units = input_meta.depth_units;
    config.focal_length = input_meta.focal_length;
    // Fixture metadata stores the baseline in meters; the filter pipeline
    // works in millimeters.
    config.stereo_baseline = input_meta.stereo_baseline * 1000.0;
    config.downsample_scale = output_meta.downsample_scale;
    config.spatial = output_meta.spatial;
    config.temporal = output_meta.temporal;
    config.holes = output_meta.holes;

    capture_config(ledger, &config);
    config.validate()?;

    Ok(LoadOutcome::Loaded(config))
}

fn capture_config(ledger: &mut CaseLedger, config: &TestConfig) {
    ledger.capture("name", &config.name);
    ledger.capture("input_res_x", config.input_res_x);
    ledger.capture("input_res_y", config.input_res_y);
    ledger.capture("output_res_x", config.output_res_x);
    ledger.capture("output_res_y", config.output_res_y);
    ledger.capture("downsample_scale", config.downsample_scale);
    ledger.capture("depth_units", config.depth_units);
    ledger.capture("focal_length", config.focal_length);
    ledger.capture("stereo_baseline", config.stereo_baseline);
    ledger.capture("spatial_filter", config.spatial.enabled);
    ledger.capture("spatial_alpha", config.spatial.alpha);
    ledger.capture("spatial_delta", config.spatial.delta);
    ledger.capture("spatial_iterations", config.spatial.iterations);
    ledger.capture("temporal_filter", config.temporal.enabled);
    ledger.capture("temporal_alpha", config.temporal.alpha);
    ledger.capture("temporal_delta", config.temporal.delta);
    ledger.capture("temporal_persistence", config.temporal.persistence);
    ledger.capture("holes_filter", config.holes.enabled);
    ledger.capture("holes_filling_mode", config.holes.mode);
    ledger.capture("frames_sequence_size", config.frames_sequence_size);
    for (index, frame) in config.input_frames.iter().enumerate() {
        ledger.capture(&format!("input_frame_{index}_bytes"), frame.len());
    }
    for (index, frame) in config.output_frames.iter().enumerate() {
        ledger.capture(&format!("output_frame_{index}_bytes"), frame.len());
    }
}

/// Profile one frame's difference signal and record both threshold checks
/// in the ledger with continue-on-failure semantics.
pub fn profile_case_frame(
    dump_path: &Path,
    samples: &[f32],
    max_allowed_std: f32,
    outlier: f32,
    frame_idx: usize,
    ledger: &mut CaseLedger,
) -> Result<DiffVerdict, HarnessError> {
    let verdict = profile_diffs(dump_path, samples, max_allowed_std, outlier, frame_idx)?;

    ledger.capture("frame_idx", frame_idx);
    ledger.capture("pixels", verdict.profile.samples);
    ledger.capture("mean", verdict.profile.mean);
    ledger.capture("standard_deviation", verdict.profile.std_dev);
    ledger.capture("max_val", verdict.profile.peak);
    ledger.capture("max_val_index", verdict.profile.peak_index);
    ledger.capture("non_identical_count", verdict.profile.non_identical);
    if let Some(first) = verdict.profile.first_divergence {
        ledger.capture("first_non_identical_index", first.index);
        ledger.capture("first_difference", first.value);
        ledger.warn(format!(
            "frame {frame_idx}: non-identical pixels = {}, first diff = {} at index {}, max_diff = {} at index {}",
            verdict.profile.non_identical,
            first.value,
            first.index,
            verdict.profile.peak,
            verdict.profile.peak_index
        ));
    }

    ledger.check(
        "std_dev_within_budget",
        verdict.std_dev_ok,
        format!(
            "standard_deviation={} max_allowed_std={max_allowed_std}",
            verdict.profile.std_dev
        ),
    );
    ledger.check(
        "peak_within_outlier",
        verdict.peak_ok,
        format!("peak={} outlier={outlier}", verdict.profile.peak),
    );

    Ok(verdict)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Loaded,
    Skipped,
    Failed,
}

/// Machine-readable record of one case run, ledger included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub case: String,
    pub status: CaseStatus,
    pub error: Option<String>,
    pub records: Vec<CaseRecord>,
}

/// Write the accumulated case reports as pretty-printed JSON.
pub fn write_reports(path: &Path, reports: &[CaseReport]) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(reports)?)?;
    Ok(())
}
