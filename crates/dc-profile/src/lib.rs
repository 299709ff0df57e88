#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("diff profile requires at least one sample")]
    EmptySampleSet,
}

/// Location and value of the first non-zero difference in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirstDivergence {
    pub index: usize,
    pub value: f32,
}

/// Distributional summary of one frame's difference signal.
///
/// `peak` is the maximum SIGNED value, matching the fixture corpus: the
/// outlier threshold is applied to `peak.abs()`, not to the extremum of
/// absolute values. `min`/`min_index` are recorded purely as diagnostics so
/// the asymmetry is visible in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffProfile {
    pub samples: usize,
    pub mean: f32,
    pub std_dev: f32,
    pub peak: f32,
    pub peak_index: usize,
    pub min: f32,
    pub min_index: usize,
    pub non_identical: usize,
    pub first_divergence: Option<FirstDivergence>,
}

/// Outcome of profiling one frame against caller-supplied thresholds. Both
/// sub-checks are always evaluated so a single run surfaces both failure
/// modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffVerdict {
    pub frame_idx: usize,
    pub max_allowed_std: f32,
    pub outlier: f32,
    pub std_dev_ok: bool,
    pub peak_ok: bool,
    pub profile: DiffProfile,
}

impl DiffVerdict {
    #[must_use]
    pub fn pass(&self) -> bool {
        self.std_dev_ok && self.peak_ok
    }
}

/// Compute the statistics without any file side effect.
pub fn compute_profile(samples: &[f32]) -> Result<DiffProfile, ProfileError> {
    if samples.is_empty() {
        return Err(ProfileError::EmptySampleSet);
    }

    let count = samples.len();
    let mean = samples.iter().map(|&v| f64::from(v)).sum::<f64>() / count as f64;

    let mut peak = samples[0];
    let mut peak_index = 0;
    let mut min = samples[0];
    let mut min_index = 0;
    let mut non_identical = 0;
    let mut first_divergence = None;
    for (index, &value) in samples.iter().enumerate() {
        if value != 0.0 {
            non_identical += 1;
            if first_divergence.is_none() {
                first_divergence = Some(FirstDivergence { index, value });
            }
        }
        if value > peak {
            peak = value;
            peak_index = index;
        }
        if value < min {
            min = value;
            min_index = index;
        }
    }

    // Population standard deviation over the full sequence.
    let variance = samples
        .iter()
        .map(|&v| {
            let delta = f64::from(v) - mean;
            delta * delta
        })
        .sum::<f64>()
        / count as f64;

    Ok(DiffProfile {
        samples: count,
        mean: mean as f32,
        std_dev: variance.sqrt() as f32,
        peak,
        peak_index,
        min,
        min_index,
        non_identical,
        first_divergence,
    })
}

/// Persist the raw sequence, one value per line, for offline plotting.
pub fn dump_samples(path: &Path, samples: &[f32]) -> Result<(), ProfileError> {
    let mut out = BufWriter::new(File::create(path)?);
    for value in samples {
        writeln!(out, "{value}")?;
    }
    out.flush()?;
    Ok(())
}

/// Profile one frame's difference signal against the thresholds.
///
/// The dump is written unconditionally, before any statistic is computed,
/// so every run leaves an inspectable artifact even when it passes.
pub fn profile_diffs(
    dump_path: &Path,
    samples: &[f32],
    max_allowed_std: f32,
    outlier: f32,
    frame_idx: usize,
) -> Result<DiffVerdict, ProfileError> {
    dump_samples(dump_path, samples)?;

    let profile = compute_profile(samples)?;

    if profile.peak != 0.0 {
        tracing::warn!(
            frame_idx,
            non_identical = profile.non_identical,
            first_divergence = ?profile.first_divergence,
            peak = profile.peak,
            peak_index = profile.peak_index,
            "profiled frame contains non-identical pixels"
        );
    }

    // Both checks evaluate even when one has already failed.
    let std_dev_ok = profile.std_dev <= max_allowed_std;
    let peak_ok = profile.peak.abs() <= outlier;

    Ok(DiffVerdict {
        frame_idx,
        max_allowed_std,
        outlier,
        std_dev_ok,
        peak_ok,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ProfileError, compute_profile, profile_diffs};

    #[test]
    fn empty_sample_set_is_fatal() {
        let err = compute_profile(&[]).expect_err("must fail");
        assert!(matches!(err, ProfileError::EmptySampleSet));
    }

    #[test]
    fn all_zero_sequence_passes_any_nonnegative_thresholds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dump = dir.path().join("zeros.txt");
        let verdict =
            profile_diffs(&dump, &[0.0; 16], 0.0, 0.0, 0).expect("profile");
        assert_eq!(verdict.profile.std_dev, 0.0);
        assert_eq!(verdict.profile.peak, 0.0);
        assert_eq!(verdict.profile.non_identical, 0);
        assert!(verdict.profile.first_divergence.is_none());
        assert!(verdict.pass());
    }

    #[test]
    fn single_outlier_shapes_mean_and_peak() {
        let mut samples = vec![0.0_f32; 10];
        samples[7] = 5.0;
        let profile = compute_profile(&samples).expect("profile");
        assert_eq!(profile.mean, 0.5);
        assert_eq!(profile.peak, 5.0);
        assert_eq!(profile.peak_index, 7);
        assert_eq!(profile.non_identical, 1);
        let first = profile.first_divergence.expect("divergence");
        assert_eq!((first.index, first.value), (7, 5.0));
    }

    #[test]
    fn outlier_above_threshold_fails_regardless_of_std() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut samples = vec![0.0_f32; 1000];
        samples[3] = 50.0;
        let verdict =
            profile_diffs(&dir.path().join("d.txt"), &samples, 1e6, 20.0, 2).expect("profile");
        assert!(verdict.std_dev_ok);
        assert!(!verdict.peak_ok);
        assert!(!verdict.pass());
    }

    #[test]
    fn both_checks_report_independently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let samples = [0.0_f32, 0.0, 40.0, -40.0];
        let verdict =
            profile_diffs(&dir.path().join("d.txt"), &samples, 0.1, 10.0, 0).expect("profile");
        assert!(!verdict.std_dev_ok);
        assert!(!verdict.peak_ok);
    }

    #[test]
    fn peak_tracks_signed_maximum_not_absolute_extremum() {
        // A large negative excursion does not become the peak; it is only
        // visible through the min diagnostics.
        let samples = [-100.0_f32, 1.0, 2.0];
        let profile = compute_profile(&samples).expect("profile");
        assert_eq!(profile.peak, 2.0);
        assert_eq!(profile.min, -100.0);
        assert_eq!(profile.min_index, 0);
    }

    #[test]
    fn negative_peak_evades_outlier_check_like_the_fixture_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let samples = [-100.0_f32, 1.0, 2.0];
        let verdict =
            profile_diffs(&dir.path().join("d.txt"), &samples, 1e6, 10.0, 0).expect("profile");
        assert!(verdict.peak_ok, "signed-max semantics preserved");
    }

    #[test]
    fn population_std_dev_matches_closed_form() {
        let samples = [1.0_f32, 3.0];
        let profile = compute_profile(&samples).expect("profile");
        assert_eq!(profile.mean, 2.0);
        assert_eq!(profile.std_dev, 1.0);
    }

    #[test]
    fn dump_is_written_one_value_per_line_even_on_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dump = dir.path().join("dump.txt");
        profile_diffs(&dump, &[0.0, 1.5, -2.0], 1e6, 1e6, 0).expect("profile");
        let body = fs::read_to_string(&dump).expect("dump file");
        assert_eq!(body, "0\n1.5\n-2\n");
    }
}
