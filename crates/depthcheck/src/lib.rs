#![forbid(unsafe_code)]

//! Umbrella crate re-exporting the depthcheck workspace surface.

pub use dc_harness::{
    CaseLedger, CaseRecord, CaseReport, CaseStatus, FixtureLayout, HarnessError,
    LONG_SEQUENCE_ADVISORY, LoadOutcome, REQUIRED_FIXTURE_FILES, load_test_case,
    profile_case_frame, write_reports,
};
pub use dc_meta::{
    Attr, AttributeDict, FRAME_FILE_SUFFIX, INVALID_LINE_STRIKES, MetaError, parse_dict,
    parse_metadata, project_config,
};
pub use dc_profile::{
    DiffProfile, DiffVerdict, FirstDivergence, ProfileError, compute_profile, dump_samples,
    profile_diffs,
};
pub use dc_types::{
    ConfigError, DEPTH_PIXEL_BYTES, HolesParams, SpatialParams, TemporalParams, TestConfig,
    padded_output_extent,
};
