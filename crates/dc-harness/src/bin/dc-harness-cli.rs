#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use dc_harness::{
    CaseLedger, CaseReport, CaseStatus, FixtureLayout, LoadOutcome, load_test_case,
    profile_case_frame, write_reports,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cases: Vec<String> = Vec::new();
    let mut fixture_root: Option<PathBuf> = None;
    let mut profile_path: Option<PathBuf> = None;
    let mut max_std = 0.0_f32;
    let mut outlier = 0.0_f32;
    let mut report_path: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--case" => {
                let value = args.next().ok_or("--case requires a fixture case name")?;
                cases.push(value);
            }
            "--fixture-root" => {
                let value = args.next().ok_or("--fixture-root requires a path")?;
                fixture_root = Some(PathBuf::from(value));
            }
            "--profile" => {
                let value = args
                    .next()
                    .ok_or("--profile requires a path to a diff sample file")?;
                profile_path = Some(PathBuf::from(value));
            }
            "--max-std" => {
                let value = args.next().ok_or("--max-std requires a number")?;
                max_std = value.parse()?;
            }
            "--outlier" => {
                let value = args.next().ok_or("--outlier requires a number")?;
                outlier = value.parse()?;
            }
            "--report" => {
                let value = args.next().ok_or("--report requires an output path")?;
                report_path = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let layout = fixture_root.map_or_else(FixtureLayout::temp, FixtureLayout::new);
    let mut reports = Vec::new();
    let mut failed = 0_usize;

    for case in &cases {
        let mut ledger = CaseLedger::new();
        match load_test_case(&layout, case, &mut ledger) {
            Ok(LoadOutcome::Loaded(config)) => {
                println!(
                    "case={case} status=loaded frames={} input={}x{} output={}x{}",
                    config.frames_sequence_size,
                    config.input_res_x,
                    config.input_res_y,
                    config.output_res_x,
                    config.output_res_y
                );
                reports.push(CaseReport {
                    case: case.clone(),
                    status: CaseStatus::Loaded,
                    error: None,
                    records: ledger.into_records(),
                });
            }
            Ok(LoadOutcome::Skipped { missing }) => {
                println!("case={case} status=skipped missing_files={}", missing.len());
                reports.push(CaseReport {
                    case: case.clone(),
                    status: CaseStatus::Skipped,
                    error: None,
                    records: ledger.into_records(),
                });
            }
            Err(err) => {
                failed += 1;
                eprintln!("case={case} status=failed error={err}");
                reports.push(CaseReport {
                    case: case.clone(),
                    status: CaseStatus::Failed,
                    error: Some(err.to_string()),
                    records: ledger.into_records(),
                });
            }
        }
    }

    if let Some(path) = profile_path {
        let samples = read_samples(&path)?;
        let dump = path.with_extension("dump");
        let mut ledger = CaseLedger::new();
        let verdict = profile_case_frame(&dump, &samples, max_std, outlier, 0, &mut ledger)?;
        println!(
            "profile={} samples={} mean={} std_dev={} peak={} pass={}",
            path.display(),
            verdict.profile.samples,
            verdict.profile.mean,
            verdict.profile.std_dev,
            verdict.profile.peak,
            verdict.pass()
        );
        let pass = verdict.pass();
        reports.push(CaseReport {
            case: path.display().to_string(),
            status: if pass {
                CaseStatus::Loaded
            } else {
                CaseStatus::Failed
            },
            error: None,
            records: ledger.into_records(),
        });
        if !pass {
            failed += 1;
        }
    }

    if let Some(path) = report_path {
        write_reports(&path, &reports)?;
        println!("wrote report={}", path.display());
    }

    if failed > 0 {
        return Err(format!("{failed} case(s) failed").into());
    }
    Ok(())
}

fn read_samples(path: &PathBuf) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let body = fs::read_to_string(path)?;
    let mut samples = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        samples.push(line.parse::<f32>()?);
    }
    Ok(samples)
}

fn print_help() {
    println!(
        "dc-harness-cli\n\
         Usage:\n\
         \tdc-harness-cli [--fixture-root <dir>] [--case <name>]... [--report <path>]\n\
         \tdc-harness-cli --profile <samples.txt> --max-std <f> --outlier <f>\n\
         Options:\n\
         \t--case <name>        Load and validate one fixture case (repeatable)\n\
         \t--fixture-root <dir> Fixture directory (default: platform temp dir)\n\
         \t--profile <path>     Profile newline-separated diff samples against thresholds\n\
         \t--max-std <f>        Maximum allowed standard deviation for --profile\n\
         \t--outlier <f>        Maximum allowed peak magnitude for --profile\n\
         \t--report <path>      Write the accumulated case reports as JSON\n\
         \t-h, --help           Show this help"
    );
}
