//! CLI for replaying recorded detector output through the alignment pipeline.
//!
//! Usage:
//!   marker-fit replay frames.jsonl                               # Human-readable feedback
//!   marker-fit replay frames.jsonl --json                        # One JSON object per frame
//!   marker-fit replay frames.jsonl --store profiles --save-as a  # Persist calibrations as "a"
//!   marker-fit replay frames.jsonl --store profiles --profile a  # Compare against stored "a"
//!   marker-fit profiles --store profiles list
//!   marker-fit profiles --store profiles delete a
//!
//! Each line of the frames file is a JSON object with optional `landmarks`,
//! `candidates`, `orientation` and `calibrate` fields.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use marker_fit::{
    AlignmentPipeline, CalibrationTrigger, FrameInput, FrameReport, JsonFileStore, PipelineConfig,
    ProfileRegistry, ProfileStore, TiltThreshold, CAPTURED_PROFILE_ID,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "marker-fit")]
#[command(
    author,
    version,
    about = "Marker and facial triangle alignment feedback",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Show debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed recorded frames through the pipeline
    Replay(ReplayArgs),

    /// Inspect or delete stored calibration profiles
    Profiles {
        /// Profile store directory
        #[arg(long, default_value = "calibration")]
        store: PathBuf,

        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// JSON-lines file of recorded frames
    #[arg(required = true)]
    frames: PathBuf,

    /// Pipeline config file (JSON); defaults are used for missing fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Profile store directory
    #[arg(long)]
    store: Option<PathBuf>,

    /// Stored profile to compare against from the first frame
    #[arg(long, requires = "store")]
    profile: Option<String>,

    /// Compare tilt error as a fraction of marker spread (default 5%)
    /// instead of pixels; overrides the config file
    #[arg(long)]
    relative_tilt: bool,

    /// Id for profiles captured during the replay
    #[arg(long, default_value = CAPTURED_PROFILE_ID)]
    save_as: String,

    /// Output as JSON lines
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// List stored profiles
    List,
    /// Delete a stored profile
    Delete { id: String },
}

/// One line of the frames file.
#[derive(Deserialize, Debug)]
struct RecordedFrame {
    #[serde(flatten)]
    input: FrameInput,
    #[serde(default)]
    calibrate: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct FrameOutput {
    /// Frame index (1-based, counting non-empty lines)
    frame: usize,
    capture_quality: String,
    alignment: String,
    markers: usize,
    /// Id of the profile captured on this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    calibrated: Option<String>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match &args.command {
        Command::Replay(replay_args) => replay(replay_args),
        Command::Profiles { store, action } => profiles(store, action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn replay(args: &ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.relative_tilt {
        config.tilt_threshold = TiltThreshold::scale_relative_default();
    }
    let mut pipeline = AlignmentPipeline::new(config)?;

    let mut store = match &args.store {
        Some(dir) => Some(ProfileStore::new(JsonFileStore::open(dir)?)),
        None => None,
    };

    let mut registry = ProfileRegistry::new();
    if let Some(store) = &store {
        for id in store.list_ids()? {
            match store.load(&id)? {
                Some(profile) => registry.insert(profile),
                None => warn!(profile = %id, "listed profile has no stored points"),
            }
        }
        debug!(profiles = registry.len(), "loaded stored profiles");
    }

    if let Some(id) = &args.profile {
        if !registry.select(id) {
            return Err(format!("Unknown profile: {}", id).into());
        }
        info!(profile = %id, "comparing against stored profile");
    }
    pipeline.set_profile(registry.active().cloned());

    let reader = BufReader::new(File::open(&args.frames)?);
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };

    let trigger = CalibrationTrigger::new();
    let mut index = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        index += 1;

        let recorded: RecordedFrame = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {}", args.frames.display(), line_no + 1, e))?;
        if recorded.calibrate {
            trigger.request();
        }

        let mut report = pipeline.process_with_trigger(&recorded.input, &trigger);
        let calibrated = adopt_calibration(
            &recorded.input,
            &mut report,
            &args.save_as,
            &mut pipeline,
            &mut registry,
            store.as_mut(),
        );

        let output = frame_output(index, &report, calibrated);
        if args.json {
            writeln!(out, "{}", serde_json::to_string(&output)?)?;
        } else {
            writeln!(out, "{}", format_human_readable(&output))?;
        }
    }

    if let Some(path) = &args.output {
        info!(frames = index, "output written to {:?}", path);
    }
    Ok(())
}

/// Name a freshly captured profile and persist it if a store is open.
///
/// If the save fails the pipeline is back on the previously active
/// profile, `report` describes the frame against it, and `None` is
/// returned.
fn adopt_calibration(
    frame: &FrameInput,
    report: &mut FrameReport,
    save_as: &str,
    pipeline: &mut AlignmentPipeline,
    registry: &mut ProfileRegistry,
    store: Option<&mut ProfileStore<JsonFileStore>>,
) -> Option<String> {
    report.calibrated.as_ref()?;

    match store {
        Some(store) => {
            if let Err(e) = pipeline.commit_calibration(frame, report, save_as, store) {
                warn!(error = %e, "calibration not saved, keeping previous profile");
                return None;
            }
        }
        None => {
            let profile = report.calibrated.take()?.renamed(save_as);
            pipeline.set_profile(Some(profile.clone()));
            report.calibrated = Some(profile);
        }
    }

    registry.activate(report.calibrated.clone()?);
    Some(save_as.to_string())
}

fn frame_output(index: usize, report: &FrameReport, calibrated: Option<String>) -> FrameOutput {
    let feedback = report.feedback();
    FrameOutput {
        frame: index,
        capture_quality: feedback.capture_quality,
        alignment: feedback.alignment,
        markers: report.overlay.markers.len(),
        calibrated,
    }
}

fn format_human_readable(output: &FrameOutput) -> String {
    let mut s = format!("Frame {:>4}: {} marker(s)", output.frame, output.markers);
    if let Some(id) = &output.calibrated {
        s.push_str(&format!(" [calibrated as {:?}]", id));
    }
    if !output.capture_quality.is_empty() {
        s.push_str(&format!("\n  Capture:   {}", output.capture_quality));
    }
    if !output.alignment.is_empty() {
        s.push_str(&format!("\n  Alignment: {}", output.alignment));
    }
    s
}

fn profiles(dir: &Path, action: &ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = ProfileStore::new(JsonFileStore::open(dir)?);

    match action {
        ProfileAction::List => {
            let ids = store.list_ids()?;
            if ids.is_empty() {
                println!("No stored profiles in {}", dir.display());
            }
            for id in ids {
                match store.load(&id)? {
                    Some(p) => {
                        let area = p
                            .box_area
                            .map(|a| format!("{:.0}px²", a))
                            .unwrap_or_else(|| "-".to_string());
                        println!("{:<20} markers: {:<2} box area: {}", id, p.marker_count(), area);
                    }
                    None => println!("{:<20} (missing data)", id),
                }
            }
        }
        ProfileAction::Delete { id } => {
            if store.delete(id)? {
                println!("Deleted profile {}", id);
            } else {
                return Err(format!("Unknown profile: {}", id).into());
            }
        }
    }

    Ok(())
}
