//! Replay a scripted input session against the measurement overlay.
//!
//! The scene file describes the displayed image and its plate solution;
//! the script is a list of timestamped input steps. The final overlay
//! state is printed as JSON (or a text report) and can optionally be
//! rendered to SVG.
//!
//! Without a script, every preset passed with `--presets` is
//! reconstructed against the scene instead.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use skyruler_core::preset::parse_presets;
use skyruler_core::{
    Clock, FinalizedMeasurement, ImageBounds, ImageGeometry, ManualClock, MeasurementOverlay,
    MeasurementPreset, MemoryPreferences, MemoryPresetStore, OverlayConfig, OverlayEvent,
    OverlayHost, PlateSolvingMatrix, Point, PresetStore, ShapeMode, Size,
};
use skyruler_export::{SvgMetadata, to_svg};

/// Preset owner used for everything the CLI saves or loads.
const PRESET_OWNER: &str = "local";

/// Replay pointer and keyboard input against a measurement overlay.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Scene description (viewport, image bounds, plate solution).
    scene: PathBuf,

    /// Input script: a JSON array of timestamped steps.
    script: Option<PathBuf>,

    /// Overlay configuration overrides (JSON, partial allowed).
    #[arg(long, value_name = "FILE")]
    config_json: Option<PathBuf>,

    /// Output format for the final state.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Presets to make available to `loadPreset` steps.
    #[arg(long, value_name = "FILE")]
    presets: Option<PathBuf>,

    /// Write every saved preset to this file at the end.
    #[arg(long, value_name = "FILE")]
    presets_out: Option<PathBuf>,

    /// Render the final overlay to this SVG file.
    #[arg(long, value_name = "FILE")]
    svg: Option<PathBuf>,

    /// Answer "no" to delete and clear-all confirmations.
    #[arg(long)]
    decline_confirmations: bool,

    /// Log specification, e.g. "info" or "skyruler_core=debug".
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scene {
    viewport: Size,
    #[serde(default)]
    image: Option<ImageBounds>,
    #[serde(default)]
    matrix: Option<PlateSolvingMatrix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedStep {
    /// Host clock reading for this step; omitted steps keep the clock.
    #[serde(default)]
    at_ms: Option<u64>,
    #[serde(flatten)]
    step: Step,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Step {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Escape,
    Activate { active: bool },
    /// Toggle the shape of one measurement, or the default shape when
    /// `index` is absent.
    Toggle {
        #[serde(default)]
        index: Option<usize>,
        shape: ShapeMode,
    },
    Delete { index: usize },
    Clear,
    Viewport { width: f64, height: f64 },
    DismissResizeWarning,
    SavePreset { index: usize, name: String },
    LoadPreset { name: String },
    Summary { index: usize },
}

/// Host backed by the scene file and a scripted clock.
struct CliHost {
    bounds: Option<ImageBounds>,
    clock: ManualClock,
    accept_confirmations: bool,
    notices: Vec<String>,
}

impl ImageGeometry for CliHost {
    fn image_bounds(&self) -> Option<ImageBounds> {
        self.bounds
    }
}

impl Clock for CliHost {
    fn now(&self) -> Duration {
        self.clock.now()
    }
}

impl OverlayHost for CliHost {
    fn suppress_hover(&mut self, suppressed: bool) {
        log::trace!("hover suppressed: {suppressed}");
    }

    fn confirm(&mut self, message: &str) -> bool {
        log::info!("confirm \"{message}\" -> {}", self.accept_confirmations);
        self.accept_confirmations
    }

    fn notify(&mut self, message: &str) {
        log::warn!("{message}");
        self.notices.push(message.to_owned());
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    measurements: &'a [FinalizedMeasurement],
    events: Vec<String>,
    notices: &'a [String],
    summaries: Vec<String>,
    measurements_affected_by_resize: bool,
}

fn describe(event: &OverlayEvent) -> String {
    match event {
        OverlayEvent::MeasurementStarted => "measurementStarted".to_owned(),
        OverlayEvent::MeasurementComplete(m) => {
            format!("measurementComplete: {}", m.distance_label())
        }
        OverlayEvent::ExitMeasuringMode => "exitMeasuringMode".to_owned(),
        OverlayEvent::ResizeWarning => "resizeWarning".to_owned(),
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("parsing {}: {e}", path.display()))
}

/// One `loadPreset` step per stored preset.
fn reconstruction_script(store: &MemoryPresetStore) -> Vec<TimedStep> {
    store
        .list(PRESET_OWNER)
        .into_iter()
        .map(|preset| TimedStep {
            at_ms: None,
            step: Step::LoadPreset { name: preset.name },
        })
        .collect()
}

fn text_report(report: &Report<'_>) -> String {
    let mut out = String::new();
    for (index, m) in report.measurements.iter().enumerate() {
        let _ = writeln!(out, "#{index} [{}]", m.shape_mode().as_str());
        for line in m.summary().lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    for notice in report.notices {
        let _ = writeln!(out, "notice: {notice}");
    }
    if report.measurements_affected_by_resize {
        let _ = writeln!(out, "warning: measurements may no longer match the image");
    }
    out
}

fn find_preset(store: &MemoryPresetStore, name: &str) -> Option<MeasurementPreset> {
    store.list(PRESET_OWNER).into_iter().find(|p| p.name == name)
}

#[allow(clippy::too_many_lines)]
fn run(cli: &Cli) -> Result<(), String> {
    let scene: Scene = read_json(&cli.scene)?;
    let config: OverlayConfig = match &cli.config_json {
        Some(path) => read_json(path)?,
        None => OverlayConfig::default(),
    };

    let mut store = MemoryPresetStore::new();
    if let Some(path) = &cli.presets {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading {}: {e}", path.display()))?;
        let presets = parse_presets(&text).map_err(|e| format!("{}: {e}", path.display()))?;
        log::info!("loaded {} preset(s) from {}", presets.len(), path.display());
        for preset in presets {
            store.create(PRESET_OWNER, preset);
        }
    }

    let host = CliHost {
        bounds: scene.image,
        clock: ManualClock::new(),
        accept_confirmations: !cli.decline_confirmations,
        notices: Vec::new(),
    };
    let mut overlay = MeasurementOverlay::new(host, MemoryPreferences::new(), config);
    if !overlay.set_plate_solving_matrix(scene.matrix.as_ref()) && scene.matrix.is_some() {
        log::warn!("plate solution unusable; measuring in pixels");
    }
    let mut viewport = scene.viewport;
    overlay.set_viewport(viewport);

    let script: Vec<TimedStep> = match &cli.script {
        Some(path) => read_json(path)?,
        None => reconstruction_script(&store),
    };

    let mut events = Vec::new();
    let mut summaries = Vec::new();
    for (n, timed) in script.into_iter().enumerate() {
        if let Some(ms) = timed.at_ms {
            overlay.host().clock.set(Duration::from_millis(ms));
        }
        log::debug!("step {n}: {:?}", timed.step);
        match timed.step {
            Step::Down { x, y } => {
                overlay.pointer_down(Point::new(x, y));
            }
            Step::Move { x, y } => {
                overlay.pointer_move(Point::new(x, y));
            }
            Step::Up { x, y } => {
                overlay.pointer_up(Point::new(x, y));
            }
            Step::Escape => {
                overlay.escape();
            }
            Step::Activate { active } => overlay.set_active(active),
            Step::Toggle {
                index: Some(index),
                shape,
            } => {
                if overlay.toggle_shape(index, shape).is_none() {
                    log::warn!("step {n}: no measurement {index}");
                }
            }
            Step::Toggle { index: None, shape } => {
                overlay.toggle_default_shape(shape);
            }
            Step::Delete { index } => {
                overlay.delete_measurement(index);
            }
            Step::Clear => {
                overlay.clear_all();
            }
            Step::Viewport { width, height } => {
                viewport = Size::new(width, height);
                overlay.set_viewport(viewport);
            }
            Step::DismissResizeWarning => overlay.dismiss_resize_warning(),
            Step::SavePreset { index, name } => match overlay.to_preset(index, &name) {
                Some(preset) => {
                    let saved = store.create(PRESET_OWNER, preset);
                    log::info!("saved preset \"{}\" as {:?}", saved.name, saved.id);
                }
                None => log::warn!("step {n}: no measurement {index}"),
            },
            Step::LoadPreset { name } => match find_preset(&store, &name) {
                Some(preset) => {
                    if let Err(e) = overlay.load_preset(&preset) {
                        log::warn!("step {n}: preset \"{name}\" not loaded: {e}");
                    }
                }
                None => log::warn!("step {n}: no preset named \"{name}\""),
            },
            Step::Summary { index } => {
                if let Some(summary) = overlay.summary(index) {
                    summaries.push(summary);
                }
            }
        }
        events.extend(overlay.drain_events().iter().map(describe));
    }

    let report = Report {
        measurements: overlay.history().as_slice(),
        events,
        notices: &overlay.host().notices,
        summaries,
        measurements_affected_by_resize: overlay.measurements_affected_by_resize(),
    };
    match cli.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{json}");
        }
        Format::Text => print!("{}", text_report(&report)),
    }

    if let Some(path) = &cli.svg {
        let svg = to_svg(
            overlay.history().as_slice(),
            overlay.preview().as_ref(),
            viewport,
            overlay.config(),
            &SvgMetadata {
                title: Some("skyruler measurements"),
                description: None,
            },
        );
        std::fs::write(path, svg).map_err(|e| format!("writing {}: {e}", path.display()))?;
        log::info!("wrote {}", path.display());
    }

    if let Some(path) = &cli.presets_out {
        let presets = store.list(PRESET_OWNER);
        let json = serde_json::to_string_pretty(&presets).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| format!("writing {}: {e}", path.display()))?;
        log::info!("wrote {} preset(s) to {}", presets.len(), path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match flexi_logger::Logger::try_with_env_or_str(&cli.log_level)
        .and_then(|logger| logger.log_to_stderr().start())
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Logger initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            log::error!("{msg}");
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
