mod load;
mod play;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use whistle_theory::{detect_key, plan, InstrumentCatalog, InstrumentProfile, StartingShift, WhistleKey};
use whistleconf::WhistlyConfig;

use crate::load::{load_file, LoadedTune};
use crate::play::PlayOptions;
use crate::report::InspectReport;

/// Whistly - tin whistle practice from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ./whistly.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Where the transposition starts.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Start {
    /// Tonic near middle C, as a fresh import
    Octave4,
    /// Fitted to the whistle
    Whistle,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show key, playable keys and fingerings for a tune
    Inspect {
        /// ABC or MIDI file
        file: PathBuf,

        /// Tune number (X:) in a multi-tune ABC file
        #[arg(short, long)]
        tune: Option<u32>,

        /// Whistle key, e.g. D, "Low D", Bb, or "auto" to match the tune
        #[arg(short, long)]
        whistle: Option<String>,

        /// Starting shift; octave4 unless a whistle was given
        #[arg(long, value_enum)]
        start: Option<Start>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Play a tune, printing the cursor as it moves
    Play {
        /// ABC or MIDI file
        file: PathBuf,

        /// Tune number (X:) in a multi-tune ABC file
        #[arg(short, long)]
        tune: Option<u32>,

        /// Whistle key, e.g. D, "Low D", Bb, or "auto" to match the tune
        #[arg(short, long)]
        whistle: Option<String>,

        /// Starting shift; octave4 unless a whistle was given
        #[arg(long, value_enum)]
        start: Option<Start>,

        /// Tempo in quarter-note beats per minute
        #[arg(long)]
        tempo: Option<f64>,

        /// Override the starting shift, in semitones
        #[arg(long, allow_hyphen_values = true)]
        transpose: Option<i32>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f64>,

        /// First measure to play
        #[arg(long, requires = "to")]
        from: Option<u32>,

        /// Last measure to play
        #[arg(long, requires = "from")]
        to: Option<u32>,

        /// Play the region once instead of looping
        #[arg(long)]
        no_loop: bool,
    },

    /// List the tunes in an ABC file
    Tunes {
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = WhistlyConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging.level);
    let catalog = config.catalog()?;

    match cli.command {
        Commands::Inspect {
            file,
            tune,
            whistle,
            start,
            json,
        } => {
            let tune = load_file(&file, tune)?;
            let profile = choose_whistle(&config, &catalog, whistle.as_deref(), &tune)?;
            let plan = plan(&tune.melody, tune.declared_key.as_deref(), profile);
            let start = starting_shift(start, whistle.as_deref());
            let report = InspectReport::new(&tune, profile, &plan, start);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Commands::Play {
            file,
            tune,
            whistle,
            start,
            tempo,
            transpose,
            seconds,
            from,
            to,
            no_loop,
        } => {
            if let Some(s) = seconds {
                if !(s.is_finite() && s > 0.0) {
                    bail!("--seconds must be a positive number, got {s}");
                }
            }
            let tune = load_file(&file, tune)?;
            let profile = choose_whistle(&config, &catalog, whistle.as_deref(), &tune)?;
            let plan = plan(&tune.melody, tune.declared_key.as_deref(), profile);
            let start = starting_shift(start, whistle.as_deref());
            let transpose = transpose.unwrap_or_else(|| plan.shift_for(start));

            println!(
                "{} on the {} whistle, key {} ({:+})",
                tune.title.as_deref().unwrap_or("(untitled)"),
                profile.key.display_name(),
                whistle_theory::current_displayed_key(&plan.base_key, transpose),
                transpose
            );

            let options = PlayOptions {
                tempo,
                transpose,
                seconds,
                region: from.zip(to),
                looping: config.playback.looping && !no_loop,
            };
            play::run(
                tune.melody,
                profile,
                play::sequencer_config(&config.playback),
                options,
            )
            .await?;
        }
        Commands::Tunes { file } => list_tunes(&file)?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--start` wins. Otherwise a fresh load sits at octave 4 until a
/// whistle is asked for.
fn starting_shift(start: Option<Start>, whistle: Option<&str>) -> StartingShift {
    match start {
        Some(Start::Octave4) => StartingShift::Octave4,
        Some(Start::Whistle) => StartingShift::Whistle,
        None => StartingShift::for_load(whistle.is_some()),
    }
}

/// `--whistle` wins, `auto` matches the tune's key, otherwise the
/// configured default.
fn choose_whistle<'a>(
    config: &WhistlyConfig,
    catalog: &'a InstrumentCatalog,
    requested: Option<&str>,
    tune: &LoadedTune,
) -> Result<&'a InstrumentProfile> {
    let key = match requested {
        Some(name) if name.eq_ignore_ascii_case("auto") => {
            let tune_key = tune
                .declared_key
                .clone()
                .unwrap_or_else(|| detect_key(tune.melody.notes()).to_string());
            WhistleKey::for_tune_key(&tune_key)
        }
        Some(name) => name.parse()?,
        None => config.default_whistle()?,
    };
    Ok(catalog.get(key))
}

fn list_tunes(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tunes = abc::tunes(&text);
    if tunes.is_empty() {
        bail!("no tunes found in {}", path.display());
    }
    for source in tunes {
        println!(
            "X:{:<4} line {:<5} {}",
            source.reference,
            source.first_line,
            source.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}
