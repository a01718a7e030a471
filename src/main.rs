use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use vodchat::config::PanelGeometry;
use vodchat::fonts::{FontSet, DEFAULT_BOLD_FONT, DEFAULT_REGULAR_FONT};
use vodchat::frame::FrameCache;
use vodchat::manifest::{format_duration_ms, write_manifest};
use vodchat::message::build_messages;
use vodchat::render::render_frames;
use vodchat::schedule::{plan_frames, SchedulerConfig};
use vodchat::transcript::load_transcript;

#[derive(Debug, Parser)]
#[command(name = "vodchat")]
#[command(about = "Chat overlay frame compiler")]
#[command(version = option_env!("VODCHAT_GIT_HASH").unwrap_or(env!("CARGO_PKG_VERSION")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a chat transcript into overlay frames plus an ffconcat
    /// timeline.
    Build {
        transcript: PathBuf,
        /// Directory receiving the frame cache and the manifest.
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Source video width in pixels.
        #[arg(long, default_value_t = 1280)]
        width: u32,
        /// Source video height in pixels.
        #[arg(long, default_value_t = 720)]
        height: u32,
        /// Emit one settled frame per message instead of scroll animation.
        #[arg(long = "no-scrolling")]
        no_scrolling: bool,
        #[arg(long, default_value = DEFAULT_REGULAR_FONT)]
        font: PathBuf,
        #[arg(long = "font-bold", default_value = DEFAULT_BOLD_FONT)]
        font_bold: PathBuf,
    },
    /// Validate a transcript and report its stats.
    Check {
        transcript: PathBuf,
        /// Source video width in pixels.
        #[arg(long, default_value_t = 1280)]
        width: u32,
        /// Source video height in pixels.
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            transcript,
            output,
            width,
            height,
            no_scrolling,
            font,
            font_bold,
        } => run_build(
            &transcript,
            &output,
            width,
            height,
            !no_scrolling,
            &font,
            &font_bold,
        ),
        Commands::Check {
            transcript,
            width,
            height,
        } => run_check(&transcript, width, height),
    }
}

fn run_check(transcript_path: &Path, width: u32, height: u32) -> Result<()> {
    let transcript = load_transcript(transcript_path)?;
    let panel = PanelGeometry::from_video(width, height)?;
    let last_offset = transcript
        .records
        .last()
        .map(|record| record.offset_ms)
        .unwrap_or(0);

    println!(
        "OK: {} ({} messages, {} elapsed)",
        transcript_path.display(),
        transcript.records.len(),
        format_duration_ms(last_offset)
    );
    println!(
        "Panel: {}x{} ({}px font, {}px name line)",
        panel.width, panel.height, panel.font_px, panel.name_line
    );
    Ok(())
}

fn run_build(
    transcript_path: &Path,
    output: &Path,
    width: u32,
    height: u32,
    scrolling: bool,
    font: &Path,
    font_bold: &Path,
) -> Result<()> {
    let transcript = load_transcript(transcript_path)?;
    let panel = PanelGeometry::from_video(width, height)?;
    let fonts = FontSet::load(font, font_bold, panel.font_px)?;

    eprintln!(
        "laying out {} messages ({}x{} panel, {}px font)",
        transcript.records.len(),
        panel.width,
        panel.height,
        panel.font_px
    );
    let messages = build_messages(transcript.records, &fonts, &panel)?;

    let config = SchedulerConfig::new(scrolling);
    let plan = plan_frames(&messages, &panel, &config)?;
    eprintln!(
        "planned {} frames over {} of timeline",
        plan.frames.len(),
        format_duration_ms(plan.total_duration_ms())
    );

    fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    let cache = FrameCache::open(output, scrolling)?;

    let manifest_path = output.join(manifest_file_name(transcript_path, scrolling));
    write_manifest(&manifest_path, &plan, FrameCache::dir_name(scrolling))?;

    let summary = render_frames(&plan.frames, &messages, &panel, &fonts, &cache)?;

    println!(
        "Wrote {} ({} frames rendered, {} reused)",
        manifest_path.display(),
        summary.rendered,
        summary.skipped
    );
    Ok(())
}

fn manifest_file_name(transcript: &Path, scrolling: bool) -> String {
    let stem = transcript
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("chat");
    if scrolling {
        format!("{stem}.concat")
    } else {
        format!("{stem}-noscroll.concat")
    }
}
