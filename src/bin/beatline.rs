use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beatline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the scene table and total duration.
    Inspect(InspectArgs),
    /// Render the frame at one timestamp as a PNG.
    Frame(FrameArgs),
    /// Play the timeline at a fixed rate and write frames as PNGs.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline time in milliseconds.
    #[arg(long)]
    at_ms: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory receiving `frame_NNNNNN.png` files.
    #[arg(long)]
    out_dir: PathBuf,

    /// Frames per second of the fixed-step driver.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Write every N-th rendered frame.
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Stop after this many frame callbacks.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_timeline(in_path: &Path) -> anyhow::Result<beatline::Timeline> {
    let doc = beatline::TimelineDoc::from_json_path(in_path)
        .with_context(|| format!("load timeline '{}'", in_path.display()))?;
    let registry = beatline::EntityRegistry::with_builtins();
    let mut timeline = doc
        .build(&registry)
        .with_context(|| format!("build timeline '{}'", in_path.display()))?;

    if let Some(audio) = timeline.audio.clone() {
        let root = in_path.parent().unwrap_or_else(|| Path::new("."));
        let mut loader = beatline::FsAssetLoader::new(root);
        timeline.sequence.load_audio(&mut loader, &audio);
    }
    Ok(timeline)
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let timeline = load_timeline(&args.in_path)?;
    let seq = &timeline.sequence;
    let cfg = seq.transport().config();

    println!(
        "canvas {}x{}  bpm {}  beats/bar {}  ticks/beat {}",
        seq.settings().canvas.width,
        seq.settings().canvas.height,
        cfg.bpm,
        cfg.beats_per_bar,
        cfg.ticks_per_beat
    );
    println!("{:<4} {:<24} {:>10} {:>10} {:>8}", "#", "scene", "start_ms", "end_ms", "entities");
    for (i, scene) in seq.scenes().iter().enumerate() {
        println!(
            "{:<4} {:<24} {:>10.1} {:>10.1} {:>8}",
            i,
            scene.name(),
            scene.start_ms(),
            scene.end_ms(),
            scene.entities().len()
        );
    }
    println!("duration_ms {:.1}", seq.duration_ms());
    println!("events {}", timeline.conductor.len());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut timeline = load_timeline(&args.in_path)?;
    let seq = &mut timeline.sequence;

    seq.seek(args.at_ms)?;
    if timeline.conductor.trigger_events(seq) > 0 {
        seq.seek(args.at_ms)?;
    }

    write_png(seq.target(), &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    if args.every == 0 {
        anyhow::bail!("--every must be >= 1");
    }
    let mut timeline = load_timeline(&args.in_path)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let mut runner = beatline::FixedStepRunner::new(args.fps)?;
    if let Some(max) = args.max_frames {
        runner = runner.with_max_frames(max);
    }

    let conductor = &mut timeline.conductor;
    let mut written = 0u64;
    let stats = runner.run(&mut timeline.sequence, |index, seq| {
        if index % args.every == 0 {
            let out = args.out_dir.join(format!("frame_{index:06}.png"));
            write_png(seq.target(), &out)?;
            written += 1;
        }
        conductor.trigger_events(seq);
        Ok(())
    })?;

    eprintln!(
        "wrote {written} frames to {} ({} callbacks, {} rendered)",
        args.out_dir.display(),
        stats.frames,
        stats.rendered
    );
    Ok(())
}

fn write_png(surface: &beatline::Surface, out: &Path) -> beatline::BeatlineResult<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let data = surface.to_straight_rgba8();
    image::save_buffer_with_format(
        out,
        &data,
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;
    Ok(())
}
