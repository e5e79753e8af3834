use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use reelsmith::{
    checkpoint::{checkpoint_path, CheckpointStore},
    model::{RenderJob, RenderOptions},
    orchestrate::RenderOrchestrator,
};

#[derive(Parser, Debug)]
#[command(name = "reelsmith", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a job's filtergraph program and print it, spawning nothing.
    Compile(CompileArgs),
    /// Render a job to MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Print the persisted checkpoint state for a job.
    ResumeInfo(ResumeInfoArgs),
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Input render job JSON.
    #[arg(long)]
    job: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input render job JSON.
    #[arg(long)]
    job: PathBuf,

    /// Job id used for the checkpoint file.
    #[arg(long, default_value = "default")]
    job_id: String,

    /// Validate and report without spawning any process.
    #[arg(long)]
    dry_run: bool,

    /// Render only the first N seconds.
    #[arg(long)]
    preview: Option<f64>,

    /// Burn captions into the video.
    #[arg(long)]
    burn_captions: bool,

    /// Write a captions.srt sidecar next to the video.
    #[arg(long)]
    export_srt: bool,

    /// Wall-clock timeout in milliseconds.
    #[arg(long, default_value_t = 600_000)]
    timeout_ms: u64,
}

#[derive(Parser, Debug)]
struct ResumeInfoArgs {
    /// Job id the checkpoint was written under.
    #[arg(long)]
    job_id: String,

    /// Directory holding the checkpoint file.
    #[arg(long)]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile(args) => cmd_compile(args),
        Command::Render(args) => cmd_render(args).await,
        Command::ResumeInfo(args) => cmd_resume_info(args),
    }
}

fn read_job_json(path: &Path) -> anyhow::Result<RenderJob> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let job: RenderJob = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse job '{}'", path.display()))?;
    Ok(job)
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.job)?;
    job.validate().context("job failed validation")?;

    let orchestrator = RenderOrchestrator::new();
    let program = orchestrator
        .compile_job(&job, &RenderOptions::default())
        .context("compile filtergraph program")?;

    for (idx, input) in program.inputs.iter().enumerate() {
        println!("input {idx}: {}", input.path.display());
    }
    println!("{}", program.filtergraph);
    println!("video output: [{}]", program.output_label);
    if let Some(audio) = &program.audio_label {
        println!("audio output: [{audio}]");
    }
    Ok(())
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.job)?;
    let options = RenderOptions {
        preview_seconds: args.preview,
        dry_run: args.dry_run,
        burn_captions: args.burn_captions,
        export_srt: args.export_srt,
        timeout_ms: args.timeout_ms,
        ..RenderOptions::default()
    };

    let orchestrator = RenderOrchestrator::new();
    let result = orchestrator
        .render(&args.job_id, &job, &options, |progress| {
            eprint!(
                "\r{:>5.1}%  frame {}  speed {:.2}x   ",
                progress.percent, progress.frame, progress.speed
            );
        })
        .await
        .context("render job")?;
    eprintln!();

    println!("video: {}", result.output_path.display());
    println!("thumbnail: {}", result.thumbnail_path.display());
    if let Some(captions) = &result.caption_path {
        println!("captions: {}", captions.display());
    }
    println!(
        "duration: {:.1}s @ {} fps",
        result.metadata.duration, result.metadata.fps
    );
    Ok(())
}

fn cmd_resume_info(args: ResumeInfoArgs) -> anyhow::Result<()> {
    let path = checkpoint_path(&args.job_id, &args.dir);
    let mut store = CheckpointStore::new(&args.job_id, &args.dir);
    if !store.load().context("load checkpoint")? {
        println!("no checkpoint at {}", path.display());
        return Ok(());
    }
    let state = store.state();
    println!("job: {}", state.id);
    println!("stage: {:?} ({}%)", state.stage, state.progress);
    for (name, artifact) in &state.artifacts {
        println!(
            "artifact {name}: {} ({} bytes)",
            artifact.path.display(),
            artifact.size
        );
    }
    Ok(())
}
