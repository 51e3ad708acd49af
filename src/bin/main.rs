use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-capture")]
#[command(about = "Record a local web page to video with headless Chrome")]
#[command(version)]
struct Cli {
    /// Config file (built-in defaults when omitted)
    config: Option<PathBuf>,

    /// Show the browser window (overrides config)
    #[arg(long)]
    headed: bool,

    /// Recording duration in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u64>,

    /// Output directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config and print the capture plan without recording
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> eoka_capture::Result<()> {
    let (mut config, base_path) = match cli.config {
        Some(ref path) => {
            let config = eoka_capture::Config::load(path)?;
            // Relative paths in the config are relative to the config file
            let base = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            (config, base)
        }
        None => (eoka_capture::Config::default(), PathBuf::from(".")),
    };

    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(ms) = cli.duration_ms {
        config.duration_ms = ms;
    }
    if let Some(ref dir) = cli.output_dir {
        // Relative to the working directory, not the config file
        config.video.dir = std::env::current_dir()?.join(dir).to_string_lossy().into_owned();
    }
    config.validate()?;

    if cli.check {
        let plan = config.resolve(&base_path)?;
        println!("Config valid: {}", config.name);
        println!("  Page: {}", plan.page_url);
        if !plan.page_path.is_file() {
            println!("    (not found)");
        }
        println!("  Viewport: {}", plan.viewport);
        println!("  Video: {} @ {}fps", plan.video_size, plan.fps);
        println!("  Duration: {}ms", plan.duration.as_millis());
        println!("  Output: {}", plan.output_path.display());
        return Ok(());
    }

    println!("Recording: {}", config.name);

    let result = eoka_capture::capture(&config, &base_path).await?;

    println!();
    println!("Video saved to: {}", result.output_dir.display());
    println!("  File: {}", result.video.display());
    println!("  Frames: {}", result.frames);
    println!("  Duration: {}ms", result.duration_ms);

    Ok(())
}
