use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lens_undistort::core::{optimal_new_camera_matrix, CameraMatrix, LogOptions, UndistortError};
use lens_undistort::imageio::{load_image, save_image, ImageIoError};
use lens_undistort::io::{CalibrationConfig, ConfigError, IoError, OptimalMatrixReport};
use lens_undistort::recmath::{RecmathError, UNDISTORT};
use lens_undistort::undistort_image_with;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Image(#[from] ImageIoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Recmath(#[from] RecmathError),
    #[error(transparent)]
    Undistort(#[from] UndistortError),
}

#[derive(Parser, Debug)]
#[command(name = "lens-undistort", version, about = "Correct lens distortion in camera images")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines (requires the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Undistort an image file with a JSON calibration.
    Undistort(UndistortArgs),
    /// Compute the optimal new camera matrix and valid-pixel ROI.
    OptimalMatrix(OptimalArgs),
}

#[derive(Args, Debug)]
struct UndistortArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    calib: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Zero pixels outside the calibration ROI.
    #[arg(long)]
    crop: bool,
    /// Registered math function to run.
    #[arg(long, default_value = UNDISTORT)]
    function: String,
}

#[derive(Args, Debug)]
struct OptimalArgs {
    #[arg(long)]
    calib: PathBuf,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,
    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    lens_undistort::core::init_logging(LogOptions {
        verbose: cli.verbose,
        json: cli.log_json,
    });
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Undistort(args) => run_undistort(args),
        Command::OptimalMatrix(args) => run_optimal(args),
    }
}

fn run_undistort(args: UndistortArgs) -> Result<(), CliError> {
    let img = load_image(&args.image)?;
    let calibration =
        CalibrationConfig::load_json(&args.calib)?.to_calibration(img.width(), img.height())?;
    log::debug!(
        "roi {:?}, distortion {:?}",
        calibration.roi.to_array(),
        calibration.distortion.as_slice()
    );

    let out = undistort_image_with(&args.function, &img, &calibration, args.crop)?;
    save_image(&args.output, &out)?;
    log::info!(
        "{} -> {} ({}x{} {})",
        args.image.display(),
        args.output.display(),
        out.width(),
        out.height(),
        out.kind()
    );
    Ok(())
}

fn run_optimal(args: OptimalArgs) -> Result<(), CliError> {
    let cfg = CalibrationConfig::load_json(&args.calib)?;
    let opt = optimal_new_camera_matrix(
        &CameraMatrix::from_array(cfg.camera_matrix),
        &cfg.distortion_coeffs()?,
        args.width,
        args.height,
        args.alpha,
    )?;
    let report = OptimalMatrixReport::new(args.width, args.height, args.alpha, &opt);
    match args.output {
        Some(path) => {
            report.write_json(&path)?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}
