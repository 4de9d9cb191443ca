use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use kerr_tracer::config::Config;
use kerr_tracer::logging::setup_logger;
use kerr_tracer::output::Resolution;
use kerr_tracer::params::{Command, ParameterStore};
use kerr_tracer::ray_tracer::RayTracer;
use kerr_tracer::trajectory;
use kerr_tracer::Result;

/// Render a still frame of a spinning black hole and its accretion disk.
///
/// Values given here override the ones loaded from the config file.
#[derive(Parser, Debug)]
#[command(name = "kerr_tracer", version)]
pub struct CliArgs {
    /// RON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the default config to this path and exit.
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Dimensionless spin, clamped to [0, 0.998].
    #[arg(long)]
    pub spin: Option<f64>,

    /// Observer polar angle in degrees.
    #[arg(long)]
    pub inclination: Option<f64>,

    #[arg(long)]
    pub distance: Option<f64>,

    #[arg(long)]
    pub exposure: Option<f64>,

    #[arg(long)]
    pub bounces: Option<u32>,

    /// Bloom strength.
    #[arg(long)]
    pub bloom: Option<f64>,

    #[arg(long)]
    pub no_bloom: bool,

    /// Simulation time, moves the disk pattern.
    #[arg(long)]
    pub time: Option<f64>,

    /// Adjustment applied after the overrides above, e.g. `spin+` or `reset`.
    /// May be repeated.
    #[arg(long = "command", value_name = "NAME")]
    pub commands: Vec<String>,

    /// Image file; the format follows the extension (ppm, png, bmp).
    #[arg(long, short, default_value = "frame.ppm")]
    pub output: PathBuf,

    /// Dump the path of the ray through pixel X Y instead of rendering.
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pub trace_pixel: Option<Vec<u32>>,

    #[arg(long, default_value = "trajectory.csv")]
    pub trace_output: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Hide the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Settings that live in the config file itself. Still renders from the
/// command line show progress unless asked not to.
fn apply_config_overrides(config: &mut Config, args: &CliArgs) {
    if let Some(w) = args.width {
        config.render.width = w.max(1);
    }
    if let Some(h) = args.height {
        config.render.height = h.max(1);
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    config.render.progress = !args.no_progress;
}

/// Parameter overrides go through the same clamping setters as interactive
/// commands, then the listed commands run in order.
fn apply_cli_overrides(store: &mut ParameterStore, args: &CliArgs) -> Result<()> {
    if let Some(spin) = args.spin {
        store.set_spin(spin);
    }
    if let Some(inclination) = args.inclination {
        store.set_inclination(inclination);
    }
    if let Some(distance) = args.distance {
        store.set_distance(distance);
    }
    if let Some(exposure) = args.exposure {
        store.set_exposure(exposure);
    }
    if let Some(bounces) = args.bounces {
        store.set_max_bounces(bounces);
    }
    if let Some(bloom) = args.bloom {
        store.set_bloom_strength(bloom);
    }
    if args.no_bloom {
        store.set_bloom_enabled(false);
    }
    if let Some(time) = args.time {
        store.set_time(time);
    }

    for name in &args.commands {
        let command: Command = name.parse()?;
        store.apply(command);
    }
    Ok(())
}

fn run(args: CliArgs) -> Result<()> {
    if let Some(ref path) = args.write_config {
        Config::default().save(path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = Config::load_or_default(args.config.as_deref())?;
    apply_config_overrides(&mut config, &args);
    setup_logger(&config.log_level, config.log_file.as_deref())?;

    let mut store = ParameterStore::new(config.defaults);
    apply_cli_overrides(&mut store, &args)?;
    let params = store.params();
    log::info!("{:?}", params);

    let resolution = Resolution::new(config.render.width, config.render.height);
    let tracer = RayTracer::new(&config);

    if let Some(ref pixel) = args.trace_pixel {
        let (samples, _) = trajectory::trace_pixel(&tracer, &params, resolution, pixel[0], pixel[1])?;
        trajectory::save_to_csv(&samples, &args.trace_output)?;
        return Ok(());
    }

    let start = Instant::now();
    let image = tracer.render(&params, resolution);
    log::info!("Rendered {}x{} in {:.2?}", resolution.width, resolution.height, start.elapsed());

    image.save(&args.output, config.post.gamma)?;
    Ok(())
}

fn main() {
    let args = CliArgs::parse();
    if let Err(why) = run(args) {
        log::error!("{}", why);
        eprintln!("error: {}", why);
        std::process::exit(1);
    }
}
