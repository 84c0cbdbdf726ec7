//! stm32kit CLI: generate, regenerate, build and flash STM32 firmware projects.

mod args;
mod commands;
mod config;
mod interrupt;
mod session;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use stm32kit_render::BackendKind;

use args::PinArgs;
use config::Settings;

#[derive(Parser)]
#[command(name = "stm32kit", version, about = "STM32 project generator, builder and flasher")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Catalog directory holding packs/ and boards/ (overrides STM32KIT_DATA and stm32kit.toml)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the boards in the catalog
    Boards,
    /// List the MCU family packs in the catalog
    Packs,
    /// Show the resolved profile of a board
    Describe {
        /// Board identifier
        board: String,
        #[command(flatten)]
        pins: PinArgs,
    },
    /// Generate a new project
    New {
        /// Project directory to create
        path: PathBuf,
        /// Board identifier
        #[arg(long)]
        board: String,
        /// Firmware target name (default: directory name)
        #[arg(long)]
        name: Option<String>,
        /// Build backend (cmake or make)
        #[arg(long)]
        backend: Option<BackendKind>,
        /// Entry-point source file
        #[arg(long, default_value = "main.c")]
        entry_point: String,
        #[command(flatten)]
        pins: PinArgs,
    },
    /// Show project state: pins, file ownership, last build
    #[command(alias = "open")]
    Status {
        /// Project directory (default: current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Re-render the project without touching user-owned files
    Regenerate {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Overwrite every file, including user-owned ones
        #[arg(long)]
        force: bool,
        /// Overwrite only this generated file (repeatable)
        #[arg(long = "force-path", value_name = "PATH")]
        force_paths: Vec<String>,
        /// Switch build backend
        #[arg(long)]
        backend: Option<BackendKind>,
        #[command(flatten)]
        pins: PinArgs,
    },
    /// Run the backend's configure step
    Configure {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Build the firmware image
    Build {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Program the last built image through the debug probe
    Flash {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Adapter speed in kHz
        #[arg(long)]
        speed: Option<u32>,
        /// Retry without prompting for a manual reset
        #[arg(long)]
        non_interactive: bool,
    },
    /// Report toolchain and catalog status
    Doctor {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Remove build output and the recorded build state
    Clean {
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    interrupt::install();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::resolve(&cwd, cli.catalog.as_deref())?;
    let project_dir = |project: Option<PathBuf>| project.unwrap_or_else(|| cwd.clone());

    match cli.command {
        Commands::Boards => commands::catalog::boards(&settings),
        Commands::Packs => commands::catalog::packs(&settings),
        Commands::Describe { board, pins } => {
            commands::catalog::describe(&settings, &board, &pins.to_request()?)
        }

        Commands::New {
            path,
            board,
            name,
            backend,
            entry_point,
            pins,
        } => commands::new::run(
            &settings,
            &path,
            &board,
            name.as_deref(),
            backend,
            &entry_point,
            &pins.to_request()?,
        ),

        Commands::Status { project } => commands::status::run(&settings, &project_dir(project)),

        Commands::Regenerate {
            project,
            force,
            force_paths,
            backend,
            pins,
        } => commands::regenerate::run(
            &settings,
            &project_dir(project),
            force,
            force_paths,
            backend,
            pins.to_request_if_given()?,
        ),

        Commands::Configure { project } => {
            commands::build::configure(&settings, &project_dir(project))
        }
        Commands::Build { project } => commands::build::build(&settings, &project_dir(project)),
        Commands::Flash {
            project,
            speed,
            non_interactive,
        } => commands::flash::run(&settings, &project_dir(project), speed, non_interactive),

        Commands::Doctor { project } => commands::doctor::run(&settings, &project_dir(project)),
        Commands::Clean { project } => commands::clean::run(&settings, &project_dir(project)),
    }
}
