#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;
mod project;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "deals: sales pipeline and activity timeline",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output. Same as `--format json`.
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Acting user for moves and completions (skips env resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }

    fn actor_flag(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a deals project",
        long_about = "Create .deals/ in the current directory with config.toml, the database and a starter sales pipeline.",
        after_help = "EXAMPLES:\n    # Initialize with the starter pipeline\n    deals init\n\n    # Empty project, stages added by hand\n    deals init --no-seed"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Manage pipeline stages",
        after_help = "EXAMPLES:\n    deals stage list\n    deals stage pipelines\n    deals stage add demo --name Demo --order 3\n    deals stage add churned --role lost --pipeline renewals"
    )]
    Stage {
        #[command(subcommand)]
        command: cmd::stage::StageCommand,
    },

    #[command(
        next_help_heading = "Opportunities",
        about = "Create an opportunity",
        long_about = "Create an opportunity in the first open stage of a pipeline, or in --stage.",
        after_help = "EXAMPLES:\n    deals create --title \"ACME renewal\" --contact acme --amount 1000 --probability 50"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Opportunities",
        about = "Edit an opportunity",
        after_help = "EXAMPLES:\n    deals update opp-1 --amount 2500 --close-date 2024-07-01\n    deals update opp-1 --owner none"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(next_help_heading = "Opportunities", about = "Show one opportunity")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Pipeline",
        about = "Show the kanban board",
        after_help = "EXAMPLES:\n    deals board\n    deals board --mine --actor ana\n    deals board --all --json"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Pipeline",
        about = "Move an opportunity to another stage",
        long_about = "Move an opportunity to another stage. Won and lost stages need --reason from the configured reason codes.",
        after_help = "EXAMPLES:\n    deals move opp-1 negotiation\n    deals move opp-1 closed_lost --reason price"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(next_help_heading = "Pipeline", about = "Raw and weighted pipeline totals")]
    Forecast(cmd::forecast::ForecastArgs),

    #[command(
        next_help_heading = "Pipeline",
        about = "Archive or unarchive an opportunity",
        after_help = "EXAMPLES:\n    deals archive opp-1\n    deals archive opp-1 --undo"
    )]
    Archive(cmd::archive::ArchiveArgs),

    #[command(next_help_heading = "Activities", about = "Show an opportunity's timeline")]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        next_help_heading = "Activities",
        about = "Add, complete, edit or delete activities",
        after_help = "EXAMPLES:\n    deals activity add opp-1 --kind call --content \"intro call\"\n    deals activity add opp-1 --kind task --due \"2024-06-10 17:00\"\n    deals activity complete act-1\n    deals activity complete act-1 --undo"
    )]
    Activity {
        #[command(subcommand)]
        command: cmd::activity::ActivityCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DEALS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "deals=debug,info"
        } else {
            "deals=info,warn"
        })
    });

    let format = env::var("DEALS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    let actor = cli.actor_flag();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Stage { command } => cmd::stage::run_stage(command, output, &project_root),
        Commands::Create(args) => cmd::create::run_create(args, actor, output, &project_root),
        Commands::Update(args) => cmd::update::run_update(args, output, &project_root),
        Commands::Show(args) => cmd::show::run_show(args, output, &project_root),
        Commands::Board(args) => cmd::board::run_board(args, actor, output, &project_root),
        Commands::Move(args) => cmd::move_cmd::run_move(args, actor, output, &project_root),
        Commands::Forecast(args) => cmd::forecast::run_forecast(args, output, &project_root),
        Commands::Archive(args) => cmd::archive::run_archive(args, output, &project_root),
        Commands::Timeline(args) => cmd::timeline::run_timeline(args, output, &project_root),
        Commands::Activity { command } => {
            cmd::activity::run_activity(command, actor, output, &project_root)
        }
    }
}
