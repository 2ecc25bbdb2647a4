use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "somnia-cli", version, about = "Somnia sleep alarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor: read classification events, fire the alarm
    Run(commands::run::RunArgs),
    /// Replay a scripted event sequence without touching real state
    Simulate(commands::simulate::SimulateArgs),
    /// Print the persisted record and alarm countdown as JSON
    Status(commands::status::StatusArgs),
    /// Monitoring lifecycle
    Monitor {
        #[command(subcommand)]
        action: commands::monitor::MonitorAction,
    },
    /// Toggle the short debug alarm duration
    TestMode {
        #[command(subcommand)]
        action: commands::test_mode::TestModeAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Monitor { action } => commands::monitor::run(action),
        Commands::TestMode { action } => commands::test_mode::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
