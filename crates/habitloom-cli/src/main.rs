use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "habitloom-cli", version, about = "Habitloom CLI")]
struct Cli {
    /// Acting user id (defaults to the configured user)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit template management
    Template {
        #[command(subcommand)]
        action: commands::template::TemplateAction,
    },
    /// Complete, skip, and inspect daily habits
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Progression stats
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Streak freeze management
    Freeze {
        #[command(subcommand)]
        action: commands::freeze::FreezeAction,
    },
    /// Completion pattern analytics
    Analytics {
        #[command(subcommand)]
        action: commands::analytics::AnalyticsAction,
    },
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "habitloom-cli",
            &mut std::io::stdout(),
        );
        return;
    }

    let user = match common::resolve_user(cli.user.clone()) {
        Ok(user) => user,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Template { action } => commands::template::run(action, &user),
        Commands::Habit { action } => commands::habit::run(action, &user),
        Commands::Stats { action } => commands::stats::run(action, &user),
        Commands::Freeze { action } => commands::freeze::run(action, &user),
        Commands::Analytics { action } => commands::analytics::run(action, &user),
        Commands::Completions { .. } => unreachable!(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
