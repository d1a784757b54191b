use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use simple_logger::SimpleLogger;

use crate::app::{Interrupts, LinkConfig, Settings, listen};

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Find one object with the camera and save its position
    Detect,
    /// Pick up the saved object and drop it in the bin
    Pick,
    /// Detect, then pick
    Run,
    /// Serve the status API
    Serve,
}

/// Cubepick - camera-guided pick and place
#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// JSON settings file, missing fields take their defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Log robot commands instead of sending them
    #[arg(short = 'n', long, default_value_t = false)]
    dry_run: bool,
    /// Print the settings and exit without running
    #[arg(short, long, default_value_t = false)]
    print: bool,
    /// Reduce log verbosity
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

pub async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = if args.quiet {
        log::Level::Info.to_level_filter()
    } else {
        log::Level::Debug.to_level_filter()
    };

    if let Err(e) = SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init()
    {
        eprintln!("Failed to start logger: {}", e);
        return ExitCode::FAILURE;
    }

    let mut settings = match Settings::load(args.settings.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.dry_run {
        settings.link = LinkConfig::DryRun;
    }

    if args.print {
        log::info!("Selected robot link: {}", settings.link.info());
        log::info!("  {}", settings.link.description());
        match serde_json::to_string_pretty(&settings) {
            Ok(text) => log::info!("Settings:\n{}", text),
            Err(e) => log::error!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    log::info!("Starting Cubepick ({:?})", args.command);
    let interrupts = Interrupts::new();
    if args.command != Command::Serve {
        listen(interrupts.clone());
    }

    let result = match args.command {
        Command::Detect => crate::app::detect(settings, &interrupts).await.map(|_| ()),
        Command::Pick => crate::app::pick(settings).await.map(|_| ()),
        Command::Run => match crate::app::detect(settings.clone(), &interrupts).await {
            Ok(_) => crate::app::pick(settings).await.map(|_| ()),
            Err(e) => Err(e),
        },
        Command::Serve => crate::app::serve(settings).await,
    };

    let code = match result {
        Ok(_) => {
            log::info!("Cubepick done");
            ExitCode::SUCCESS
        }
        Err(e) if !e.is_fatal() => {
            log::warn!("{}, nothing saved", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    };
    log::info!("Shutdown");
    code
}
