use cyclops::cli::commands::{CliArgs, Commands};
use cyclops::cli::handlers::{
    handle_config, handle_extract, handle_feedback, handle_health, handle_lesson, handle_verify,
};
use cyclops::util::logging::{init_logging, parse_level, LoggingConfig};
use cyclops::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("cyclops v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Extract(extract_args) => handle_extract(extract_args, args.quiet).await,
        Commands::Lesson(lesson_command) => handle_lesson(lesson_command).await,
        Commands::Verify(verify_args) => handle_verify(verify_args).await,
        Commands::Feedback(feedback_args) => handle_feedback(feedback_args).await,
        Commands::Health(health_args) => handle_health(health_args).await,
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("CYCLOPS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = env::var("CYCLOPS_LOG_JSON")
        .ok()
        .and_then(|v| v.to_lowercase().parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(if use_json {
        LoggingConfig::structured(level)
    } else {
        LoggingConfig::with_level(level)
    });
}
