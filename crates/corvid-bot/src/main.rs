//! Corvid CLI entry point.
//!
//! Binary name: `corvid`
//!
//! Parses CLI arguments, initializes tracing, loads configuration and
//! secrets, then either validates the setup (`check-config`) or starts the
//! bot's run loop.

mod cli;
mod runner;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use corvid_infra::config::{data_dir, load_config, load_secrets, LLM_API_KEY_VAR, PLATFORM_TOKEN_VAR};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "corvid", &mut std::io::stdout());
        return Ok(());
    }

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,corvid=debug",
        _ => "trace",
    };
    corvid_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(data_dir);
    let config = load_config(&data_dir).await;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let secrets = load_secrets()?;
            let platform_token = secrets.platform_token.clone();
            let state = AppState::init(data_dir, config, &secrets).await?;
            let result = runner::run(state, platform_token).await;
            corvid_observe::tracing_setup::shutdown_tracing();
            result
        }

        Commands::CheckConfig => {
            let check = |ok: bool| {
                if ok {
                    format!("{}", console::style("✓").green())
                } else {
                    format!("{}", console::style("✗").red())
                }
            };

            println!();
            println!(
                "  {} Corvid configuration ({})",
                console::style("🔍").bold(),
                console::style(data_dir.display()).cyan()
            );
            println!();
            println!("  platform api: {}", config.platform.api_base);
            println!("  stream url:   {}", config.platform.stream_url);
            println!("  bot handle:   @{}", config.platform.bot_handle);
            println!("  model:        {}", config.llm.model);
            println!(
                "  rate limit:   {} messages / {}s",
                config.rate.max_messages, config.rate.window_secs
            );
            println!(
                "  dedup:        {} day retention",
                config.dedup.retention_days
            );
            println!(
                "  memory:       cap {}, protect >= {}",
                config.memory.max_per_user, config.memory.protected_importance
            );
            println!();
            println!(
                "  {} {} set",
                check(std::env::var(PLATFORM_TOKEN_VAR).is_ok()),
                PLATFORM_TOKEN_VAR
            );
            println!(
                "  {} {} set",
                check(std::env::var(LLM_API_KEY_VAR).is_ok()),
                LLM_API_KEY_VAR
            );
            println!();
            Ok(())
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
