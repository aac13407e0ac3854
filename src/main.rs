use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use slash_console::cli::{self, Args, Command};
use slash_console::config::ClientConfig;
use slash_console::route::{self, Target};
use slash_console::{game, render, slash, ConsoleError};

/// Fold the CLI flags into the loaded config.
fn apply_overrides(mut config: ClientConfig, base_url: Option<&str>) -> ClientConfig {
    if let Some(base_url) = base_url {
        config.base_url = base_url.to_string();
    }
    config
}

/// Dispatch one poll-loop target with the policies it calls for.
async fn run_target(
    target: Target,
    config: &ClientConfig,
    interval_ms: Option<u64>,
    once: bool,
) -> Result<(), ConsoleError> {
    let api = config.api_client();
    let templates = render::defaults();

    match target {
        Target::AppList => {
            let policy = cli::resolve_list_policy(config, interval_ms);
            slash::run_app_list(&api, templates, policy, once).await
        }
        Target::DeviceList { app_id } => {
            let policy = cli::resolve_list_policy(config, interval_ms);
            slash::run_device_list(&api, templates, policy, &app_id, once).await
        }
        Target::LogTail { app_id, device_id } => {
            let policy = cli::resolve_adaptive_policy(config, interval_ms);
            slash::run_log_tail(
                &api,
                templates,
                policy,
                &app_id,
                &device_id,
                config.viewport_rows,
                once,
            )
            .await
        }
        Target::Game => {
            let policy = cli::resolve_adaptive_policy(config, interval_ms);
            game::run_game(&api, policy, once).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = apply_overrides(
        ClientConfig::load(args.config.as_deref())?,
        args.base_url.as_deref(),
    );

    match args.command {
        Command::Apps => run_target(Target::AppList, &config, args.interval_ms, args.once).await?,
        Command::Devices { app_id } => {
            run_target(
                Target::DeviceList { app_id },
                &config,
                args.interval_ms,
                args.once,
            )
            .await?
        }
        Command::Logs { app_id, device_id } => {
            run_target(
                Target::LogTail { app_id, device_id },
                &config,
                args.interval_ms,
                args.once,
            )
            .await?
        }
        Command::Game => run_target(Target::Game, &config, args.interval_ms, args.once).await?,
        Command::Open { url } => {
            let target = route::parse_route(&url)?;
            run_target(target, &config, args.interval_ms, args.once).await?
        }
        Command::Move { turn_no, position } => {
            let api = config.api_client();
            let action = game::MoveAction { turn_no, position };
            let notice = game::submit_move(&api, &action).await?;
            println!("{notice}");
        }
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Args::command(),
                "slash-console",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
