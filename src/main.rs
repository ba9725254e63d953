use clap::Parser;
use deal_scout::{cli, config, error, listing, replay, session};
use cli::{Cli, Commands};
use config::{Config, OutputFormat};
use deal_scout_common::DealFilter;
use error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ログ初期化（stderr出力、DEAL_SCOUT_LOG / DEAL_SCOUT_LOG_FORMAT）
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEAL_SCOUT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "deal_scout=debug,deal_scout_common=debug,info"
        } else {
            "deal_scout=info,warn"
        })
    });

    let format = std::env::var("DEAL_SCOUT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let output = cli.output.unwrap_or(config.output);

    match cli.command {
        Commands::List { input, query, category, view, sort } => {
            let snapshot = listing::load_snapshot(&input)?;
            let sections = snapshot.sections();
            let filter = DealFilter::new(query, category);
            let page = listing::build_page(
                &sections,
                &filter,
                view.unwrap_or(config.view),
                sort.unwrap_or(config.sort),
            );

            if output == OutputFormat::Text {
                println!("📦 {}\n", snapshot.source_label());
            }
            print!("{}", listing::render_list(&sections, &page, &filter, output)?);
        }

        Commands::Categories { input } => {
            let snapshot = listing::load_snapshot(&input)?;
            print!("{}", listing::render_categories(&snapshot.sections(), output)?);
        }

        Commands::Replay { input, script, flush_ms } => {
            let snapshot = listing::load_snapshot(&input)?;
            let script = replay::Script::load(&script)?;
            let flush_delay = match flush_ms {
                Some(ms) => {
                    let mut overridden = config.clone();
                    overridden.set_flush_delay_ms(ms)?;
                    overridden.flush_delay()
                }
                None => config.flush_delay(),
            };

            let report = replay::run_replay(
                &snapshot.deals(),
                script,
                flush_delay,
                output == OutputFormat::Text,
            )
            .await?;

            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print!("{}", report.render_text()),
            }
        }

        Commands::Session { input } => {
            println!("🏷 deal-scout - 対話モード\n");
            let snapshot = listing::load_snapshot(&input)?;
            session::run_interactive_session(snapshot.deals(), config.flush_delay())?;
        }

        Commands::Config { show, set_flush_ms, set_view, set_sort, set_output } => {
            let mut config = config;
            let mut changed = false;

            if let Some(ms) = set_flush_ms {
                config.set_flush_delay_ms(ms)?;
                changed = true;
            }
            if let Some(view) = set_view {
                config.view = view;
                changed = true;
            }
            if let Some(sort) = set_sort {
                config.sort = sort;
                changed = true;
            }
            if let Some(format) = set_output {
                config.output = format;
                changed = true;
            }

            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show || !changed {
                println!("設定:");
                println!("  公開の時間窓: {}ms", config.flush_delay_ms);
                println!("  表示モード: {}", config.view);
                println!("  並び順: {}", config.sort);
                println!("  出力形式: {}", config.output);
            }
        }
    }

    Ok(())
}
