use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use domscope::instrument::console::{StreamConsole, StreamFormat};
use domscope::instrument::theme::Theme;
use domscope::instrument::DebugContext;
use domscope::page::Page;
use domscope::replay::{self, Scenario};

/// Replays a page scenario with event and mutation instrumentation installed.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Use the dark color scheme
    #[arg(long)]
    dark: bool,

    /// Print records as JSON lines instead of colored text
    #[arg(long)]
    json: bool,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let scenario = Scenario::load(&cli.scenario)
        .await
        .with_context(|| format!("loading {}", cli.scenario.display()))?;

    let page = Page::with_color_scheme(cli.dark);
    let theme = Theme::for_scheme(page.prefers_dark());
    let format = if cli.json {
        StreamFormat::JsonLines
    } else {
        StreamFormat::Text { ansi: !cli.no_color }
    };
    let console = Rc::new(StreamConsole::new(std::io::stdout(), theme.clone(), format));
    let ctx = DebugContext::new(scenario.debug_config(), theme, console.clone());

    let summary = replay::run(&scenario, &page, &ctx).await?;

    tracing::info!(
        steps = summary.steps,
        records = console.written(),
        installed = ?summary.report.installed,
        "replay finished"
    );
    Ok(())
}
