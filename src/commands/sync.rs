use std::path::PathBuf;

use anyhow::Result;
use busyblock_core::backend::build_provider;
use busyblock_core::config::ConfigOverrides;
use busyblock_core::engine::SyncEngine;
use busyblock_core::window::SyncWindow;
use owo_colors::OwoColorize;

use super::load_config;
use crate::render::{Render, SyncReportRender};
use crate::utils::tui::create_spinner;

pub struct SyncArgs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub days: Option<i64>,
    pub buffer: Option<String>,
    pub source_account: Option<String>,
    pub target_account: Option<String>,
    pub calendar: Option<String>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let overrides = ConfigOverrides {
        source_account: args.source_account,
        target_account: args.target_account,
        calendar: args.calendar,
        window_days: args.days,
        buffer: args.buffer,
    };
    let config = load_config(args.config.as_deref(), &overrides)?;

    let source = config.source()?;
    let target = config.target()?;
    let tz = config.timezone()?;
    let buffer = config.buffer()?;
    let window = SyncWindow::from_args(
        args.from.as_deref(),
        args.to.as_deref(),
        config.window_days()?,
        tz,
    )?;

    let engine = SyncEngine::new(build_provider(&config.backend, tz)?);

    let header = format!("{} {} {}", source.render(), "->".dimmed(), target.render());
    println!("{}", header);
    println!(
        "   {}",
        format!(
            "{} to {}",
            window.start.with_timezone(&tz).format("%Y-%m-%d"),
            window.end.with_timezone(&tz).format("%Y-%m-%d")
        )
        .dimmed()
    );

    let spinner = create_spinner("Syncing".to_string());
    let result = engine.run(&source, &target, &window, buffer).await;
    spinner.finish_and_clear();

    let report = result?;
    println!("{}", report.render(args.verbose));
    println!("\n{}", report.render_summary());

    Ok(())
}
