use anyhow::{Context, Result};
use clap::CommandFactory as _;
use paths::HamsterbarPaths;

mod actions;
mod application_lifecycle;
mod config;
mod controller;
mod daemon;
mod display;
mod notifications;
mod opts;
mod paths;
mod refresh;
#[cfg(test)]
mod test_util;
mod util;
mod week;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("hamsterbar"), log_level_filter)
            .filter(Some("hamster_client"), log_level_filter)
            .init();
    }

    if let opts::Action::ShellCompletions { shell } = opts.action {
        clap_complete::generate(shell, &mut opts::RawOpt::command(), "hamsterbar", &mut std::io::stdout());
        return;
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = opts
        .config_path
        .map(HamsterbarPaths::from_config_dir)
        .unwrap_or_else(HamsterbarPaths::default)
        .context("Failed to initialize hamsterbar paths")?;

    match opts.action {
        opts::Action::ShellCompletions { .. } => unreachable!(),
        opts::Action::Daemon => daemon::initialize_daemon(paths),
        opts::Action::WithHamster(action) => actions::handle_action(&paths, action),
    }
}
