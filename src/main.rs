use clap::Parser;
use screen_icon_run::args::{Args, Command, ProfileCommand, RunOverrides};
use screen_icon_run::automation::{
    ActionDispatcher, ControlLoop, MatchCoordinator, RunConfig, detect_once,
};
use screen_icon_run::error::{AutomationError, AutomationResult};
use screen_icon_run::platform::{EnigoInjector, LogOverlay, RdevHotkeys, XcapScreen};
use screen_icon_run::profiles::ProfileStore;
use screen_icon_run::template_matching::{
    FrameSource, FsTemplateStore, MatchOutcome, load_icon_set,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("❌ Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            log::error!("❌ Startup failed: {}", e);
            ExitCode::from(e.exit_status())
        }
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::from(e.exit_status())
        }
    }
}

async fn execute(args: Args) -> AutomationResult<()> {
    match &args.command {
        None => run(&args, &RunOverrides::default()).await,
        Some(Command::Run(overrides)) => run(&args, overrides).await,
        Some(Command::Detect(overrides)) => detect(&args, overrides).await,
        Some(Command::Profile(command)) => profile(&args, command),
    }
}

/// Defaults or the selected profile, with command-line overrides on top
fn build_config(args: &Args, overrides: &RunOverrides) -> AutomationResult<RunConfig> {
    let mut config = match &args.profile {
        Some(name) => ProfileStore::new(&args.profiles_dir)?.load(name)?,
        None => RunConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_coordinator(config: &RunConfig) -> AutomationResult<MatchCoordinator> {
    let icons = load_icon_set(
        &FsTemplateStore,
        &config.icon_paths(),
        config.white_mask_cutoff,
    )?;
    MatchCoordinator::new(Arc::new(config.matcher()), icons)
}

async fn run(args: &Args, overrides: &RunOverrides) -> AutomationResult<()> {
    let config = build_config(args, overrides)?;
    let coordinator = build_coordinator(&config)?;

    let frames = FrameSource::new(XcapScreen::primary()?, config.blur_sigma);
    let dispatcher = ActionDispatcher::new(EnigoInjector::new()?, Arc::new(LogOverlay), &config);

    let mut control = ControlLoop::new(&config, frames, coordinator, dispatcher, RdevHotkeys::new())
        .with_timeout(overrides.timeout())
        .with_max_ticks(overrides.max_ticks);
    control.bind_cancel_key()?;

    let summary = control.run().await;
    println!(
        "✅ Done: {} ticks, {} clicks, {} errors ({:?})",
        summary.ticks, summary.clicks, summary.errors, summary.stop_reason
    );
    Ok(())
}

async fn detect(args: &Args, overrides: &RunOverrides) -> AutomationResult<()> {
    let config = build_config(args, overrides)?;
    let coordinator = build_coordinator(&config)?;
    let mut frames = FrameSource::new(XcapScreen::primary()?, config.blur_sigma);

    let set = detect_once(&mut frames, &coordinator).await?;
    for outcome in set.iter() {
        let name = coordinator.icon_name(outcome.icon());
        match outcome {
            MatchOutcome::Found(result) => println!("🎯 {} {}", outcome.icon(), result.describe(name)),
            MatchOutcome::NoMatch { icon } => println!("👀 {} {} not found", icon, name),
        }
    }
    match set.first_found() {
        Some(result) => println!(
            "➡️ Would click '{}' at {:?}",
            coordinator.icon_name(result.icon),
            result.click_point()
        ),
        None => println!("➡️ Nothing to click"),
    }
    Ok(())
}

fn profile(args: &Args, command: &ProfileCommand) -> AutomationResult<()> {
    let store = ProfileStore::new(&args.profiles_dir)?;
    match command {
        ProfileCommand::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("No profiles in {:?}", store.dir());
            }
            for name in names {
                println!("{}", name);
            }
        }
        ProfileCommand::Show { name } => {
            let config = store.load(name)?;
            let json = serde_json::to_string_pretty(&config).map_err(|source| {
                AutomationError::ProfileFormat {
                    path: store.dir().join(name),
                    source,
                }
            })?;
            println!("{}", json);
        }
        ProfileCommand::Save { name, overrides } => {
            let config = build_config(args, overrides)?;
            let path = store.save(name, &config)?;
            println!("✅ Saved profile '{}' to {:?}", name, path);
        }
        ProfileCommand::Delete { name } => {
            store.delete(name)?;
            println!("✅ Deleted profile '{}'", name);
        }
    }
    Ok(())
}
