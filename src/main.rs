use orrery::animation::MotionMode;
use orrery::cli;
use orrery::config::AppConfig;
use orrery::engine::Engine;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("orrery=info");
    let directive: Directive = match log_directive.parse() {
        Ok(directive) => directive,
        Err(_) => "orrery=info".parse()?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    tracing::info!("Orrery v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load_or_default(&args.config);
    if let Some(camera) = args.camera {
        config.cameras.initial = camera;
    }
    if args.time_scaled {
        config.animation.mode = MotionMode::TimeScaled;
    }
    tracing::info!("Motion mode {:?}, initial camera {:?}", config.animation.mode, config.cameras.initial);

    // Without a graphics context nothing is ever scheduled
    let engine = match Engine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Cannot start renderer: {:#}", e);
            return Ok(());
        }
    };

    engine.run()?;
    tracing::info!("Shutdown complete");
    Ok(())
}
