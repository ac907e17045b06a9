use clap::Parser;

use crate::camera_rig::CameraSelection;
use crate::config::DEFAULT_CONFIG_PATH;

/// Orrery: an animated model of the solar system.
#[derive(Parser, Debug)]
#[command(name = "orrery", version, about)]
pub struct Args {
    /// Config file path.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Camera to start with, overriding the config.
    #[arg(long, value_enum)]
    pub camera: Option<CameraSelection>,

    /// Scale motion by elapsed time instead of advancing a fixed step per frame.
    #[arg(long)]
    pub time_scaled: bool,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
