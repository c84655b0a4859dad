use clap::Parser;
use std::path::PathBuf;

/// Flowstate - human-first task management with a conversational agent
#[derive(Parser, Debug, Clone)]
#[command(name = "flowstate", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "FLOWSTATE_CONFIG", default_value = "flowstate.toml")]
    pub config: PathBuf,

    /// Server host address (overrides the config file)
    #[arg(long, env = "FLOWSTATE_HOST")]
    pub host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long, env = "FLOWSTATE_PORT")]
    pub port: Option<u16>,
}
