use clap::Parser;
use std::path::PathBuf;

use crate::config::{API_URL_ENV, APP_DIR_NAME, DATA_PATH_ENV, DEFAULT_API_URL, DEFAULT_SYMBOL, STATE_FILE_NAME};

#[derive(Parser, Debug)]
#[command(name = "crystalball")]
#[command(about = "Terminal trading dashboard with configurable widget tabs")]
pub struct Cli {
    /// Base URL of the market data backend
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Workspace file (defaults to the platform data directory)
    #[arg(long, env = DATA_PATH_ENV)]
    pub state_file: Option<PathBuf>,

    /// Symbol for widgets that have none configured
    #[arg(short, long, default_value = DEFAULT_SYMBOL)]
    pub fallback_symbol: String,

    /// Discard the saved workspace and start from the default layout
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(STATE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_state_file_wins() {
        let cli = Cli::parse_from(["crystalball", "--state-file", "/tmp/ws.json", "--reset"]);
        assert_eq!(cli.state_path(), PathBuf::from("/tmp/ws.json"));
        assert!(cli.reset);
        assert_eq!(cli.fallback_symbol, "SPY");
    }

    #[test]
    fn default_state_path_ends_with_file_name() {
        let cli = Cli::parse_from(["crystalball", "--fallback-symbol", "qqq"]);
        if cli.state_file.is_none() {
            assert!(cli.state_path().ends_with(format!("{APP_DIR_NAME}/{STATE_FILE_NAME}")));
        }
        assert_eq!(cli.fallback_symbol, "qqq");
    }
}
