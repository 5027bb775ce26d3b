use std::path::PathBuf;

use clap::Parser;
use netspeed::config::NetspeedConfig;
use netspeed::system::sampler::AdapterSelection;
use netspeed::NetError;

#[derive(Parser, Debug, Clone)]
#[command(name = "netspeed")]
#[command(about = "Live network throughput graph with hourly and daily usage totals")]
pub struct Cli {
    /// Config file (default: <data dir>/netspeed/netspeedrc)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for the usage CSV files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Sampling interval in milliseconds (100-5000)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Adapter to watch, or "All"
    #[arg(long)]
    pub adapter: Option<String>,

    /// No terminal UI; log every sample instead
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many seconds (headless mode)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Print available adapters and exit
    #[arg(long)]
    pub list_adapters: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Cli {
    /// Apply command-line overrides through the same validation as the rc file.
    pub fn apply_to(&self, cfg: &mut NetspeedConfig) -> Vec<NetError> {
        let mut rejected = Vec::new();
        if let Some(ms) = self.interval {
            if let Err(e) = cfg.set("update_interval_ms", &ms.to_string()) {
                rejected.push(e);
            }
        }
        if let Some(adapter) = &self.adapter {
            cfg.adapter = AdapterSelection::parse(adapter);
        }
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = Some(dir.clone());
        }
        rejected
    }

    pub fn is_json_format(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
