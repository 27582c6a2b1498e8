use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "manta",
    version,
    about = "An interactive terminal browser for live Kubernetes resources."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Auto-refresh interval in seconds (used when auto-refresh is on)
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// Rows per table page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
