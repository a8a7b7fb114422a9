use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run synthetic projectors against the registry and report ETAs
    Simulate(Simulate),
}

#[derive(Parser, Clone, Debug)]
pub struct Simulate {
    /// Number of synthetic projectors
    #[arg(long, default_value_t = 3)]
    pub projectors: usize,

    /// Checkpoints each projector advances per report
    #[arg(long, default_value_t = 25)]
    pub rate: i64,

    /// Milliseconds between progress reports
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Target checkpoint the ETA reports aim for
    #[arg(long, default_value_t = 100_000)]
    pub target: i64,

    /// Stop after this many reports per projector (0 = run until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    pub ticks: u64,

    /// Milliseconds between ETA reports
    #[arg(long, default_value_t = 5000)]
    pub report_every_ms: u64,

    /// Output format of the periodic ETA report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}
