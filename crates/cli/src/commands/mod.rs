//! CLI command implementations

pub mod agent;
pub mod local;

use clap::Args;
use irrigation_engine::FeatureVector;

/// One soil reading given on the command line
#[derive(Debug, Clone, Copy, Args)]
pub struct ReadingArgs {
    /// Soil humidity (%)
    #[arg(long)]
    pub humidity: f64,

    /// Soil pH
    #[arg(long)]
    pub ph: f64,

    /// Phosphorus (ppm)
    #[arg(long)]
    pub phosphorus: f64,

    /// Potassium (ppm)
    #[arg(long)]
    pub potassium: f64,
}

impl From<ReadingArgs> for FeatureVector {
    fn from(args: ReadingArgs) -> Self {
        FeatureVector::new(args.humidity, args.ph, args.phosphorus, args.potassium)
    }
}
