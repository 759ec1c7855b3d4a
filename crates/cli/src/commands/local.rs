//! Offline commands: train a model and score readings without an agent

use anyhow::{Context, Result};
use colored::Colorize;
use irrigation_engine::advisor::{
    Alert, AlertEvaluator, Recommendation, RecommendationEngine, SensorReport,
};
use irrigation_engine::forest::ForestConfig;
use irrigation_engine::{
    FeatureImportance, FeatureVector, IrrigationPredictor, Prediction, Predictor, TrainingConfig,
    TrainingReport,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tabled::Tabled;
use tracing::debug;

use super::ReadingArgs;
use crate::output::{
    bar, color_probability, color_status, format_percent, print_heading, print_info, print_json,
    print_rows, print_success, print_warning, OutputFormat,
};

#[derive(Debug, Clone, clap::Args)]
pub struct TrainArgs {
    /// Number of synthetic samples
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    pub trees: usize,

    /// Write the trained model to this file
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl TrainArgs {
    fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            samples: self.samples,
            seed: self.seed,
            forest: ForestConfig {
                n_trees: self.trees,
                ..ForestConfig::default()
            },
            ..TrainingConfig::default()
        }
    }
}

#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "")]
    bar: String,
}

fn importance_rows(importance: &FeatureImportance) -> Vec<ImportanceRow> {
    importance
        .entries()
        .iter()
        .map(|(name, weight)| ImportanceRow {
            feature: name.label().to_string(),
            weight: format_percent(*weight),
            bar: bar(*weight, 20),
        })
        .collect()
}

#[derive(Serialize)]
struct TrainOutput<'a> {
    report: &'a TrainingReport,
    feature_importance: FeatureImportance,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<&'a PathBuf>,
}

/// Train a model on synthetic data and optionally save it
pub async fn train(args: TrainArgs, format: OutputFormat) -> Result<()> {
    let config = args.training_config();
    let started = Instant::now();
    let predictor = tokio::task::spawn_blocking(move || IrrigationPredictor::train(config))
        .await
        .context("Training task panicked")?
        .context("Training failed")?;
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Training finished");

    if let Some(path) = &args.output {
        predictor
            .save(path)
            .with_context(|| format!("Failed to save model to {}", path.display()))?;
    }

    let report = predictor.report().context("Trained model has no report")?;
    let importance = predictor.feature_importance()?;

    match format {
        OutputFormat::Json => print_json(&TrainOutput {
            report,
            feature_importance: importance,
            saved_to: args.output.as_ref(),
        })?,
        OutputFormat::Table => {
            print_heading("Training Report");
            println!(
                "Samples:        {} ({} train / {} test)",
                report.total_samples, report.train_samples, report.test_samples
            );
            println!("Irrigate ratio: {}", format_percent(report.positive_ratio()));
            println!("Trees:          {}", report.n_trees);
            println!("Seed:           {}", report.seed);
            println!("Accuracy:       {}", format_percent(report.accuracy).bold());
            println!();
            println!("{}", "Feature Importance".bold());
            print_rows(importance_rows(&importance));
            println!();
            match &args.output {
                Some(path) => print_success(&format!("Model saved to {}", path.display())),
                None => print_info("Model not saved (use --output to persist it)"),
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, clap::Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub reading: ReadingArgs,

    /// Saved model to use; a default model is trained when omitted
    #[arg(long, short)]
    pub model: Option<PathBuf>,
}

#[derive(Serialize)]
struct PredictOutput {
    features: FeatureVector,
    prediction: Prediction,
    recommendations: Vec<Recommendation>,
    alerts: Vec<Alert>,
    sensors: SensorReport,
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Sensor")]
    sensor: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Score one reading locally
pub async fn predict(
    args: PredictArgs,
    default_model: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let features: FeatureVector = args.reading.into();
    features.validate()?;

    let predictor = match args.model.or(default_model) {
        Some(path) => IrrigationPredictor::load(&path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?,
        None => {
            if format == OutputFormat::Table {
                print_warning("No model given, training a default model");
            }
            tokio::task::spawn_blocking(|| IrrigationPredictor::train(TrainingConfig::default()))
                .await
                .context("Training task panicked")??
        }
    };

    let prediction = predictor.explain(&features)?;
    let recommendations: Vec<Recommendation> = RecommendationEngine::default()
        .recommend(&features)
        .into_iter()
        .map(Recommendation::from)
        .collect();
    let evaluator = AlertEvaluator::default();
    let alerts = evaluator.evaluate(&features);
    let sensors = evaluator.sensor_status(&features);

    match format {
        OutputFormat::Json => print_json(&PredictOutput {
            features,
            prediction,
            recommendations,
            alerts,
            sensors,
        })?,
        OutputFormat::Table => {
            print_prediction(&features, &prediction, &sensors);
            print_advice(&recommendations, &alerts);
        }
    }

    Ok(())
}

pub(crate) fn print_prediction(
    features: &FeatureVector,
    prediction: &Prediction,
    sensors: &SensorReport,
) {
    print_heading("Irrigation Decision");
    println!("Decision:    {}", color_status(&prediction.class.to_string()));
    println!("Probability: {}", color_probability(prediction.probability_positive));
    println!();

    print_rows(vec![
        SensorRow {
            sensor: "Humidity",
            value: format!("{:.1}%", features.humidity),
            status: color_status(&sensors.humidity.to_string()),
        },
        SensorRow {
            sensor: "pH",
            value: format!("{:.2}", features.ph),
            status: color_status(&sensors.ph.to_string()),
        },
        SensorRow {
            sensor: "Phosphorus",
            value: format!("{:.1} ppm", features.phosphorus),
            status: color_status(&sensors.phosphorus.to_string()),
        },
        SensorRow {
            sensor: "Potassium",
            value: format!("{:.1} ppm", features.potassium),
            status: color_status(&sensors.potassium.to_string()),
        },
    ]);
    println!();
    println!("{}", "Feature Importance".bold());
    print_rows(importance_rows(&prediction.feature_importance));
}

pub(crate) fn print_advice(recommendations: &[Recommendation], alerts: &[Alert]) {
    println!();
    println!("{}", "Recommendations".bold());
    for rec in recommendations {
        println!("  • {} {}", rec.message, format!("[{}]", rec.code).dimmed());
    }
    for alert in alerts {
        print_warning(alert.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_args_map_to_config() {
        let args = TrainArgs {
            samples: 300,
            seed: 9,
            trees: 12,
            output: None,
        };
        let config = args.training_config();
        assert_eq!(config.samples, 300);
        assert_eq!(config.seed, 9);
        assert_eq!(config.forest.n_trees, 12);
        assert_eq!(config.forest.max_depth, 10);
    }

    #[test]
    fn test_importance_rows_follow_model_order() {
        let rows = importance_rows(&FeatureImportance::from_array([0.4, 0.3, 0.2, 0.1]));
        let names: Vec<&str> = rows.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(names, vec!["Humidity", "pH", "Phosphorus", "Potassium"]);
        assert_eq!(rows[0].weight, "40.0%");
    }
}
