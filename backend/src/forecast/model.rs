//! Dual-target occupancy model.
//!
//! `men` and `women` are fit independently on the same feature table; the
//! total is always the sum of the two clipped predictions. With too little
//! history a target falls back to its arithmetic mean.

use serde::{Deserialize, Serialize};

use super::calibration::{chronological_split, Band, IntervalOffsets};
use super::gbt::{BoostingParams, GradientBoostedTrees};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::features::{FeatureRow, FeatureTable};

fn default_min_training_rows() -> usize {
    20
}

fn default_validation_fraction() -> f64 {
    0.2
}

/// Fitting parameters shared by both targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub boosting: BoostingParams,
    /// Below this many rows a target uses the mean fallback.
    #[serde(default = "default_min_training_rows")]
    pub min_training_rows: usize,
    /// Share of trailing rows held out for interval calibration.
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            boosting: BoostingParams::default(),
            min_training_rows: default_min_training_rows(),
            validation_fraction: default_validation_fraction(),
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> AnalyticsResult<()> {
        self.boosting.validate()?;
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(AnalyticsError::invalid_parameter(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// How the model was last fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    Unfitted,
    /// At least one target predicts its training mean.
    Fallback,
    /// Both targets use the boosted ensemble.
    Boosted,
}

#[derive(Debug, Clone, Default)]
enum Estimator {
    #[default]
    Untrained,
    Mean(f64),
    Boosted(GradientBoostedTrees),
}

impl Estimator {
    fn fit(rows: &[FeatureRow], targets: &[f64], params: &ModelParams) -> AnalyticsResult<Self> {
        if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
            return Err(AnalyticsError::NonFiniteInput {
                what: "targets",
                row,
            });
        }
        if rows.len() < params.min_training_rows {
            let mean = if targets.is_empty() {
                0.0
            } else {
                targets.iter().sum::<f64>() / targets.len() as f64
            };
            return Ok(Self::Mean(mean));
        }
        GradientBoostedTrees::fit(rows, targets, &params.boosting).map(Self::Boosted)
    }

    fn predict(&self, rows: &[FeatureRow]) -> AnalyticsResult<Vec<f64>> {
        match self {
            Self::Untrained => Err(AnalyticsError::ModelNotFitted),
            Self::Mean(mean) => Ok(vec![*mean; rows.len()]),
            Self::Boosted(trees) => trees.predict(rows),
        }
    }
}

/// Point estimator plus optional calibrated offsets for one target.
#[derive(Debug, Clone, Default)]
struct TargetModel {
    estimator: Estimator,
    offsets: Option<IntervalOffsets>,
}

impl TargetModel {
    fn fit(&mut self, rows: &[FeatureRow], targets: &[f64], params: &ModelParams) -> AnalyticsResult<()> {
        self.estimator = Estimator::fit(rows, targets, params)?;
        self.offsets = None;
        Ok(())
    }

    fn fit_with_interval(
        &mut self,
        rows: &[FeatureRow],
        targets: &[f64],
        params: &ModelParams,
    ) -> AnalyticsResult<()> {
        let Some(split) = chronological_split(rows.len(), params.validation_fraction) else {
            self.fit(rows, targets, params)?;
            self.offsets = Some(IntervalOffsets::default());
            return Ok(());
        };

        let estimator = Estimator::fit(&rows[..split], &targets[..split], params)?;
        let predicted = estimator.predict(&rows[split..])?;
        let residuals: Vec<f64> = targets[split..]
            .iter()
            .zip(&predicted)
            .map(|(actual, p)| actual - p)
            .collect();

        self.estimator = estimator;
        self.offsets = Some(IntervalOffsets::from_residuals(&residuals));
        Ok(())
    }

    fn is_boosted(&self) -> bool {
        matches!(self.estimator, Estimator::Boosted(_))
    }

    fn is_fitted(&self) -> bool {
        !matches!(self.estimator, Estimator::Untrained)
    }
}

/// Interval for each target; `total` is the sum of the clipped bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalPrediction {
    pub men: Band,
    pub women: Band,
    pub total: Band,
}

/// Prediction for one feature row, clipped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelOutput {
    pub men: f64,
    pub women: f64,
    pub total: f64,
    pub interval: Option<IntervalPrediction>,
}

/// Fit-then-read-only model over both targets.
#[derive(Debug, Clone, Default)]
pub struct ForecastModel {
    params: ModelParams,
    men: TargetModel,
    women: TargetModel,
}

impl ForecastModel {
    pub fn new(params: ModelParams) -> Self {
        Self {
            params,
            men: TargetModel::default(),
            women: TargetModel::default(),
        }
    }

    /// Fit both point estimators on every row.
    pub fn fit(&mut self, features: &FeatureTable, men: &[f64], women: &[f64]) -> AnalyticsResult<()> {
        check_shape(features, men, women)?;
        self.params.validate()?;
        self.men.fit(features.rows(), men, &self.params)?;
        self.women.fit(features.rows(), women, &self.params)?;
        Ok(())
    }

    /// Fit on the leading rows and calibrate offsets on the trailing ones.
    ///
    /// With fewer than two rows the point model is fit on everything and the
    /// offsets are zero.
    pub fn fit_with_interval(
        &mut self,
        features: &FeatureTable,
        men: &[f64],
        women: &[f64],
    ) -> AnalyticsResult<()> {
        check_shape(features, men, women)?;
        self.params.validate()?;
        self.men.fit_with_interval(features.rows(), men, &self.params)?;
        self.women.fit_with_interval(features.rows(), women, &self.params)?;
        Ok(())
    }

    /// Whether both targets use the boosted ensemble.
    pub fn is_trained(&self) -> bool {
        self.men.is_boosted() && self.women.is_boosted()
    }

    pub fn fit_mode(&self) -> FitMode {
        if !(self.men.is_fitted() && self.women.is_fitted()) {
            FitMode::Unfitted
        } else if self.is_trained() {
            FitMode::Boosted
        } else {
            FitMode::Fallback
        }
    }

    pub fn has_interval(&self) -> bool {
        self.men.offsets.is_some() && self.women.offsets.is_some()
    }

    pub fn predict(&self, features: &FeatureTable) -> AnalyticsResult<Vec<ModelOutput>> {
        let men = self.men.estimator.predict(features.rows())?;
        let women = self.women.estimator.predict(features.rows())?;
        let offsets = self.men.offsets.zip(self.women.offsets);

        Ok(men
            .into_iter()
            .zip(women)
            .map(|(m, w)| {
                let men = m.max(0.0);
                let women = w.max(0.0);
                let interval = offsets.map(|(men_off, women_off)| {
                    let men = men_off.band(m).clipped();
                    let women = women_off.band(w).clipped();
                    IntervalPrediction {
                        men,
                        women,
                        total: men + women,
                    }
                });
                ModelOutput {
                    men,
                    women,
                    total: men + women,
                    interval,
                }
            })
            .collect())
    }
}

fn check_shape(features: &FeatureTable, men: &[f64], women: &[f64]) -> AnalyticsResult<()> {
    if men.len() != features.len() {
        return Err(AnalyticsError::ShapeMismatch {
            what: "men targets",
            expected: features.len(),
            actual: men.len(),
        });
    }
    if women.len() != features.len() {
        return Err(AnalyticsError::ShapeMismatch {
            what: "women targets",
            expected: features.len(),
            actual: women.len(),
        });
    }
    Ok(())
}
