use crate::error::{EncoderError, Result};
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One batch of encoded features and binary labels
#[derive(Debug, Clone)]
pub struct Batch {
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl Batch {
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the feature row count and
    ///   target count differ
    pub fn new(features: Array2<f64>, targets: Array1<f64>) -> Result<Self> {
        if features.nrows() != targets.len() {
            return Err(EncoderError::InvalidInput(format!(
                "{} feature rows for {} targets",
                features.nrows(),
                targets.len()
            )));
        }
        Ok(Batch { features, targets })
    }
}

/// The trainable-model collaborator: forward-compute and parameter-update
/// hooks plus flat state snapshots for checkpointing
pub trait Model {
    /// Raw scores (logits) for a batch of feature rows
    fn forward(&self, features: ArrayView2<'_, f64>) -> Array1<f64>;

    /// One parameter update against a batch, returning the batch loss
    fn update(&mut self, features: ArrayView2<'_, f64>, targets: ArrayView1<'_, f64>) -> f64;

    /// Flat snapshot of the trainable parameters
    fn state(&self) -> Vec<f64>;

    /// Restores a snapshot produced by `state`
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the snapshot does not match
    ///   the model's parameter count
    fn load_state(&mut self, state: &[f64]) -> Result<()>;
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Mean binary cross-entropy over logits, in the numerically stable
/// max(z,0) - z*y + ln(1 + e^-|z|) form
pub fn bce_with_logits(logits: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
    let n = logits.len().max(1) as f64;
    logits
        .iter()
        .zip(targets.iter())
        .map(|(&z, &y)| z.max(0.0) - z * y + (1.0 + (-z.abs()).exp()).ln())
        .sum::<f64>()
        / n
}

/// Fraction of probabilities on the correct side of 0.5
pub fn accuracy(probs: &[f64], targets: &[f64]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let correct = probs
        .iter()
        .zip(targets.iter())
        .filter(|(&p, &y)| (p >= 0.5) == (y >= 0.5))
        .count();
    correct as f64 / probs.len() as f64
}

/// Area under the ROC curve as the rank statistic with tie-averaged ranks.
///
/// Returns `None` when the targets hold a single class, where the curve is
/// undefined.
pub fn roc_auc(probs: &[f64], targets: &[f64]) -> Option<f64> {
    let n = probs.len();
    let n_pos = targets.iter().filter(|&&y| y >= 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        probs[a]
            .partial_cmp(&probs[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = (0..n).filter(|&i| targets[i] >= 0.5).map(|i| ranks[i]).sum();
    Some((rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64)
}

/// Scalar metrics for one split in one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub auc: f64,
}

/// Per-epoch metric streams for the train and validation splits
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train: Vec<EpochMetrics>,
    pub valid: Vec<EpochMetrics>,
    pub epochs_run: usize,
    pub stopped_early: bool,
}

/// Stops training when the monitored score stalls, checkpointing the model on
/// every improvement.
///
/// The monitored score is the negated validation loss. The first observation
/// and every score exceeding the best seen by more than `min_delta` snapshot
/// the model state synchronously and reset the stall counter; `patience`
/// consecutive non-improvements reach the terminal stalled state. A failed
/// checkpoint write is fatal and propagates.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    path: PathBuf,
    counter: usize,
    best_score: Option<f64>,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64, path: impl Into<PathBuf>) -> Self {
        EarlyStopping {
            patience,
            min_delta,
            path: path.into(),
            counter: 0,
            best_score: None,
            stopped: false,
        }
    }

    /// Whether the terminal stalled state has been reached
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Best validation loss seen so far
    pub fn best_loss(&self) -> Option<f64> {
        self.best_score.map(|score| -score)
    }

    /// Feeds one validation loss; returns true once training should stop.
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the checkpoint cannot be written
    pub fn check<M: Model>(&mut self, val_loss: f64, model: &M) -> Result<bool> {
        let score = -val_loss;
        match self.best_score {
            None => {
                self.best_score = Some(score);
                self.save_checkpoint(model)?;
            }
            Some(best) if score > best + self.min_delta => {
                self.best_score = Some(score);
                self.save_checkpoint(model)?;
                self.counter = 0;
            }
            Some(_) => {
                self.counter += 1;
                if self.counter >= self.patience {
                    self.stopped = true;
                }
            }
        }
        Ok(self.stopped)
    }

    fn save_checkpoint<M: Model>(&self, model: &M) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        for value in model.state() {
            writeln!(writer, "{}", value)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Re-reads a model snapshot written by `EarlyStopping`, one float per line
///
/// # Errors
/// * Returns `EncoderError::Io` if the file cannot be opened or read
/// * Returns `EncoderError::InvalidFileFormat` if a value does not parse
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut state = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: f64 = line.parse().map_err(|e| {
            EncoderError::invalid_file_format(format!("Invalid checkpoint value '{}': {}", line, e))
        })?;
        state.push(value);
    }

    Ok(state)
}

/// Training-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub patience: usize,
    pub min_delta: f64,
    pub checkpoint_path: PathBuf,
}

/// Epoch loop over a model collaborator with early stopping
pub struct Trainer {
    config: TrainConfig,
}

fn epoch_metrics(loss_sum: f64, probs: &[f64], targets: &[f64]) -> EpochMetrics {
    let n = targets.len().max(1) as f64;
    let auc = match roc_auc(probs, targets) {
        Some(auc) => auc,
        None => {
            warn!("single-class split, recording AUC 0.5");
            0.5
        }
    };
    EpochMetrics {
        loss: loss_sum / n,
        accuracy: accuracy(probs, targets),
        auc,
    }
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Trainer { config }
    }

    /// Runs the training loop: one forward and one update per train batch,
    /// forward-only validation, metric aggregation over each epoch's pooled
    /// outputs, and an early-stop check on the mean validation loss.
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if either split is empty
    /// * Returns `EncoderError::Io` if a checkpoint write fails
    pub fn fit<M, L>(
        &self,
        model: &mut M,
        loss_fn: &L,
        train: &[Batch],
        valid: &[Batch],
    ) -> Result<TrainingHistory>
    where
        M: Model,
        L: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
    {
        if train.is_empty() || valid.is_empty() {
            return Err(EncoderError::InvalidInput(
                "Training and validation splits must be non-empty".into(),
            ));
        }

        let mut stopper = EarlyStopping::new(
            self.config.patience,
            self.config.min_delta,
            &self.config.checkpoint_path,
        );
        let mut history = TrainingHistory::default();

        for epoch in 0..self.config.epochs {
            let mut probs = Vec::new();
            let mut targets = Vec::new();
            let mut loss_sum = 0.0;

            for batch in train {
                let logits = model.forward(batch.features.view());
                loss_sum += loss_fn(logits.view(), batch.targets.view()) * batch.targets.len() as f64;
                probs.extend(logits.iter().map(|&z| sigmoid(z)));
                targets.extend(batch.targets.iter().copied());
                model.update(batch.features.view(), batch.targets.view());
            }
            let train_metrics = epoch_metrics(loss_sum, &probs, &targets);

            let valid_metrics = self.run_split(model, loss_fn, valid);

            if epoch % 5 == 0 {
                info!(
                    "epoch {} \t train loss: {:.5} \t validation loss: {:.5}",
                    epoch, train_metrics.loss, valid_metrics.loss
                );
            }

            history.train.push(train_metrics);
            history.valid.push(valid_metrics);
            history.epochs_run = epoch + 1;

            if stopper.check(valid_metrics.loss, model)? {
                info!("early stopping at epoch {}", epoch);
                history.stopped_early = true;
                break;
            }
        }

        Ok(history)
    }

    /// Forward-only metrics over a split, for the test set
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the split is empty
    pub fn evaluate<M, L>(&self, model: &M, loss_fn: &L, batches: &[Batch]) -> Result<EpochMetrics>
    where
        M: Model,
        L: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
    {
        if batches.is_empty() {
            return Err(EncoderError::InvalidInput("Empty evaluation split".into()));
        }
        Ok(self.run_split(model, loss_fn, batches))
    }

    fn run_split<M, L>(&self, model: &M, loss_fn: &L, batches: &[Batch]) -> EpochMetrics
    where
        M: Model,
        L: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
    {
        let mut probs = Vec::new();
        let mut targets = Vec::new();
        let mut loss_sum = 0.0;

        for batch in batches {
            let logits = model.forward(batch.features.view());
            loss_sum += loss_fn(logits.view(), batch.targets.view()) * batch.targets.len() as f64;
            probs.extend(logits.iter().map(|&z| sigmoid(z)));
            targets.extend(batch.targets.iter().copied());
        }

        epoch_metrics(loss_sum, &probs, &targets)
    }
}
