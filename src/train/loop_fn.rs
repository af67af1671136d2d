use std::path::Path;

use rand::rngs::ThreadRng;

use crate::artifacts::{RunDir, GRID_TILES};
use crate::data::provider::DigitSet;
use crate::model::vae::Vae;
use crate::optim::adam::Adam;
use crate::train::config::RunConfig;
use crate::train::progress::{EpochStats, Progress, StopReason};

/// Outcome of a completed training run.
///
/// `score` is the best validation score seen during the run when one
/// exists, else the last computed score if finite, else the fixed penalty —
/// always a finite, rankable number.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub score: f64,
    pub stop: StopReason,
    pub epochs_completed: usize,
    pub best_epoch: usize,
    pub history: Vec<EpochStats>,
}

/// One training run: owns the model, the optimizer, the dataset split, and
/// the artifact directory. Nothing here is shared between runs — every
/// trial constructs a fresh `Trainer`.
#[derive(Debug)]
pub struct Trainer {
    config: RunConfig,
    data: DigitSet,
    n_train: usize,
    validation: Vec<Vec<f64>>,
    model: Vae,
    optimizer: Adam,
    run_dir: RunDir,
}

impl Trainer {
    /// Builds a trainer under the current working directory.
    pub fn new(config: RunConfig, data: DigitSet) -> Result<Trainer, String> {
        Trainer::new_in(Path::new("."), config, data)
    }

    /// Builds a trainer, carving the train/validation split and checking
    /// the configuration against the dataset. Artifacts land under `base`.
    ///
    /// Fails fast when the configuration is invalid, the training split is
    /// empty, or the batch size exceeds the validation set size.
    pub fn new_in(base: &Path, config: RunConfig, mut data: DigitSet) -> Result<Trainer, String> {
        config.validate()?;
        let total = data.num_examples();
        let n_train = (config.frac_train * total as f64).floor() as usize;
        if n_train == 0 {
            return Err(format!(
                "training split is empty: frac_train {} of {} examples",
                config.frac_train, total
            ));
        }
        let validation: Vec<Vec<f64>> = if n_train < total {
            data.images(n_train..total).to_vec()
        } else {
            // The split leaves no tail; carve one minibatch out of the
            // training stream instead so the validation signal is never
            // empty.
            let (images, _) = data.next_batch(config.batch_size, n_train);
            images
        };
        if config.batch_size > validation.len() {
            return Err(format!(
                "batch size {} exceeds validation set size {}",
                config.batch_size,
                validation.len()
            ));
        }
        let model = Vae::new(config.n_z, config.e_h1, config.e_h2, config.d_h1, config.d_h2);
        let optimizer = Adam::new(config.learning_rate);
        let run_dir = RunDir::create_in(base, config.run_id)?;
        Ok(Trainer {
            config,
            data,
            n_train,
            validation,
            model,
            optimizer,
            run_dir,
        })
    }

    pub fn validation_size(&self) -> usize {
        self.validation.len()
    }

    /// Runs the loop to a stopping state.
    ///
    /// Each iteration draws one minibatch and takes one optimizer step; at
    /// every epoch boundary (detected through the provider's epoch counter)
    /// the model is checkpointed, scored against the fixed validation set,
    /// and a reconstruction grid is rendered. The loop ends when the epoch
    /// budget runs out, the patience window closes, or the validation score
    /// diverges to NaN.
    pub fn run(&mut self) -> Result<TrainOutcome, String> {
        let mut rng = rand::thread_rng();
        self.run_dir.save_grid(&self.validation, "base.png")?;

        let mut progress = Progress::new();
        let mut history: Vec<EpochStats> = Vec::new();
        let mut last_epoch_seen: Option<usize> = None;

        while progress.keep_going(self.data.epochs_completed(), self.config.max_epochs) {
            if progress.diverged() {
                break;
            }
            let batch_size = self.config.batch_size;
            let n_train = self.n_train;
            let (batch, _) = self.data.next_batch(batch_size, n_train);
            let (gen_loss, lat_loss) = self.train_step(&batch, &mut rng);

            let epoch = self.data.epochs_completed();
            if last_epoch_seen != Some(epoch) {
                last_epoch_seen = Some(epoch);
                let val_loss = self.epoch_end(epoch, gen_loss, lat_loss, &mut rng)?;
                progress.observe(epoch, val_loss);
                history.push(EpochStats {
                    epoch,
                    gen_loss,
                    lat_loss,
                    val_loss,
                });
            }
        }

        let epochs_completed = self.data.epochs_completed();
        Ok(TrainOutcome {
            score: progress.final_score(),
            stop: progress.stop_reason(epochs_completed, self.config.max_epochs),
            epochs_completed,
            best_epoch: progress.best_epoch,
            history,
        })
    }

    /// One optimization step over `batch`. Returns the batch's mean
    /// reconstruction and latent losses.
    fn train_step(&mut self, batch: &[Vec<f64>], rng: &mut ThreadRng) -> (f64, f64) {
        let scale = 1.0 / batch.len() as f64;
        self.model.zero_grads();
        let mut gen_sum = 0.0;
        let mut lat_sum = 0.0;
        for x in batch {
            let f = self.model.forward(x, rng);
            gen_sum += Vae::generation_loss(x, &f.recon);
            lat_sum += Vae::latent_loss(&f.mean, &f.spread);
            self.model.backward(x, &f, scale);
        }
        self.optimizer.step(self.model.params_mut());
        (gen_sum * scale, lat_sum * scale)
    }

    /// Epoch-boundary work: checkpoint, validation score, preview grid, and
    /// one log line. Returns the validation score (mean reconstruction loss
    /// over the fixed validation set).
    fn epoch_end(
        &mut self,
        epoch: usize,
        gen_loss: f64,
        lat_loss: f64,
        rng: &mut ThreadRng,
    ) -> Result<f64, String> {
        self.run_dir.save_checkpoint(&self.model, epoch)?;

        let mut recons: Vec<Vec<f64>> = Vec::with_capacity(GRID_TILES);
        let mut err_sum = 0.0;
        for x in &self.validation {
            let f = self.model.forward(x, rng);
            err_sum += Vae::generation_loss(x, &f.recon);
            if recons.len() < GRID_TILES {
                recons.push(f.recon);
            }
        }
        let val_loss = err_sum / self.validation.len() as f64;

        self.run_dir
            .save_grid(&recons, &format!("{:04}.png", epoch))?;
        println!(
            "epoch {:02}: genloss {:7.3} latloss {:7.3} validation_genloss {:7.3}",
            epoch, gen_loss, lat_loss, val_loss
        );
        Ok(val_loss)
    }
}
