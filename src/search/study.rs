use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::search::space::{SampledParams, SearchSpace};

/// One proposed trial and, once reported, its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub token: u64,
    pub params: SampledParams,
    pub score: Option<f64>,
}

/// File-backed search study: the driver's persistent memory.
///
/// `propose` appends a pending trial and hands back its token; `report`
/// fills in the score. The file is rewritten after every mutation, so a
/// crashed trial leaves at most one pending record behind and the study
/// survives process restarts. How configurations are chosen is the
/// driver's private business — callers only rely on the token contract.
pub struct Study {
    path: PathBuf,
    trials: Vec<TrialRecord>,
}

impl Study {
    /// Opens `path`, starting an empty study when the file does not exist.
    pub fn open(path: &Path) -> Result<Study, String> {
        let trials = if path.exists() {
            let file = fs::File::open(path)
                .map_err(|e| format!("cannot open study file {}: {}", path.display(), e))?;
            serde_json::from_reader(io::BufReader::new(file))
                .map_err(|e| format!("study file {} is corrupt: {}", path.display(), e))?
        } else {
            Vec::new()
        };
        Ok(Study {
            path: path.to_path_buf(),
            trials,
        })
    }

    fn save(&self) -> Result<(), String> {
        let file = fs::File::create(&self.path)
            .map_err(|e| format!("cannot write study file {}: {}", self.path.display(), e))?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), &self.trials)
            .map_err(|e| format!("cannot serialize study: {}", e))
    }

    /// Samples a new configuration from `space`, records it as pending, and
    /// returns its unique token.
    pub fn propose(&mut self, space: &SearchSpace) -> Result<(u64, SampledParams), String> {
        let token = self
            .trials
            .iter()
            .map(|t| t.token + 1)
            .max()
            .unwrap_or(0);
        let params = space.sample(&mut rand::thread_rng());
        self.trials.push(TrialRecord {
            token,
            params: params.clone(),
            score: None,
        });
        self.save()?;
        Ok((token, params))
    }

    /// Stores `score` for the trial identified by `token`.
    pub fn report(&mut self, token: u64, score: f64) -> Result<(), String> {
        let trial = self
            .trials
            .iter_mut()
            .find(|t| t.token == token)
            .ok_or_else(|| format!("unknown trial token {}", token))?;
        trial.score = Some(score);
        self.save()
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    /// The completed trial with the lowest score, if any.
    pub fn best(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter(|t| t.score.is_some())
            .min_by(|a, b| {
                a.score
                    .unwrap()
                    .partial_cmp(&b.score.unwrap())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_study(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mnist-vae-study-{}-{}.json", tag, std::process::id()))
    }

    #[test]
    fn propose_and_report_survive_a_reopen() {
        let path = temp_study("reopen");
        fs::remove_file(&path).ok();
        let space = SearchSpace::digits();

        let token = {
            let mut study = Study::open(&path).unwrap();
            let (token, _) = study.propose(&space).unwrap();
            token
        };
        {
            let mut study = Study::open(&path).unwrap();
            assert_eq!(study.trials().len(), 1);
            assert!(study.trials()[0].score.is_none());
            study.report(token, 33.0).unwrap();
        }
        let study = Study::open(&path).unwrap();
        assert_eq!(study.trials()[0].score, Some(33.0));
        assert_eq!(study.best().unwrap().token, token);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn tokens_are_unique_and_increasing() {
        let path = temp_study("tokens");
        fs::remove_file(&path).ok();
        let space = SearchSpace::digits();
        let mut study = Study::open(&path).unwrap();
        let (a, _) = study.propose(&space).unwrap();
        let (b, _) = study.propose(&space).unwrap();
        let (c, _) = study.propose(&space).unwrap();
        assert!(a < b && b < c);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn reporting_an_unknown_token_is_an_error() {
        let path = temp_study("unknown");
        fs::remove_file(&path).ok();
        let mut study = Study::open(&path).unwrap();
        assert!(study.report(99, 1.0).is_err());
        fs::remove_file(&path).ok();
    }
}
