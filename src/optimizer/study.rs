//! Trial records and the study that owns them

use super::config::OptimizeDirection;
use super::search_space::TrialParams;
use serde::{Deserialize, Serialize};

/// Result of a single evaluated trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    /// Trial number, in dispatch order
    pub trial_id: usize,
    /// Parameters used
    pub params: TrialParams,
    /// Objective value
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// Study containing all trials of one tuning invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    /// All trial results, in evaluation order
    pub trials: Vec<Trial>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
    /// Optimization direction
    pub direction: OptimizeDirection,
}

impl Study {
    /// Create a new study
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            direction,
        }
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&Trial> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    /// Record a trial; it becomes the best only if strictly better
    pub fn add_trial(&mut self, trial: Trial) {
        let idx = self.trials.len();

        let is_better = match self.best_value() {
            None => true,
            Some(best) => self.direction.is_better(trial.value, best),
        };
        if is_better {
            self.best_trial_idx = Some(idx);
        }

        self.trials.push(trial);
    }

    /// Number of evaluated trials
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(id: usize, value: f64) -> Trial {
        Trial {
            trial_id: id,
            params: TrialParams::new(),
            value,
            duration_secs: 0.0,
        }
    }

    #[test]
    fn test_best_tracks_maximum() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        for (i, v) in [0.3, 0.9, 0.5, 0.9].iter().enumerate() {
            study.add_trial(trial(i, *v));
        }
        assert_eq!(study.len(), 4);
        assert_eq!(study.best_value(), Some(0.9));
        // Ties keep the earlier trial
        assert_eq!(study.best_trial_idx, Some(1));
    }

    #[test]
    fn test_best_tracks_minimum() {
        let mut study = Study::new(OptimizeDirection::Minimize);
        study.add_trial(trial(0, 2.0));
        study.add_trial(trial(1, -1.0));
        assert_eq!(study.best_value(), Some(-1.0));
    }

    #[test]
    fn test_empty_study() {
        let study = Study::new(OptimizeDirection::Maximize);
        assert!(study.is_empty());
        assert!(study.best_params().is_none());
    }
}
