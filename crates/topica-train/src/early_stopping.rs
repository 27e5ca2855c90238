//! Patience-based early stopping on validation loss.

/// What the loop should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Validation loss strictly improved; checkpoint and continue.
    Improved,
    /// No improvement yet, patience left.
    Stalled,
    /// `patience` consecutive epochs without improvement.
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    counter: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            counter: 0,
        }
    }

    /// Feed one epoch's validation loss.
    pub fn observe(&mut self, val_loss: f64) -> Decision {
        if val_loss < self.best {
            self.best = val_loss;
            self.counter = 0;
            return Decision::Improved;
        }
        self.counter += 1;
        if self.counter >= self.patience {
            Decision::Stop
        } else {
            Decision::Stalled
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Consecutive epochs without improvement.
    pub fn counter(&self) -> usize {
        self.counter
    }
}
