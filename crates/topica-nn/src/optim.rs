//! Adam with state that can be written to and restored from disk.
//!
//! `candle_nn`'s optimizers keep their moments private, so checkpoints could
//! not capture them. This one keeps each variable's name next to its
//! moments and exports them as `<name>.exp_avg` / `<name>.exp_avg_sq`.

use crate::error::{Error, Result};
use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use candle_nn::{Optimizer, VarMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Adam hyperparameters (PyTorch defaults).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamsAdam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for ParamsAdam {
    fn default() -> Self {
        Self {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

struct Slot {
    name: String,
    var: Var,
    exp_avg: Tensor,
    exp_avg_sq: Tensor,
}

pub struct Adam {
    slots: Vec<Slot>,
    params: ParamsAdam,
    step_t: usize,
}

impl Adam {
    /// Optimize every variable of `varmap`, ordered by name.
    pub fn from_varmap(varmap: &VarMap, params: ParamsAdam) -> Result<Self> {
        let mut named: Vec<(String, Var)> = {
            let data = varmap
                .data()
                .lock()
                .map_err(|_| Error::Training("variable map lock poisoned".into()))?;
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        named.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(num_vars = named.len(), lr = params.lr, "adam");
        Self::from_named(named, params)
    }

    fn from_named(named: Vec<(String, Var)>, params: ParamsAdam) -> Result<Self> {
        let slots = named
            .into_iter()
            .filter(|(_, var)| var.dtype().is_float())
            .map(|(name, var)| {
                let exp_avg = var.zeros_like()?;
                let exp_avg_sq = var.zeros_like()?;
                Ok(Slot {
                    name,
                    var,
                    exp_avg,
                    exp_avg_sq,
                })
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            slots,
            params,
            step_t: 0,
        })
    }

    /// Number of steps taken.
    pub fn step_count(&self) -> usize {
        self.step_t
    }

    pub fn params(&self) -> &ParamsAdam {
        &self.params
    }

    /// Moments keyed `<name>.exp_avg` and `<name>.exp_avg_sq`.
    pub fn state_tensors(&self) -> HashMap<String, Tensor> {
        let mut out = HashMap::with_capacity(2 * self.slots.len());
        for slot in &self.slots {
            out.insert(format!("{}.exp_avg", slot.name), slot.exp_avg.clone());
            out.insert(format!("{}.exp_avg_sq", slot.name), slot.exp_avg_sq.clone());
        }
        out
    }

    /// Write the moments as safetensors.
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<()> {
        candle_core::safetensors::save(&self.state_tensors(), path)?;
        Ok(())
    }

    /// Restore moments written by [`Adam::save_state`] and the step count.
    ///
    /// Variables absent from the file keep zeroed moments.
    pub fn load_state(&mut self, path: impl AsRef<Path>, step: usize) -> Result<()> {
        let Some(device) = self.slots.first().map(|s| s.var.device().clone()) else {
            self.step_t = step;
            return Ok(());
        };
        let mut state = candle_core::safetensors::load(path, &device)?;
        for slot in &mut self.slots {
            if let Some(m) = state.remove(&format!("{}.exp_avg", slot.name)) {
                slot.exp_avg = m;
            }
            if let Some(v) = state.remove(&format!("{}.exp_avg_sq", slot.name)) {
                slot.exp_avg_sq = v;
            }
        }
        self.step_t = step;
        Ok(())
    }
}

impl Optimizer for Adam {
    type Config = ParamsAdam;

    fn new(vars: Vec<Var>, params: ParamsAdam) -> candle_core::Result<Self> {
        let named = vars
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("param.{i}"), v))
            .collect();
        Self::from_named(named, params).map_err(candle_core::Error::wrap)
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr;
    }

    fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
        self.step_t += 1;
        let ParamsAdam {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
        } = self.params;
        let scale_m = 1.0 / (1.0 - beta1.powi(self.step_t as i32));
        let scale_v = 1.0 / (1.0 - beta2.powi(self.step_t as i32));

        for slot in &mut self.slots {
            let theta = slot.var.as_tensor();
            let Some(g) = grads.get(theta) else {
                continue;
            };
            let g = if weight_decay > 0.0 {
                (g + theta.affine(weight_decay, 0.0)?)?
            } else {
                g.clone()
            };
            let m = ((&slot.exp_avg * beta1)? + (&g * (1.0 - beta1))?)?;
            let v = ((&slot.exp_avg_sq * beta2)? + (g.sqr()? * (1.0 - beta2))?)?;
            let m_hat = (&m * scale_m)?;
            let v_hat = (&v * scale_v)?;
            let update = (m_hat / (v_hat.sqrt()? + eps)?)?;
            slot.var.set(&theta.sub(&(update * lr)?)?)?;
            slot.exp_avg = m;
            slot.exp_avg_sq = v;
        }
        Ok(())
    }
}
