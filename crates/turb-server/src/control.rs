//! Runtime-adjustable classification tunables.
//!
//! Each engine owns one `RuntimeControl`. Updates swap a whole `Tunables`
//! value, so a refresh cycle that snapshots it once always sees a matching
//! floor and multiplier.

use arc_swap::ArcSwap;
use std::sync::Arc;
use thiserror::Error;

use turb_core::classify::Tunables;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidValue { name: &'static str, value: f64 },
}

pub struct RuntimeControl {
    tunables: ArcSwap<Tunables>,
}

impl Default for RuntimeControl {
    fn default() -> Self {
        Self {
            tunables: ArcSwap::from_pointee(Tunables::default()),
        }
    }
}

impl RuntimeControl {
    pub fn new(initial: Tunables) -> Result<Self, ControlError> {
        validate("threshold_floor", initial.threshold_floor)?;
        validate("multiplier", initial.multiplier)?;
        Ok(Self {
            tunables: ArcSwap::from_pointee(initial),
        })
    }

    /// Consistent copy of both values.
    pub fn snapshot(&self) -> Tunables {
        **self.tunables.load()
    }

    pub fn threshold_floor(&self) -> f64 {
        self.snapshot().threshold_floor
    }

    pub fn multiplier(&self) -> f64 {
        self.snapshot().multiplier
    }

    pub fn set_threshold_floor(&self, value: f64) -> Result<Tunables, ControlError> {
        self.update(Some(value), None)
    }

    pub fn set_multiplier(&self, value: f64) -> Result<Tunables, ControlError> {
        self.update(None, Some(value))
    }

    /// Apply either or both values as one update. Nothing changes if any
    /// value is invalid.
    pub fn update(
        &self,
        threshold_floor: Option<f64>,
        multiplier: Option<f64>,
    ) -> Result<Tunables, ControlError> {
        if let Some(value) = threshold_floor {
            validate("threshold_floor", value)?;
        }
        if let Some(value) = multiplier {
            validate("multiplier", value)?;
        }

        self.tunables.rcu(|current| Tunables {
            threshold_floor: threshold_floor.unwrap_or(current.threshold_floor),
            multiplier: multiplier.unwrap_or(current.multiplier),
        });
        let updated = self.snapshot();
        tracing::info!(
            "Tunables updated: threshold_floor={} multiplier={}",
            updated.threshold_floor,
            updated.multiplier
        );
        Ok(updated)
    }
}

fn validate(name: &'static str, value: f64) -> Result<(), ControlError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidValue { name, value })
    }
}

/// Shared handle, as held by the engine and the API.
pub type SharedControl = Arc<RuntimeControl>;
