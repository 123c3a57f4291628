//! # Step Progress Mapping
//!
//! Maps a server-reported current step onto a fixed, client-known step order.
//! The server only names the step that is executing; everything before it in
//! the order is inferred complete.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stable identifier of a provisioning step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client-derived status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

pub type StepStatusMap = HashMap<StepId, StepStatus>;

/// The server reported a step that is not part of the fixed order.
///
/// This indicates version skew between client and server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provisioning step '{step}' (expected one of: {known})")]
pub struct UnknownStepError {
    pub step: StepId,
    known: String,
}

impl UnknownStepError {
    fn new(step: &StepId, order: &[StepId]) -> Self {
        Self {
            step: step.clone(),
            known: order
                .iter()
                .map(StepId::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Derive step statuses from the step the server says is executing.
///
/// With no current step the prior map is returned unchanged. Otherwise every
/// step ahead of `current_step` in `order` becomes `Completed`, the current
/// step becomes `Processing`, and later steps keep their prior status.
pub fn map_status(
    order: &[StepId],
    current_step: Option<&StepId>,
    prior: &StepStatusMap,
) -> Result<StepStatusMap, UnknownStepError> {
    let Some(current) = current_step else {
        return Ok(prior.clone());
    };

    let index = order
        .iter()
        .position(|id| id == current)
        .ok_or_else(|| UnknownStepError::new(current, order))?;

    let mut next = prior.clone();
    for id in &order[..index] {
        next.insert(id.clone(), StepStatus::Completed);
    }
    next.insert(current.clone(), StepStatus::Processing);
    Ok(next)
}

/// A step as rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
}

/// The fixed ordered list of steps and their display labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    order: Vec<StepId>,
    labels: HashMap<StepId, String>,
}

impl StepPlan {
    pub fn new<I, S, L>(steps: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        let mut order = Vec::new();
        let mut labels = HashMap::new();
        for (id, label) in steps {
            let id = StepId::new(id);
            if labels.insert(id.clone(), label.into()).is_none() {
                order.push(id);
            }
        }
        Self { order, labels }
    }

    /// Steps run by the server when provisioning a tenant
    pub fn provisioning() -> Self {
        Self::new([
            ("validating", "Validating information"),
            ("creating_database", "Creating database"),
            ("configuring_domain", "Configuring domain"),
            ("running_migrations", "Running migrations"),
            ("creating_admin", "Creating admin account"),
            ("seeding_data", "Seeding initial data"),
            ("health_check", "Running health check"),
        ])
    }

    pub fn order(&self) -> &[StepId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn label(&self, id: &StepId) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// A status map with every step pending
    pub fn pending_statuses(&self) -> StepStatusMap {
        self.order
            .iter()
            .map(|id| (id.clone(), StepStatus::Pending))
            .collect()
    }

    /// A status map with every step completed
    pub fn completed_statuses(&self) -> StepStatusMap {
        self.order
            .iter()
            .map(|id| (id.clone(), StepStatus::Completed))
            .collect()
    }

    pub fn map_status(
        &self,
        current_step: Option<&StepId>,
        prior: &StepStatusMap,
    ) -> Result<StepStatusMap, UnknownStepError> {
        map_status(&self.order, current_step, prior)
    }

    /// Render the statuses in plan order; missing entries read as pending
    pub fn describe(&self, statuses: &StepStatusMap) -> Vec<StepDescriptor> {
        self.order
            .iter()
            .map(|id| StepDescriptor {
                id: id.clone(),
                name: self.label(id).unwrap_or(id.as_str()).to_string(),
                status: statuses.get(id).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// Fraction of plan steps that are completed, in `0.0..=1.0`
    pub fn completion_ratio(&self, statuses: &StepStatusMap) -> f64 {
        if self.order.is_empty() {
            return 0.0;
        }
        let done = self
            .order
            .iter()
            .filter(|id| statuses.get(*id) == Some(&StepStatus::Completed))
            .count();
        done as f64 / self.order.len() as f64
    }
}

impl Default for StepPlan {
    fn default() -> Self {
        Self::provisioning()
    }
}
