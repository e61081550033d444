use serde::{Deserialize, Serialize};

/// Where a tenant stands against its quota in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BudgetStatus {
    Unlimited {
        used: u64,
    },
    WithinBudget {
        used: u64,
        limit: u64,
        remaining: u64,
    },
    Exceeded {
        used: u64,
        limit: u64,
        overage: u64,
    },
}

impl BudgetStatus {
    pub(crate) fn evaluate(used: u64, quota: Option<u64>) -> Self {
        match quota {
            None => Self::Unlimited { used },
            Some(limit) if used >= limit => Self::Exceeded {
                used,
                limit,
                overage: used - limit,
            },
            Some(limit) => Self::WithinBudget {
                used,
                limit,
                remaining: limit - used,
            },
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    pub fn used(&self) -> u64 {
        match self {
            Self::Unlimited { used } => *used,
            Self::WithinBudget { used, .. } => *used,
            Self::Exceeded { used, .. } => *used,
        }
    }
}
