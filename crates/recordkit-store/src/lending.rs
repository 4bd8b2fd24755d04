//! Lending state machine for a resource that can be held by one holder.
//!
//! ```text
//! Available --borrow(h)--> Borrowed{h}
//! Borrowed{h} --return(h)--> Available
//! ```

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LendState {
    #[default]
    Available,
    Borrowed {
        holder: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendAction {
    Borrow { holder: String },
    Return { holder: String },
}

impl LendState {
    pub fn is_available(&self) -> bool {
        matches!(self, LendState::Available)
    }

    pub fn holder(&self) -> Option<&str> {
        match self {
            LendState::Available => None,
            LendState::Borrowed { holder } => Some(holder),
        }
    }

    /// Compute the state after `action`, or the reason it is refused.
    ///
    /// `key` only labels the error.
    pub fn transition(&self, key: &str, action: &LendAction) -> Result<LendState, StoreError> {
        match (self, action) {
            (LendState::Available, LendAction::Borrow { holder }) => Ok(LendState::Borrowed {
                holder: holder.clone(),
            }),
            (LendState::Borrowed { holder }, LendAction::Return { holder: requester }) => {
                if holder == requester {
                    Ok(LendState::Available)
                } else {
                    Err(StoreError::NotHolder {
                        key: key.to_string(),
                        holder: holder.clone(),
                        requested_by: requester.clone(),
                    })
                }
            }
            (state, action) => Err(StoreError::InvalidStateTransition {
                key: key.to_string(),
                from: state.to_string(),
                action: action.verb().to_string(),
            }),
        }
    }
}

impl fmt::Display for LendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LendState::Available => f.write_str("available"),
            LendState::Borrowed { holder } => write!(f, "borrowed by {holder}"),
        }
    }
}

impl LendAction {
    pub fn borrow(holder: impl Into<String>) -> Self {
        LendAction::Borrow {
            holder: holder.into(),
        }
    }

    pub fn give_back(holder: impl Into<String>) -> Self {
        LendAction::Return {
            holder: holder.into(),
        }
    }

    pub fn holder(&self) -> &str {
        match self {
            LendAction::Borrow { holder } | LendAction::Return { holder } => holder,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            LendAction::Borrow { .. } => "borrow",
            LendAction::Return { .. } => "return",
        }
    }
}
