//! Onboarding state machine — tracks where a user is in the wizard.

use super::config::{ACCOUNT_STEP, FINAL_STEP};

/// Where a user is in the wizard.
///
/// Progresses linearly: AccountCreation → Collecting(2) → Collecting(3) →
/// Complete. Persisted as the `(onboarding_step, onboarding_complete)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingState {
    AccountCreation,
    /// Collecting profile sections on step 2 or 3.
    Collecting(u8),
    Complete,
}

/// Result of comparing a requested step against the user's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepGuard {
    /// The requested step is the user's current step.
    Proceed,
    /// The user is on a different step and must be sent there.
    Redirect { current: u8 },
    /// The user already finished; no step accepts data any more.
    Completed,
}

impl OnboardingState {
    /// Rebuild the state from persisted progress.
    pub fn from_progress(step: u8, complete: bool) -> Self {
        if complete {
            Self::Complete
        } else if step <= ACCOUNT_STEP {
            Self::AccountCreation
        } else {
            Self::Collecting(step.min(FINAL_STEP))
        }
    }

    /// Persisted `(onboarding_step, onboarding_complete)` pair.
    ///
    /// `Complete` freezes the step at the final step.
    pub fn progress(&self) -> (u8, bool) {
        match self {
            Self::AccountCreation => (ACCOUNT_STEP, false),
            Self::Collecting(step) => (*step, false),
            Self::Complete => (FINAL_STEP, true),
        }
    }

    /// Current step number.
    pub fn step(&self) -> u8 {
        self.progress().0
    }

    /// Whether this state is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The state reached after a valid submission, if any.
    pub fn next(&self) -> Option<OnboardingState> {
        match self {
            Self::AccountCreation => Some(Self::Collecting(ACCOUNT_STEP + 1)),
            Self::Collecting(step) if *step >= FINAL_STEP => Some(Self::Complete),
            Self::Collecting(step) => Some(Self::Collecting(step + 1)),
            Self::Complete => None,
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingState) -> bool {
        self.next() == Some(target)
    }

    /// Compare a requested step against the current one.
    pub fn guard(&self, requested: u8) -> StepGuard {
        match self {
            Self::Complete => StepGuard::Completed,
            _ if self.step() == requested => StepGuard::Proceed,
            _ => StepGuard::Redirect {
                current: self.step(),
            },
        }
    }

    /// Stable lowercase name used in API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountCreation => "account_creation",
            Self::Collecting(_) => "collecting",
            Self::Complete => "complete",
        }
    }
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self::AccountCreation
    }
}

impl std::fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collecting(step) => write!(f, "collecting({step})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
