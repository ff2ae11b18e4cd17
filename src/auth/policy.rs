use crate::auth::repo_types::User;

/// Decides whether a successful login verifies an account on its own.
///
/// Logging in enough times marks the account verified without an email round
/// trip. The threshold comes from configuration; `0` turns the rule off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoVerifyPolicy {
    threshold: Option<u32>,
}

impl AutoVerifyPolicy {
    pub const DEFAULT_THRESHOLD: u32 = 5;

    pub fn from_threshold(threshold: u32) -> Self {
        Self {
            threshold: (threshold > 0).then_some(threshold),
        }
    }

    pub fn disabled() -> Self {
        Self { threshold: None }
    }

    /// `user` is the record after its login counter was incremented.
    pub fn should_verify(&self, user: &User) -> bool {
        match self.threshold {
            Some(t) => !user.is_verified && user.login_count >= i64::from(t),
            None => false,
        }
    }
}

impl Default for AutoVerifyPolicy {
    fn default() -> Self {
        Self::from_threshold(Self::DEFAULT_THRESHOLD)
    }
}
