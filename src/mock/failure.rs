//! Failure injection for the in-memory provider.

use std::collections::HashMap;

use crate::provider::ProviderError;
use crate::sync::ElementType;

/// Provider call a failure can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCall {
    List(ElementType),
    Create(ElementType),
    Delete(ElementType),
}

/// Failure configuration for a call
#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub error: ProviderError,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    pub fn error(error: ProviderError) -> Self {
        Self { error, fail_count: None }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::error(ProviderError::Unavailable(message.into()))
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::error(ProviderError::Rejected(message.into()))
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<ProviderCall, FailureConfig>,
    /// Calls seen per configured call, for `fail_count` tracking.
    call_counts: HashMap<ProviderCall, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, call: ProviderCall, config: FailureConfig) {
        self.configs.insert(call, config);
        self.call_counts.insert(call, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_call(&mut self, call: &ProviderCall) {
        self.configs.remove(call);
        self.call_counts.remove(call);
    }

    /// Error to return for `call`, if one is configured and not exhausted.
    pub fn check(&mut self, call: &ProviderCall) -> Result<(), ProviderError> {
        let Some(config) = self.configs.get(call) else {
            return Ok(());
        };
        let count = self.call_counts.entry(*call).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => Ok(()),
            _ => Err(config.error.clone()),
        }
    }
}
