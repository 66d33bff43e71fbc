use interview_core::model::{SentinelCode, SentinelRegistry};

/// Decides whether an accumulated reply is a closing code.
///
/// Matching is exact equality after trimming the whole accumulator, never a
/// prefix or substring test, so a reply that merely starts with code-like
/// characters is not cut short. When several codes could match, the first
/// registered one wins.
#[derive(Debug, Clone, Default)]
pub struct SentinelDetector {
    registry: SentinelRegistry,
}

impl SentinelDetector {
    pub fn new(registry: SentinelRegistry) -> Self {
        Self { registry }
    }

    pub fn check(&self, accumulator: &str) -> Option<&SentinelCode> {
        self.registry.match_exact(accumulator)
    }

    pub fn registry(&self) -> &SentinelRegistry {
        &self.registry
    }
}
