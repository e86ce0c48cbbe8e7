use std::time::Duration;

use lingua_core::model::PASS_THRESHOLD;

const DEFAULT_FEEDBACK_DELAY: Duration = Duration::from_secs(3);

/// Tunables for the story engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    feedback_delay: Duration,
    pass_threshold: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            feedback_delay: DEFAULT_FEEDBACK_DELAY,
            pass_threshold: PASS_THRESHOLD,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn with_feedback_delay(mut self, delay: Duration) -> Self {
        self.feedback_delay = delay;
        self
    }

    /// Threshold is clamped to `0..=100`.
    #[must_use]
    pub fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold.min(100);
        self
    }

    /// How long choice feedback stays up before the scene advances.
    #[must_use]
    pub fn feedback_delay(&self) -> Duration {
        self.feedback_delay
    }

    #[must_use]
    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_app_behavior() {
        let settings = EngineSettings::default();
        assert_eq!(settings.feedback_delay(), Duration::from_millis(3000));
        assert_eq!(settings.pass_threshold(), 70);
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(EngineSettings::default().with_pass_threshold(250).pass_threshold(), 100);
    }
}
