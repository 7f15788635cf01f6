use roomshift_contracts::response::TransformMode;

/// Per-request pipeline states. Only logged; each request walks its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Invoking,
    Retrying,
    Succeeded,
    FallbackNoCredential,
    FallbackAfterRetry,
    FallbackAfterError,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Invoking => "invoking",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::FallbackNoCredential => "fallback_no_credential",
            Self::FallbackAfterRetry => "fallback_after_retry",
            Self::FallbackAfterError => "fallback_after_error",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Validating | Self::Invoking | Self::Retrying)
    }

    /// Terminal states only move on to last-resort recovery.
    pub fn can_enter(self, to: Self) -> bool {
        !self.is_terminal() || matches!(to, Self::FallbackAfterError | Self::Failed)
    }

    /// Terminal state reached for a completed response in the given mode.
    pub fn for_mode(mode: TransformMode) -> Self {
        match mode {
            TransformMode::Live => Self::Succeeded,
            TransformMode::MockNoCredential => Self::FallbackNoCredential,
            TransformMode::FallbackAfterRetry => Self::FallbackAfterRetry,
            TransformMode::FallbackAfterError => Self::FallbackAfterError,
        }
    }
}

#[cfg(test)]
mod tests {
    use roomshift_contracts::response::TransformMode;

    use super::PipelineState;

    #[test]
    fn modes_map_to_terminal_states() {
        for mode in [
            TransformMode::Live,
            TransformMode::MockNoCredential,
            TransformMode::FallbackAfterRetry,
            TransformMode::FallbackAfterError,
        ] {
            assert!(PipelineState::for_mode(mode).is_terminal());
        }
        assert!(!PipelineState::Retrying.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
    }

    #[test]
    fn terminal_states_only_lead_to_recovery() {
        assert!(PipelineState::Validating.can_enter(PipelineState::Invoking));
        assert!(PipelineState::Retrying.can_enter(PipelineState::FallbackAfterRetry));
        assert!(!PipelineState::Succeeded.can_enter(PipelineState::Invoking));
        assert!(!PipelineState::FallbackNoCredential.can_enter(PipelineState::Retrying));
        assert!(PipelineState::FallbackAfterRetry.can_enter(PipelineState::FallbackAfterError));
        assert!(PipelineState::FallbackAfterError.can_enter(PipelineState::Failed));
    }
}
