//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::EngineConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a [`ConfigError::InvalidValue`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &EngineConfig) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_resolver(config, &mut result);
        Self::validate_geometry(config, &mut result);
        Self::validate_positioner(config, &mut result);
        Self::validate_orchestrator(config, &mut result);
        Self::validate_auth(config, &mut result);

        Ok(result)
    }

    fn validate_resolver(config: &EngineConfig, result: &mut ValidationResult) {
        let resolver = &config.resolver;
        if resolver.timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "resolver.timeout_ms",
                "timeout_ms must be greater than 0",
            ));
        }

        if resolver.max_retries > 0 && resolver.retry_delay_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "resolver.retry_delay_ms",
                "retries without delay will exhaust immediately",
            ));
        }

        let worst_case = resolver.retry_delay_ms.saturating_mul(u64::from(resolver.max_retries));
        if worst_case > resolver.timeout_ms {
            result.add_warning(ValidationWarning::new(
                "resolver.max_retries",
                "retry schedule exceeds timeout_ms, later retries never run",
            ));
        }
    }

    fn validate_geometry(config: &EngineConfig, result: &mut ValidationResult) {
        let geometry = &config.geometry;
        if geometry.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "geometry.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        if geometry.frame_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "geometry.frame_interval_ms",
                "frame_interval_ms must be greater than 0",
            ));
        }

        if geometry.poll_interval_ms > 0 && geometry.poll_interval_ms < geometry.frame_interval_ms {
            result.add_warning(ValidationWarning::new(
                "geometry.poll_interval_ms",
                "poll interval shorter than one frame",
            ));
        }
    }

    fn validate_positioner(config: &EngineConfig, result: &mut ValidationResult) {
        let positioner = &config.positioner;
        for (path, value) in [
            ("positioner.margin", positioner.margin),
            ("positioner.gap", positioner.gap),
            ("positioner.tail_inset", positioner.tail_inset),
        ] {
            if !value.is_finite() || value < 0.0 {
                result.add_error(ValidationError::new(path, "must be a non-negative number"));
            }
        }
    }

    fn validate_orchestrator(config: &EngineConfig, result: &mut ValidationResult) {
        let orchestrator = &config.orchestrator;
        if orchestrator.forced_step_param.trim().is_empty() {
            result.add_error(ValidationError::new(
                "orchestrator.forced_step_param",
                "forced_step_param cannot be empty",
            ));
        }

        if orchestrator.max_transition_hops == 0 {
            result.add_error(ValidationError::new(
                "orchestrator.max_transition_hops",
                "max_transition_hops must be greater than 0",
            ));
        }

        if orchestrator.start_lock_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "orchestrator.start_lock_ms",
                "start lock disabled, repeated starts will not be suppressed",
            ));
        }

        if orchestrator.trigger_poll_ms == 0 {
            result.add_error(ValidationError::new(
                "orchestrator.trigger_poll_ms",
                "trigger_poll_ms must be greater than 0",
            ));
        }
    }

    fn validate_auth(config: &EngineConfig, result: &mut ValidationResult) {
        match &config.auth.embed_key {
            None => result.add_warning(ValidationWarning::new(
                "auth.embed_key",
                "no embed key configured, the key must come from the page",
            )),
            Some(key) if key.trim().is_empty() => result.add_error(ValidationError::new(
                "auth.embed_key",
                "embed_key cannot be empty",
            )),
            Some(_) => {}
        }
        if config.auth.embed_key.is_none() && config.auth.page_key_element.trim().is_empty() {
            result.add_error(ValidationError::new(
                "auth.page_key_element",
                "page_key_element cannot be empty without an embed_key",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
