//! Runtime Builder API
//!
//! Builder-style setup for consumers (CLI, demo, tests) that want to pick a
//! radio, capabilities and configuration in one expression.

use crate::logic::LoggerWrapper;
use crate::runtime::MessagingRuntime;
use bluemsg_core::{
    internal::{LogLevel, NoOpLogger, TracingLogger},
    AlwaysReady, BluemsgConfig, BluemsgResult, Capabilities, Radio,
};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a `MessagingRuntime`
pub struct RuntimeBuilder {
    radio: Arc<dyn Radio>,
    capabilities: Arc<dyn Capabilities>,
    config: BluemsgConfig,
    logger: LoggerWrapper,
}

impl RuntimeBuilder {
    /// Start from a radio with default configuration and an always-ready host
    pub fn new(radio: Arc<dyn Radio>) -> Self {
        Self {
            radio,
            capabilities: Arc::new(AlwaysReady),
            config: BluemsgConfig::default(),
            logger: LoggerWrapper::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn Capabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_config(mut self, config: BluemsgConfig) -> Self {
        self.config = config;
        self
    }

    /// Log inter-task traffic at `level` and above
    pub fn with_task_logging(mut self, level: LogLevel) -> Self {
        self.logger = LoggerWrapper::Tracing(TracingLogger::new(level));
        self
    }

    /// Disable inter-task traffic logging
    pub fn with_no_logging(mut self) -> Self {
        self.logger = LoggerWrapper::NoOp(NoOpLogger);
        self
    }

    /// Build without starting
    pub fn build(self) -> MessagingRuntime {
        MessagingRuntime::new(self.radio, self.capabilities, self.config).with_logger(self.logger)
    }

    /// Build and start the runtime
    pub async fn start(self) -> BluemsgResult<MessagingRuntime> {
        let mut runtime = self.build();
        runtime.start().await?;
        Ok(runtime)
    }
}
