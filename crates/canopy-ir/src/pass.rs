//! Module passes and the pipeline that runs them.

use tracing::{debug, info};

use crate::context::IrContext;
use crate::dialect::DialectRegistry;
use crate::error::PassError;
use crate::ops::Module;
use crate::rewrite::{PatternApplicator, RewriteMode};
use crate::transforms::dce::{DceConfig, eliminate_dead_code_with_config};
use crate::validation::check_invariants;

/// A named unit of work over a whole module.
///
/// Passes run in sequence; each may assume the previous one left the module
/// verifiable.
pub trait ModulePass {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Verify the module and check graph invariants after every pass.
    /// Default: true.
    pub verify_after_each_pass: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verify_after_each_pass: true,
        }
    }
}

/// Ordered list of passes sharing one dialect registry for verification.
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
    registry: DialectRegistry,
    config: PipelineConfig,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new(DialectRegistry::with_builtin())
    }
}

impl PassManager {
    pub fn new(registry: DialectRegistry) -> Self {
        Self {
            passes: Vec::new(),
            registry,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_pass(mut self, pass: impl ModulePass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn registry(&self) -> &DialectRegistry {
        &self.registry
    }

    /// Run every pass in order, stopping at the first failure.
    #[tracing::instrument(skip_all)]
    pub fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        for pass in &self.passes {
            let name = pass.name();
            info!(pass = name, "running pass");
            pass.run(ctx, module)?;
            if self.config.verify_after_each_pass {
                check_invariants(ctx, module.op()).map_err(|e| PassError::new(name, e))?;
                self.registry
                    .verify(ctx, module.op())
                    .map_err(|e| PassError::new(name, e))?;
            }
            debug!(pass = name, "pass finished");
        }
        Ok(())
    }
}

/// [`eliminate_dead_code_with_config`] as a pass.
#[derive(Debug, Clone, Default)]
pub struct DeadCodeElimination {
    pub config: DceConfig,
}

impl ModulePass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        let result = eliminate_dead_code_with_config(ctx, module, &self.config)
            .map_err(|e| PassError::new(self.name(), e))?;
        debug!(removed = result.removed_count, "dead code eliminated");
        Ok(())
    }
}

/// A pattern applicator as a pass.
pub struct RewritePass {
    name: &'static str,
    applicator: PatternApplicator,
    mode: RewriteMode,
    /// Fail when fixpoint mode stops at the iteration cap.
    require_fixpoint: bool,
}

impl RewritePass {
    pub fn new(name: &'static str, applicator: PatternApplicator) -> Self {
        Self {
            name,
            applicator,
            mode: RewriteMode::Fixpoint,
            require_fixpoint: false,
        }
    }

    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn require_fixpoint(mut self) -> Self {
        self.require_fixpoint = true;
        self
    }
}

impl ModulePass for RewritePass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        let result = self
            .applicator
            .apply(ctx, module, self.mode)
            .map_err(|e| PassError::new(self.name, e))?;
        if self.require_fixpoint && self.mode == RewriteMode::Fixpoint && !result.reached_fixpoint {
            return Err(PassError::failed(
                self.name,
                format_args!("no fixpoint after {} iterations", result.iterations),
            ));
        }
        Ok(())
    }
}
