use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    errors::{SentinelError, SentinelResult},
    models::JobKind,
    traits::JobExecutor,
};

/// Maps each job kind to the executor that runs it.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<JobKind, Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: JobKind, executor: Arc<dyn JobExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn with(mut self, kind: JobKind, executor: Arc<dyn JobExecutor>) -> Self {
        self.register(kind, executor);
        self
    }

    pub fn get(&self, kind: JobKind) -> SentinelResult<Arc<dyn JobExecutor>> {
        self.executors.get(&kind).cloned().ok_or_else(|| {
            SentinelError::TaskExecution(format!("未注册的作业类型: {kind}"))
        })
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        self.executors.keys().copied().collect()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
