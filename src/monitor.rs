use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

use crate::document::AgentRole;

/// Observer notified as the pipeline progresses.
pub trait PipelineListener: Send {
    fn on_phase_started(&self, role: AgentRole, page_name: &str);

    fn on_phase_completed(&self, role: AgentRole, page_name: &str, elapsed: Duration);

    fn on_pipeline_finished(&self, page_name: &str, success: bool, elapsed: Duration);
}

/// Listener that narrates progress through tracing.
pub struct LogListener;

impl PipelineListener for LogListener {
    fn on_phase_started(&self, role: AgentRole, page_name: &str) {
        info!("[wikismith:monitor] {role} started on {page_name}");
    }

    fn on_phase_completed(&self, role: AgentRole, page_name: &str, elapsed: Duration) {
        info!(
            "[wikismith:monitor] {role} finished on {page_name} in {}ms",
            elapsed.as_millis()
        );
    }

    fn on_pipeline_finished(&self, page_name: &str, success: bool, elapsed: Duration) {
        info!(
            "[wikismith:monitor] pipeline for {page_name} finished (success={success}) in {}s",
            elapsed.as_secs()
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Fan-out to listeners plus a per-role token ledger and phase timings.
pub struct Monitor {
    listeners: Vec<Box<dyn PipelineListener>>,
    tokens: Mutex<HashMap<AgentRole, TokenUsage>>,
    timings: Mutex<Vec<(AgentRole, Duration)>>,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            tokens: Mutex::new(HashMap::new()),
            timings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn PipelineListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn phase_started(&self, role: AgentRole, page_name: &str) {
        for listener in &self.listeners {
            listener.on_phase_started(role, page_name);
        }
    }

    pub fn phase_completed(
        &self,
        role: AgentRole,
        page_name: &str,
        elapsed: Duration,
        input_tokens: u64,
        output_tokens: u64,
    ) {
        {
            let mut tokens = self.tokens.lock().unwrap();
            let entry = tokens.entry(role).or_default();
            entry.input_tokens += input_tokens;
            entry.output_tokens += output_tokens;
        }
        self.timings.lock().unwrap().push((role, elapsed));
        for listener in &self.listeners {
            listener.on_phase_completed(role, page_name, elapsed);
        }
    }

    pub fn pipeline_finished(&self, page_name: &str, success: bool, elapsed: Duration) {
        for listener in &self.listeners {
            listener.on_pipeline_finished(page_name, success, elapsed);
        }
    }

    pub fn tokens_for(&self, role: AgentRole) -> TokenUsage {
        self.tokens
            .lock()
            .unwrap()
            .get(&role)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_tokens(&self) -> TokenUsage {
        let tokens = self.tokens.lock().unwrap();
        let mut total = TokenUsage::default();
        for usage in tokens.values() {
            total.input_tokens += usage.input_tokens;
            total.output_tokens += usage.output_tokens;
        }
        total
    }

    pub fn phase_count(&self) -> usize {
        self.timings.lock().unwrap().len()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
