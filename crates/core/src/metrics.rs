use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

pub trait MetricsSink: Send + Sync {
    fn record_llm_usage(&self, agent: &str, usage: TokenUsage);
    fn record_tool_call(&self, tool: &str, success: bool);
    fn record_fallback(&self, agent: &str, reason: &str);
}

/// Emits every measurement as a structured `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_llm_usage(&self, agent: &str, usage: TokenUsage) {
        info!(
            event_name = "metrics.llm.usage",
            agent,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total(),
            "llm usage recorded"
        );
    }

    fn record_tool_call(&self, tool: &str, success: bool) {
        info!(event_name = "metrics.tool.call", tool, success, "tool call recorded");
    }

    fn record_fallback(&self, agent: &str, reason: &str) {
        info!(event_name = "metrics.agent.fallback", agent, reason, "fallback recorded");
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub usage_by_agent: HashMap<String, TokenUsage>,
    pub tool_successes: HashMap<String, u64>,
    pub tool_failures: HashMap<String, u64>,
    pub fallbacks: Vec<(String, String)>,
}

/// Counters kept in process, readable through [`InMemoryMetricsSink::snapshot`].
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    state: Mutex<MetricsSnapshot>,
}

impl InMemoryMetricsSink {
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record_llm_usage(&self, agent: &str, usage: TokenUsage) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.usage_by_agent.entry(agent.to_string()).or_default().add(usage);
    }

    fn record_tool_call(&self, tool: &str, success: bool) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let counters = if success { &mut state.tool_successes } else { &mut state.tool_failures };
        *counters.entry(tool.to_string()).or_default() += 1;
    }

    fn record_fallback(&self, agent: &str, reason: &str) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.fallbacks.push((agent.to_string(), reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryMetricsSink, MetricsSink, TokenUsage};

    #[test]
    fn in_memory_sink_accumulates_per_agent_and_tool() {
        let sink = InMemoryMetricsSink::default();
        sink.record_llm_usage("admin", TokenUsage { prompt_tokens: 10, completion_tokens: 5 });
        sink.record_llm_usage("admin", TokenUsage { prompt_tokens: 1, completion_tokens: 1 });
        sink.record_tool_call("toggle_product", true);
        sink.record_tool_call("toggle_product", false);
        sink.record_fallback("admin", "rate_limited");

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.usage_by_agent["admin"].total(), 17);
        assert_eq!(snapshot.tool_successes["toggle_product"], 1);
        assert_eq!(snapshot.tool_failures["toggle_product"], 1);
        assert_eq!(snapshot.fallbacks.len(), 1);
    }
}
