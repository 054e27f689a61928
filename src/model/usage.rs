//! Model usage counters.
//!
//! Counters are advisory: they live for the process lifetime, only grow,
//! and are reset only on explicit request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Accumulated usage for one task type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub task_type: String,
    pub total_tokens: u64,
    pub request_count: u64,
}

/// Process-wide usage counters keyed by task type.
#[derive(Debug, Default)]
pub struct UsageTracker {
    counters: Mutex<HashMap<String, UsageCounter>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request that used `tokens` tokens.
    pub fn track(&self, task_type: &str, tokens: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            let counter = counters
                .entry(task_type.to_string())
                .or_insert_with(|| UsageCounter {
                    task_type: task_type.to_string(),
                    ..Default::default()
                });
            counter.total_tokens = counter.total_tokens.saturating_add(tokens);
            counter.request_count = counter.request_count.saturating_add(1);
        }
    }

    /// Counter for one task type.
    pub fn get(&self, task_type: &str) -> Option<UsageCounter> {
        self.counters.lock().ok()?.get(task_type).cloned()
    }

    /// Copy of all counters, sorted by task type.
    pub fn snapshot(&self) -> Vec<UsageCounter> {
        let mut counters: Vec<UsageCounter> = match self.counters.lock() {
            Ok(counters) => counters.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        counters.sort_by(|a, b| a.task_type.cmp(&b.task_type));
        counters
    }

    /// Reset one task's counter. Returns whether it existed.
    pub fn reset(&self, task_type: &str) -> bool {
        self.counters
            .lock()
            .map(|mut counters| counters.remove(task_type).is_some())
            .unwrap_or(false)
    }

    pub fn reset_all(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.clear();
        }
    }
}

/// Rough token estimate: whitespace-separated words.
pub fn estimate_tokens(prompt: &str) -> u64 {
    prompt.split_whitespace().count() as u64
}
