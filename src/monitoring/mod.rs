//! Request monitoring and spend cap.
//!
//! The `Monitor` keeps process-lifetime request history and the running cost
//! estimate behind a single mutex. It is owned by the application state and
//! shared through an `Arc`; nothing here is persisted.
//!
//! `admit` and `record_*` are each atomic, but the completion call between
//! them runs outside the lock. Concurrent in-flight requests can therefore
//! push the total past the cap by at most their own cost.

mod cost;

pub use cost::{round_to, CostEstimator};

use crate::config::BudgetConfig;
use crate::error::{AskError, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

/// One completion, as listed in the request history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub timestamp: String,
    pub question: String,
    pub sql_query: String,
    /// Seconds.
    pub latency: f64,
    pub cost: f64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub feedback_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_request_id: Option<String>,
}

/// One feedback-driven regeneration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSession {
    pub feedback_request_id: String,
    pub original_request_id: Option<String>,
    pub timestamp: String,
    pub original_question: String,
    pub feedback: String,
    pub regenerated_sql: String,
    /// Seconds.
    pub latency: f64,
    pub cost: f64,
    pub total_cost: f64,
}

/// Completion details handed to the monitor after a call returns.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub prompt: &'a str,
    pub output: &'a str,
    pub latency: Duration,
}

/// What `record_*` hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub request_id: String,
    pub cost: f64,
    pub total_cost: f64,
}

/// Aggregate view returned by the monitoring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringSnapshot {
    pub total_requests: usize,
    pub total_feedback_sessions: usize,
    pub total_cost: f64,
    pub cost_cap: f64,
    pub remaining_budget: f64,
    pub recent_requests: Vec<RequestRecord>,
    pub recent_feedback_sessions: Vec<FeedbackSession>,
    pub average_latency: f64,
    pub feedback_improvement_rate: f64,
}

#[derive(Debug, Default)]
struct MonitorState {
    requests: Vec<RequestRecord>,
    feedback_sessions: Vec<FeedbackSession>,
    total_cost: f64,
}

/// Lock-protected request counters and cost cap.
#[derive(Debug)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    estimator: CostEstimator,
    cost_cap: f64,
    recent_requests: usize,
    recent_feedback: usize,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(&BudgetConfig::default())
    }
}

impl Monitor {
    /// Creates an empty monitor.
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            estimator: CostEstimator::from_config(config),
            cost_cap: config.cost_cap,
            recent_requests: config.recent_requests,
            recent_feedback: config.recent_feedback,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configured spend cap.
    pub fn cost_cap(&self) -> f64 {
        self.cost_cap
    }

    /// Running cost estimate.
    pub fn total_cost(&self) -> f64 {
        self.lock().total_cost
    }

    /// Refuses new completions once the running total has reached the cap.
    pub fn admit(&self) -> Result<()> {
        let total = self.lock().total_cost;
        if total >= self.cost_cap {
            warn!(
                "Cost cap reached ({:.6} >= {:.6}), refusing completion",
                total, self.cost_cap
            );
            return Err(AskError::BudgetExhausted);
        }
        Ok(())
    }

    /// Adds the completion's cost and appends it to the request history.
    pub fn record_request(&self, question: &str, completion: Completion<'_>) -> Recorded {
        let cost = self.estimator.estimate(completion.prompt, completion.output);
        let now = OffsetDateTime::now_utc();

        let mut state = self.lock();
        state.total_cost += cost;
        let request_id = format!("{}_{}", id_stamp(now), state.requests.len());
        let total_cost = state.total_cost;

        state.requests.push(RequestRecord {
            request_id: request_id.clone(),
            timestamp: timestamp(now),
            question: question.to_string(),
            sql_query: completion.output.to_string(),
            latency: completion.latency.as_secs_f64(),
            cost,
            total_cost,
            feedback_applied: false,
            original_request_id: None,
        });

        Recorded {
            request_id,
            cost,
            total_cost,
        }
    }

    /// Adds the completion's cost and records a feedback session.
    ///
    /// The regeneration also appears in the request history, tagged with the
    /// feedback text.
    pub fn record_feedback(
        &self,
        original_question: &str,
        feedback: &str,
        original_request_id: Option<&str>,
        completion: Completion<'_>,
    ) -> Recorded {
        let cost = self.estimator.estimate(completion.prompt, completion.output);
        let now = OffsetDateTime::now_utc();
        let latency = completion.latency.as_secs_f64();

        let mut state = self.lock();
        state.total_cost += cost;
        let request_id = format!("{}_fb_{}", id_stamp(now), state.feedback_sessions.len());
        let total_cost = state.total_cost;
        let original_request_id = original_request_id.map(str::to_string);

        state.feedback_sessions.push(FeedbackSession {
            feedback_request_id: request_id.clone(),
            original_request_id: original_request_id.clone(),
            timestamp: timestamp(now),
            original_question: original_question.to_string(),
            feedback: feedback.to_string(),
            regenerated_sql: completion.output.to_string(),
            latency,
            cost,
            total_cost,
        });

        state.requests.push(RequestRecord {
            request_id: request_id.clone(),
            timestamp: timestamp(now),
            question: format!("{} [FEEDBACK: {}]", original_question, feedback),
            sql_query: completion.output.to_string(),
            latency,
            cost,
            total_cost,
            feedback_applied: true,
            original_request_id,
        });

        Recorded {
            request_id,
            cost,
            total_cost,
        }
    }

    /// Aggregates the current history.
    pub fn snapshot(&self) -> MonitoringSnapshot {
        let state = self.lock();
        let total_requests = state.requests.len();

        let (average_latency, feedback_improvement_rate) = if total_requests == 0 {
            (0.0, 0.0)
        } else {
            let latency_sum: f64 = state.requests.iter().map(|r| r.latency).sum();
            (
                latency_sum / total_requests as f64,
                state.feedback_sessions.len() as f64 / total_requests as f64 * 100.0,
            )
        };

        MonitoringSnapshot {
            total_requests,
            total_feedback_sessions: state.feedback_sessions.len(),
            total_cost: round_to(state.total_cost, 6),
            cost_cap: self.cost_cap,
            remaining_budget: round_to(self.cost_cap - state.total_cost, 6),
            recent_requests: tail(&state.requests, self.recent_requests),
            recent_feedback_sessions: tail(&state.feedback_sessions, self.recent_feedback),
            average_latency: round_to(average_latency, 3),
            feedback_improvement_rate: round_to(feedback_improvement_rate, 1),
        }
    }

    /// Clears both histories and sets the running total to zero.
    pub fn reset(&self) {
        *self.lock() = MonitorState::default();
    }
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

fn id_stamp(now: OffsetDateTime) -> String {
    now.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_default()
}

fn timestamp(now: OffsetDateTime) -> String {
    now.format(&Rfc3339).unwrap_or_default()
}
