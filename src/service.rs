//! Question-to-result pipeline.
//!
//! Each call is one linear pass: budget check, input validation, dataset
//! resolution, prompt, bounded completion, cost recording, sentinel check,
//! SQL gate, execution. The first failing stage ends the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dataset::{DatasetRegistry, ResolvedDataset};
use crate::db::{DatabaseClient, QueryResult};
use crate::error::{AskError, Result};
use crate::evaluation::{same_rows, CaseOutcome, EvalCase, EvaluationReport};
use crate::llm::{
    build_feedback_prompt, build_prompt, parse_completion, sanitize_completion, CompletionOutput,
    LlmClient,
};
use crate::monitoring::{Completion, Monitor, Recorded};
use crate::safety::SqlGate;

/// Default bound on a single completion call.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// A generated and executed query.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub request_id: String,
    pub sql_query: String,
    pub result: QueryResult,
    /// Time from admission to a completed model call.
    pub latency: Duration,
    pub cost: f64,
    pub total_cost: f64,
    /// Set for feedback regenerations.
    pub original_request_id: Option<String>,
    pub feedback_applied: bool,
}

/// A clarification of an earlier question.
#[derive(Debug, Clone, Default)]
pub struct FeedbackRequest {
    pub original_question: String,
    pub feedback: String,
    pub request_id: Option<String>,
    pub dataset: Option<String>,
}

/// Runs questions against datasets.
pub struct QueryService {
    registry: Arc<DatasetRegistry>,
    llm: Arc<dyn LlmClient>,
    monitor: Arc<Monitor>,
    gate: SqlGate,
    llm_timeout: Duration,
}

impl QueryService {
    /// Creates a service with the parser-backed gate and default timeouts.
    pub fn new(
        registry: Arc<DatasetRegistry>,
        llm: Arc<dyn LlmClient>,
        monitor: Arc<Monitor>,
    ) -> Self {
        Self {
            registry,
            llm,
            monitor,
            gate: SqlGate::new(),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    /// Replaces the SQL gate.
    pub fn with_gate(mut self, gate: SqlGate) -> Self {
        self.gate = gate;
        self
    }

    /// Sets the bound on a single completion call.
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Answers a fresh question.
    pub async fn generate(&self, question: &str, dataset: Option<&str>) -> Result<GeneratedQuery> {
        let start = Instant::now();
        self.monitor.admit()?;

        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::invalid_input("Question is required."));
        }

        let dataset = self.registry.resolve(dataset).await?;
        self.answer(&dataset, question, start).await
    }

    /// Prompts, records and runs one admitted question against `dataset`.
    async fn answer(
        &self,
        dataset: &ResolvedDataset,
        question: &str,
        start: Instant,
    ) -> Result<GeneratedQuery> {
        let prompt = build_prompt(&dataset.schema, question);

        let output = self.complete(&prompt).await?;
        let latency = start.elapsed();
        let recorded = self.monitor.record_request(
            question,
            Completion {
                prompt: &prompt,
                output: &output,
                latency,
            },
        );
        info!(
            "Request {} on '{}' completed in {:.3}s",
            recorded.request_id,
            dataset.name,
            latency.as_secs_f64()
        );

        self.finish(dataset, output, latency, recorded).await
    }

    /// Regenerates SQL for an earlier question using the user's clarification.
    pub async fn regenerate_with_feedback(
        &self,
        request: FeedbackRequest,
    ) -> Result<GeneratedQuery> {
        let start = Instant::now();
        self.monitor.admit()?;

        let original_question = request.original_question.trim();
        let feedback = request.feedback.trim();
        if original_question.is_empty() || feedback.is_empty() {
            return Err(AskError::invalid_input(
                "Both original_question and feedback are required.",
            ));
        }

        let dataset = self.registry.resolve(request.dataset.as_deref()).await?;
        let prompt = build_feedback_prompt(&dataset.schema, original_question, feedback);

        let output = self.complete(&prompt).await?;
        let latency = start.elapsed();
        let recorded = self.monitor.record_feedback(
            original_question,
            feedback,
            request.request_id.as_deref(),
            Completion {
                prompt: &prompt,
                output: &output,
                latency,
            },
        );
        info!(
            "Feedback request {} (for {}) completed in {:.3}s",
            recorded.request_id,
            request.request_id.as_deref().unwrap_or("-"),
            latency.as_secs_f64()
        );

        let mut generated = self.finish(&dataset, output, latency, recorded).await?;
        generated.feedback_applied = true;
        generated.original_request_id = request.request_id;
        Ok(generated)
    }

    /// Scores generated SQL against gold queries on one dataset.
    ///
    /// A case is correct when both queries run and return the same set of
    /// rows. Every case goes through the cost cap; the run stops with
    /// `BudgetExhausted` once it is reached. `pause` is slept between cases.
    pub async fn evaluate(
        &self,
        cases: &[EvalCase],
        dataset: Option<&str>,
        pause: Duration,
    ) -> Result<EvaluationReport> {
        let dataset = self.registry.resolve(dataset).await?;
        info!(
            "Evaluating {} questions on '{}'",
            cases.len(),
            dataset.name
        );

        let mut report = EvaluationReport::default();
        for (index, case) in cases.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let outcome = self.evaluate_case(&dataset, case).await?;
            if outcome.correct {
                debug!("Case {} correct", index + 1);
            } else {
                info!(
                    "Case {} incorrect: {}",
                    index + 1,
                    outcome.error.as_deref().unwrap_or("results differ")
                );
            }
            report.outcomes.push(outcome);
        }

        info!(
            "Execution accuracy {:.2}% ({}/{})",
            report.accuracy(),
            report.correct(),
            report.total()
        );
        Ok(report)
    }

    async fn evaluate_case(
        &self,
        dataset: &ResolvedDataset,
        case: &EvalCase,
    ) -> Result<CaseOutcome> {
        let start = Instant::now();
        self.monitor.admit()?;

        let mut outcome = CaseOutcome::new(case);
        let question = case.question.trim();
        if question.is_empty() {
            outcome.error = Some("Question is required.".to_string());
            return Ok(outcome);
        }

        let generated = match self.answer(dataset, question, start).await {
            Ok(generated) => generated,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return Ok(outcome);
            }
        };
        outcome.generated_sql = Some(generated.sql_query);

        match self.execute(dataset, &case.query).await {
            Ok(gold) => outcome.correct = same_rows(&gold.rows, &generated.result.rows),
            Err(e) => outcome.error = Some(format!("Gold query failed: {e}")),
        }
        Ok(outcome)
    }

    /// Calls the model under the configured deadline and strips code fences.
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("Prompt is {} bytes", prompt.len());

        let raw = tokio::time::timeout(self.llm_timeout, self.llm.complete(prompt))
            .await
            .map_err(|_| {
                AskError::timeout(format!(
                    "Completion exceeded {} seconds",
                    self.llm_timeout.as_secs()
                ))
            })??;

        Ok(sanitize_completion(&raw))
    }

    async fn finish(
        &self,
        dataset: &ResolvedDataset,
        output: String,
        latency: Duration,
        recorded: Recorded,
    ) -> Result<GeneratedQuery> {
        let sql = match parse_completion(&output) {
            CompletionOutput::Declined => {
                info!("Request {} declined by the model", recorded.request_id);
                return Err(AskError::Declined);
            }
            CompletionOutput::Sql(sql) => sql,
        };

        if let Err(rejection) = self.gate.check(&sql) {
            warn!("Request {} rejected: {}", recorded.request_id, rejection);
            return Err(rejection.into());
        }

        let result = self.execute(dataset, &sql).await?;

        Ok(GeneratedQuery {
            request_id: recorded.request_id,
            sql_query: sql,
            result,
            latency,
            cost: recorded.cost,
            total_cost: recorded.total_cost,
            original_request_id: None,
            feedback_applied: false,
        })
    }

    async fn execute(&self, dataset: &ResolvedDataset, sql: &str) -> Result<QueryResult> {
        let store = self.registry.open(&dataset.db_path).await?;
        let result = store.execute_query(sql).await;
        store.close().await?;

        let result = result?;
        debug!(
            "Query returned {} rows in {:?}",
            result.row_count(),
            result.execution_time
        );
        Ok(result)
    }
}
