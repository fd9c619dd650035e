use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use triage_ai::{AiError, ContentGenerator, GenerateRequest, UploadedFile};
use triage_core::{
    AssembledReport, PiiSettings, ReportAssembler, Schema, TicketAnalysis, parse_json_response,
};
use triage_security::Scrubber;
use triage_sources::{HelpdeskError, TicketSource};
use triage_tokens::{Pricing, TokenEstimator};

use crate::control::RunControl;
use crate::error::{EngineError, Result};
use crate::extract::{Extractor, department_names};
use crate::prompt::{bulk_prompt, per_ticket_prompt};
use crate::session::{FetchFailure, Phase, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// One JSON-mode call per ticket
    #[default]
    PerTicket,
    /// One call over every ticket, answered with a Markdown report
    Bulk,
}

#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub job_type: JobType,
    pub prompt: String,
    /// Sent with bulk jobs only
    pub attachment: Option<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    Classified(Vec<TicketAnalysis>),
    Report(AssembledReport),
    /// The model could not complete; `prompt` is the full bulk prompt to run by hand
    ManualFallback { reason: String, prompt: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub fetched: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
    /// Counted by the model provider
    Counted,
    /// Local tokenizer fallback
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub tokens: u64,
    pub source: EstimateSource,
    pub input_cost: f64,
}

/// Drives the fetch and analyze phases over a [`Session`]
pub struct Orchestrator {
    control: RunControl,
    schema: Schema,
    scrubber: Scrubber,
    source: Option<Arc<dyn TicketSource>>,
    generator: Option<Arc<dyn ContentGenerator>>,
    estimator: Option<TokenEstimator>,
    assembler: ReportAssembler,
    pricing: Pricing,
}

impl Orchestrator {
    pub fn new(control: RunControl) -> Self {
        Self {
            control,
            schema: Schema::default(),
            scrubber: Scrubber::default(),
            source: None,
            generator: None,
            estimator: None,
            assembler: ReportAssembler::default(),
            pricing: Pricing {
                input_per_million: 0.30,
                output_per_million: 2.50,
            },
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_pii(mut self, settings: PiiSettings) -> Self {
        self.scrubber = Scrubber::new(settings);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn TicketSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn with_assembler(mut self, assembler: ReportAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Fetch `ids` one after another into `session`, replacing earlier results.
    ///
    /// A ticket that fails is recorded in `session.fetch_failures` and the
    /// run moves on. The fetch delay only follows a successful ticket.
    pub async fn fetch(&self, session: &mut Session, ids: &[String]) -> Result<FetchSummary> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| EngineError::Precondition("no helpdesk configured".to_string()))?;
        if ids.is_empty() {
            return Err(EngineError::Precondition("no ticket ids to fetch".to_string()));
        }

        session.begin(Phase::Fetching)?;
        session.tickets.clear();
        session.fetch_failures.clear();
        session.analyses.clear();

        let result = self.fetch_all(source.as_ref(), session, ids).await;
        session.finish(&result);
        result
    }

    async fn fetch_all(
        &self,
        source: &dyn TicketSource,
        session: &mut Session,
        ids: &[String],
    ) -> Result<FetchSummary> {
        let departments = match source.departments(self.control.token()).await {
            Ok(list) => department_names(&list),
            Err(HelpdeskError::Cancelled) => return Err(EngineError::Cancelled),
            Err(e) => {
                warn!("department lookup failed, names will be missing: {}", e);
                HashMap::new()
            }
        };
        let extractor = Extractor::new(&self.schema, self.scrubber, departments);

        let total = ids.len();
        for (index, id) in ids.iter().enumerate() {
            self.control.checkpoint().await?;
            info!(ticket = %id, "fetching ticket {}/{}", index + 1, total);

            match source.fetch_ticket(id, self.control.token()).await {
                Ok(bundle) => {
                    session.tickets.push(extractor.extract(bundle));
                    self.control.checkpoint().await?;
                    if index + 1 < total {
                        self.control.sleep(source.fetch_delay()).await?;
                    }
                }
                Err(HelpdeskError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => {
                    warn!(ticket = %id, "fetch failed: {}", e);
                    session.fetch_failures.push(FetchFailure {
                        ticket_id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(FetchSummary {
            fetched: session.tickets.len(),
            failed: session.fetch_failures.len(),
        })
    }

    /// Run `job` over the tickets already in `session`
    pub async fn analyze(&self, session: &mut Session, job: &AnalysisJob) -> Result<AnalyzeOutcome> {
        let generator = self.analyze_preconditions(session, job)?;

        session.begin(Phase::Analyzing)?;
        let result = match job.job_type {
            JobType::PerTicket => self.analyze_each(generator, session, job).await,
            JobType::Bulk => self.analyze_bulk(generator, session, job).await,
        };
        session.finish(&result);
        result
    }

    fn analyze_preconditions(
        &self,
        session: &Session,
        job: &AnalysisJob,
    ) -> Result<&dyn ContentGenerator> {
        if session.tickets.is_empty() {
            return Err(EngineError::Precondition("no tickets fetched".to_string()));
        }
        if job.prompt.trim().is_empty() {
            return Err(EngineError::Precondition("prompt is empty".to_string()));
        }
        match &self.generator {
            Some(generator) if !generator.model().trim().is_empty() => Ok(generator.as_ref()),
            _ => Err(EngineError::Precondition("no model selected".to_string())),
        }
    }

    async fn analyze_each(
        &self,
        generator: &dyn ContentGenerator,
        session: &mut Session,
        job: &AnalysisJob,
    ) -> Result<AnalyzeOutcome> {
        session.analyses.clear();
        let total = session.tickets.len();

        for (index, record) in session.tickets.iter().enumerate() {
            self.control.checkpoint().await?;
            debug!(ticket = %record.id, "classifying ticket {}/{}", index + 1, total);

            let request = GenerateRequest::json(per_ticket_prompt(&job.prompt, record)?);
            let analysis = match generator.generate(&request, self.control.token()).await {
                Ok(generation) => {
                    session.usage.record(&generation.usage);
                    match parse_json_response(&generation.text) {
                        Ok(classification) => TicketAnalysis::classified(&record.id, classification),
                        Err(e) => TicketAnalysis::failed(
                            &record.id,
                            format!("Response was not valid JSON: {}", e),
                        ),
                    }
                }
                Err(AiError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) if e.is_fatal() => {
                    warn!(ticket = %record.id, "stopping analysis: {}", e);
                    return Ok(AnalyzeOutcome::ManualFallback {
                        reason: e.to_string(),
                        prompt: bulk_prompt(&job.prompt, &session.tickets)?,
                    });
                }
                Err(e) => {
                    warn!(ticket = %record.id, "classification failed: {}", e);
                    TicketAnalysis::failed(&record.id, e.to_string())
                }
            };
            session.analyses.push(analysis);
        }

        info!(
            classified = session.analyses.iter().filter(|a| !a.is_failed()).count(),
            failed = session.analyses.iter().filter(|a| a.is_failed()).count(),
            "analysis complete"
        );
        Ok(AnalyzeOutcome::Classified(session.analyses.clone()))
    }

    async fn analyze_bulk(
        &self,
        generator: &dyn ContentGenerator,
        session: &mut Session,
        job: &AnalysisJob,
    ) -> Result<AnalyzeOutcome> {
        self.control.checkpoint().await?;

        let prompt = bulk_prompt(&job.prompt, &session.tickets)?;
        let mut request = GenerateRequest::text(prompt.clone());
        request.attachment = job.attachment.clone();

        match generator.generate(&request, self.control.token()).await {
            Ok(generation) => {
                session.usage.record(&generation.usage);
                let report = self.assembler.assemble(&generation.text);
                info!(sections = report.csvs.len(), "report assembled");
                Ok(AnalyzeOutcome::Report(report))
            }
            Err(AiError::Cancelled) => Err(EngineError::Cancelled),
            Err(e) if e.is_fatal() => {
                warn!("bulk analysis stopped: {}", e);
                Ok(AnalyzeOutcome::ManualFallback {
                    reason: e.to_string(),
                    prompt,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Token count and input cost of the bulk prompt for `instructions`
    pub async fn estimate(&self, session: &Session, instructions: &str) -> Result<Estimate> {
        if session.tickets.is_empty() {
            return Err(EngineError::Precondition("no tickets fetched".to_string()));
        }
        let text = bulk_prompt(instructions, &session.tickets)?;

        if let Some(generator) = &self.generator {
            match generator.count_tokens(&text, self.control.token()).await {
                Ok(tokens) => return Ok(self.priced(tokens, EstimateSource::Counted)),
                Err(AiError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => warn!("count-tokens failed, using local estimate: {}", e),
            }
        }

        let estimator = self
            .estimator
            .as_ref()
            .ok_or_else(|| EngineError::Precondition("no token counter available".to_string()))?;
        Ok(self.priced(estimator.estimate(&text) as u64, EstimateSource::Local))
    }

    fn priced(&self, tokens: u64, source: EstimateSource) -> Estimate {
        Estimate {
            tokens,
            source,
            input_cost: self.pricing.input_cost(tokens),
        }
    }
}
