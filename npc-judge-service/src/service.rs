mod workers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::agent::{HtmlReportRenderer, ReActAgent, Report};
use crate::config::AppConfig;
use crate::db::{AgentRequest, Database, JudgeRequest};
use crate::embeddings::Embedder;
use crate::error::{ReportError, ServiceError, ServiceResult, format_error_chain};
use crate::judge::JudgeEngine;
use crate::llm::ChatModel;
use crate::rag::{RetrievalService, SeedReport, VectorSeeder, VectorStore};
use crate::tools::ToolRegistry;

/// Main service coordinator
pub struct NpcJudgeService {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub store: Arc<VectorStore>,
    judge: JudgeEngine,
    agent: ReActAgent,
    seeder: VectorSeeder,
    reports_dir: PathBuf,
}

impl NpcJudgeService {
    /// Wire the judge, the agent and the seeder around one shared vector store
    pub fn new(
        config: AppConfig,
        db: Arc<Database>,
        llm: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        info!("Initializing NPC judge service");

        let store = Arc::new(VectorStore::new());
        let retrieval = Arc::new(RetrievalService::new(store.clone(), embedder.clone()));

        let judge = JudgeEngine::new(db.clone(), retrieval, llm.clone(), config.judge.clone());

        let tools = Arc::new(ToolRegistry::with_default_tools(db.clone()));
        info!(tools = tools.len(), "Agent tools registered");
        let agent = ReActAgent::new(
            llm,
            tools,
            Arc::new(HtmlReportRenderer::new()),
            config.agent.clone(),
        );

        let seeder = VectorSeeder::new(
            db.clone(),
            embedder,
            store.clone(),
            config.embeddings.seed_concurrency,
        );

        Self {
            reports_dir: config.storage.reports_dir(),
            config,
            db,
            store,
            judge,
            agent,
            seeder,
        }
    }

    /// Embed stored rules and conversations into the vector store
    pub async fn seed_vector_store(&self) -> ServiceResult<SeedReport> {
        self.seeder.seed().await
    }

    /// Judge one queued conversation and write the outcome back to the queue
    pub async fn process_judge_request(&self, request: &JudgeRequest) {
        let outcome = self
            .judge
            .judge(&request.session_id, &request.player_id, &request.npc_id)
            .await;

        let write_back = match outcome {
            Ok(verdict) => {
                info!(
                    request_id = %request.id,
                    tone = %verdict.overall_tone,
                    fairness = verdict.fairness_score,
                    "Judge request completed"
                );
                self.db.complete_judge_request(&request.id)
            }
            Err(e) => {
                log_request_failure("judge", &request.id, &e);
                self.db
                    .fail_judge_request(&request.id, e.error_code(), &format_error_chain(&e))
            }
        };

        if let Err(e) = write_back {
            error!(request_id = %request.id, error = %e, "Failed to record judge request outcome");
        }
    }

    /// Run the agent for one queued query, saving any report under the
    /// reports directory
    pub async fn process_agent_request(&self, request: &AgentRequest) {
        let write_back = match self.agent.run(&request.query).await {
            Ok(response) => {
                let report_path = match &response.report {
                    Some(report) => match self.write_report(report).await {
                        Ok(path) => Some(path.display().to_string()),
                        Err(e) => {
                            warn!(
                                request_id = %request.id,
                                error = %format_error_chain(&e),
                                "Failed to save report, returning text only"
                            );
                            None
                        }
                    },
                    None => None,
                };

                info!(
                    request_id = %request.id,
                    iterations = response.iterations,
                    charts = response.charts.len(),
                    report = report_path.is_some(),
                    "Agent request completed"
                );
                self.db.complete_agent_request(
                    &request.id,
                    &response.text,
                    &response.charts,
                    report_path.as_deref(),
                )
            }
            Err(e) => {
                log_request_failure("agent", &request.id, &e);
                self.db
                    .fail_agent_request(&request.id, e.error_code(), &format_error_chain(&e))
            }
        };

        if let Err(e) = write_back {
            error!(request_id = %request.id, error = %e, "Failed to record agent request outcome");
        }
    }

    async fn write_report(&self, report: &Report) -> Result<PathBuf, ReportError> {
        write_report_to(&self.reports_dir, report).await
    }
}

async fn write_report_to(dir: &Path, report: &Report) -> Result<PathBuf, ReportError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&report.file_name);
    tokio::fs::write(&path, &report.content).await?;
    Ok(path)
}

fn log_request_failure(kind: &str, request_id: &str, e: &ServiceError) {
    if e.is_not_found() {
        warn!(kind, request_id, error = %e, "Request target not found");
    } else {
        error!(
            kind,
            request_id,
            code = e.error_code(),
            error = %format_error_chain(e),
            "Request failed"
        );
    }
}
