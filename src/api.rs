//! Simple async API facade
//!
//! `Ensemble` owns one agent registry, one session coordinator and a
//! transcript store (in memory unless replaced). Build it with an explicit
//! transport, then register agents, toggle them and run sessions.

use crate::agents::coordinator::SessionCoordinator;
use crate::agents::defaults;
use crate::agents::executor::SequencedExecutor;
use crate::agents::messages::{CallOutcome, SessionReport};
use crate::agents::prompt::{PromptBuilder, TaskContext};
use crate::agents::registry::{
    AgentDefinition, AgentRegistry, ConversationTurn, RegistryExport, RegistryStats,
};
use crate::config::Settings;
use crate::core::fallback::{FallbackTransport, ProviderQuota};
use crate::core::llm::HttpTransport;
use crate::core::transport::{ModelSelector, StaticModelSelector, TransportPort};
use crate::error::Result;
use crate::storage::{InMemoryStorage, TranscriptStorage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Ensemble {
    registry: Arc<AgentRegistry>,
    coordinator: SessionCoordinator,
    transcripts: Arc<dyn TranscriptStorage>,
}

impl Ensemble {
    /// Engine over `transport`, with the model selector taken from `settings.models`
    ///
    /// # Example
    /// ```no_run
    /// use ensemble::core::mock::EchoTransport;
    /// use ensemble::{Ensemble, Settings, TaskContext};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let settings = Settings::defaults()?;
    ///     let ensemble = Ensemble::new(Arc::new(EchoTransport), &settings);
    ///     ensemble.register_default_agents().await?;
    ///     ensemble.activate("orchestrator").await?;
    ///     ensemble.activate("frontend").await?;
    ///
    ///     let report = ensemble
    ///         .run_orchestrated("build a login form", &TaskContext::new())
    ///         .await?;
    ///     println!("{:?}", report.final_answer());
    ///     Ok(())
    /// }
    /// ```
    pub fn new(transport: Arc<dyn TransportPort>, settings: &Settings) -> Self {
        let selector = StaticModelSelector::new(settings.models.default_hint())
            .with_overrides(settings.models.overrides.clone());
        Self::with_selector(transport, Arc::new(selector), settings)
    }

    pub fn with_selector(
        transport: Arc<dyn TransportPort>,
        selector: Arc<dyn ModelSelector>,
        settings: &Settings,
    ) -> Self {
        let registry = Arc::new(AgentRegistry::with_retention(settings.history.max_retained));
        let executor = SequencedExecutor::new(
            registry.clone(),
            transport,
            selector,
            settings.executor.clone(),
        );
        let coordinator = SessionCoordinator::new(
            registry.clone(),
            executor,
            PromptBuilder::new(settings.history.prompt_window),
            settings.session.clone(),
        );

        Self {
            registry,
            coordinator,
            transcripts: Arc::new(InMemoryStorage::new()),
        }
    }

    /// Replace the default in-memory transcript store
    pub fn with_transcripts(mut self, storage: Arc<dyn TranscriptStorage>) -> Self {
        self.transcripts = storage;
        self
    }

    /// HTTP transport for the configured providers, wrapped in the model fallback chain
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = HttpTransport::new(&settings.providers, settings.llm.clone())?;
        let transport = FallbackTransport::new(Arc::new(http), settings.models.fallbacks.clone())
            .with_quota(ProviderQuota::new(
                settings.models.requests_per_minute.clone(),
            ));
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn transcripts(&self) -> &Arc<dyn TranscriptStorage> {
        &self.transcripts
    }

    /// Keep a session trail under `session_id`, overwriting any earlier one
    pub async fn save_transcript(
        &self,
        session_id: &str,
        report: &SessionReport,
    ) -> anyhow::Result<()> {
        self.transcripts.save(session_id, report).await
    }

    pub async fn load_transcript(&self, session_id: &str) -> anyhow::Result<Option<SessionReport>> {
        self.transcripts.load(session_id).await
    }

    pub async fn register_agent(&self, definition: AgentDefinition) -> Result<()> {
        self.registry.register(definition).await
    }

    pub async fn register_default_agents(&self) -> Result<()> {
        defaults::register_defaults(&self.registry).await
    }

    pub async fn activate(&self, id: &str) -> Result<()> {
        self.registry.activate(id).await
    }

    pub async fn deactivate(&self, id: &str) -> Result<()> {
        self.registry.deactivate(id).await
    }

    pub async fn toggle(&self, id: &str) -> Result<bool> {
        self.registry.toggle(id).await
    }

    pub async fn list_agents(&self) -> Vec<Arc<AgentDefinition>> {
        self.registry.list_agents().await
    }

    pub async fn list_active(&self) -> Vec<Arc<AgentDefinition>> {
        self.registry.list_active().await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<ConversationTurn>> {
        self.registry.history(id).await
    }

    pub async fn clear_history(&self, id: &str) -> Result<()> {
        self.registry.clear_history(id).await
    }

    pub async fn clear_all_history(&self) {
        self.registry.clear_all_history().await
    }

    pub async fn stats(&self) -> RegistryStats {
        self.registry.stats().await
    }

    pub async fn export_config(&self) -> RegistryExport {
        self.registry.export_config().await
    }

    /// Collaborative session: analysis, review, then synthesis by the first participant
    pub async fn run_collaborative<S: AsRef<str>>(
        &self,
        participants: &[S],
        task: &str,
        context: &TaskContext,
    ) -> Result<SessionReport> {
        self.run_collaborative_with_cancel(participants, task, context, &CancellationToken::new())
            .await
    }

    pub async fn run_collaborative_with_cancel<S: AsRef<str>>(
        &self,
        participants: &[S],
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        self.coordinator
            .run_collaborative(participants, task, context, cancel)
            .await
    }

    /// Orchestrated session: plan, execute by priority, synthesize
    pub async fn run_orchestrated(&self, task: &str, context: &TaskContext) -> Result<SessionReport> {
        self.run_orchestrated_with_cancel(task, context, &CancellationToken::new())
            .await
    }

    pub async fn run_orchestrated_with_cancel(
        &self,
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        self.coordinator.run_orchestrated(task, context, cancel).await
    }

    /// One ad hoc message to a single agent
    pub async fn send_direct(
        &self,
        agent_id: &str,
        message: &str,
        context: &TaskContext,
    ) -> Result<CallOutcome> {
        self.send_direct_with_cancel(agent_id, message, context, &CancellationToken::new())
            .await
    }

    pub async fn send_direct_with_cancel(
        &self,
        agent_id: &str,
        message: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<CallOutcome> {
        self.coordinator
            .send_direct(agent_id, message, context, cancel)
            .await
    }
}
