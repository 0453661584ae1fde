use crate::errors::ToolError;
use crate::managers;
use crate::managers::config::ConfigAction;
use crate::managers::discovery::DiscoveryAction;
use crate::managers::jobs::JobAction;
use crate::mcp::catalog::tool_catalog;
use crate::services::client::{HttpTransport, MoldClient, ReqwestTransport};
use crate::services::config::ConfigService;
use crate::services::job_poller::JobPoller;
use crate::services::logger::Logger;
use crate::services::tool_builder::{AutoRegisterOptions, AutoRegisterSummary, ToolBuilder};
use crate::services::tool_registry::{ToolHandler, ToolRegistry};
use crate::services::validation::Validation;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: Arc<ConfigService>,
    pub client: MoldClient,
    pub poller: JobPoller,
    pub registry: Arc<ToolRegistry>,
    pub builder: ToolBuilder,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete").with_hint(
            "This is a server wiring bug: every tool in tool_catalog.json must have a handler."
                .to_string(),
        )
        .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    /// Production wiring: env/file configuration and the reqwest transport.
    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("mold");
        let config = Arc::new(ConfigService::new(logger.clone()));
        let transport = Arc::new(ReqwestTransport::from_env()?);
        Self::with_parts(logger, config, transport)
    }

    pub fn with_parts(
        logger: Logger,
        config: Arc<ConfigService>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ToolError> {
        let validation = Validation::new();
        let client = MoldClient::new(logger.clone(), config.clone(), transport);
        let poller = JobPoller::new(logger.clone(), client.clone());
        let registry = Arc::new(ToolRegistry::new(logger.clone()));
        let builder = ToolBuilder::new(
            logger.clone(),
            client.clone(),
            poller.clone(),
            registry.clone(),
        );

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(
            "mold_call".to_string(),
            Arc::new(managers::call::CallManager::new(
                logger.clone(),
                validation.clone(),
                client.clone(),
            )),
        );
        for (name, handler) in managers::vm::vm_tool_handlers(&builder) {
            handlers.insert(name.to_string(), handler);
        }
        handlers.insert(
            "mold_waitForJob".to_string(),
            Arc::new(managers::jobs::JobManager::new(
                logger.clone(),
                validation.clone(),
                poller.clone(),
                JobAction::Wait,
            )),
        );
        handlers.insert(
            "mold_cancelJobWait".to_string(),
            Arc::new(managers::jobs::JobManager::new(
                logger.clone(),
                validation.clone(),
                poller.clone(),
                JobAction::CancelWait,
            )),
        );
        handlers.insert(
            "mold_getConfig".to_string(),
            Arc::new(managers::config::ConfigManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                ConfigAction::Get,
            )),
        );
        handlers.insert(
            "mold_setConfig".to_string(),
            Arc::new(managers::config::ConfigManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                ConfigAction::Set,
            )),
        );
        handlers.insert(
            "mold_listApisMeta".to_string(),
            Arc::new(managers::discovery::DiscoveryManager::new(
                logger.clone(),
                validation.clone(),
                client.clone(),
                builder.clone(),
                DiscoveryAction::ListMeta,
            )),
        );
        handlers.insert(
            "mold_autoRegisterApis".to_string(),
            Arc::new(managers::discovery::DiscoveryManager::new(
                logger.clone(),
                validation.clone(),
                client.clone(),
                builder.clone(),
                DiscoveryAction::AutoRegister,
            )),
        );
        handlers.insert(
            "mold_signDebug".to_string(),
            Arc::new(managers::sign_debug::SignDebugManager::new(
                logger.clone(),
                validation.clone(),
                client.clone(),
            )),
        );

        Self::validate_tool_wiring(&handlers)?;

        for tool in tool_catalog() {
            if let Some(handler) = handlers.remove(&tool.name) {
                registry.register_tool(tool.clone(), handler)?;
            }
        }

        Ok(Self {
            logger,
            config,
            client,
            poller,
            registry,
            builder,
        })
    }

    /// Registers every discovered platform command. Used at startup when
    /// `MOLD_AUTOREGISTER=all`.
    pub async fn auto_register_all(&self) -> Result<AutoRegisterSummary, ToolError> {
        self.builder
            .auto_register(AutoRegisterOptions::default())
            .await
    }
}
