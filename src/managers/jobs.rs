use crate::errors::ToolError;
use crate::services::job_poller::{JobPoller, PollOptions};
use crate::services::logger::Logger;
use crate::services::tool_registry::ToolHandler;
use crate::services::validation::Validation;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Wait,
    CancelWait,
}

pub struct JobManager {
    logger: Logger,
    validation: Validation,
    poller: JobPoller,
    action: JobAction,
}

impl JobManager {
    pub fn new(logger: Logger, validation: Validation, poller: JobPoller, action: JobAction) -> Self {
        Self {
            logger: logger.child("jobs"),
            validation,
            poller,
            action,
        }
    }

    fn ensure_job_id(&self, args: &Value) -> Result<String, ToolError> {
        self.validation
            .ensure_string(args.get("jobid").unwrap_or(&Value::Null), "jobid", true)
    }

    async fn wait_for_job(&self, args: Value) -> Result<Value, ToolError> {
        let job_id = self.ensure_job_id(&args)?;
        let options = PollOptions::from_values(args.get("timeoutMs"), args.get("intervalMs"));
        let handle = self.poller.wait_tracked(&job_id, options).await?;
        Ok(handle.raw_result)
    }

    async fn cancel_wait(&self, args: Value) -> Result<Value, ToolError> {
        let job_id = self.ensure_job_id(&args)?;
        let canceled = self.poller.cancel(&job_id);
        Ok(serde_json::json!({
            "jobid": job_id,
            "canceled": canceled,
            "active_waits": self.poller.active_waits(),
        }))
    }
}

#[async_trait::async_trait]
impl ToolHandler for JobManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle", args.get("jobid"));
        match self.action {
            JobAction::Wait => self.wait_for_job(args).await,
            JobAction::CancelWait => self.cancel_wait(args).await,
        }
    }
}
