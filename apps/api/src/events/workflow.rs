#![allow(dead_code)]

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Step-by-step trace of one server-side automation run, written to
/// `workflow_logs` under a shared run id. Failures and completions can
/// additionally ping Slack.
pub struct WorkflowLogger {
    pool: PgPool,
    slack_webhook_url: Option<String>,
    run_id: Uuid,
    workflow_name: String,
    workflow_type: String,
    started_at: std::time::Instant,
}

impl WorkflowLogger {
    pub fn new(
        pool: PgPool,
        slack_webhook_url: Option<String>,
        workflow_name: &str,
        workflow_type: &str,
    ) -> Self {
        Self {
            pool,
            slack_webhook_url,
            run_id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            workflow_type: workflow_type.to_string(),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn started(&self, message: &str) {
        self.log("started", message).await;
    }

    pub async fn step(&self, message: &str) {
        self.log("step", message).await;
    }

    pub async fn completed(&self, message: &str) {
        self.log("completed", message).await;
        self.notify_slack("completed", message).await;
    }

    pub async fn failed(&self, message: &str) {
        self.log("failed", message).await;
        self.notify_slack("failed", message).await;
    }

    pub async fn skipped(&self, message: &str) {
        self.log("skipped", message).await;
    }

    async fn log(&self, status: &str, message: &str) {
        let duration_ms = self.started_at.elapsed().as_millis() as i64;
        let result = sqlx::query(
            r#"
            INSERT INTO workflow_logs
                (id, run_id, workflow_name, workflow_type, status, message, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.run_id)
        .bind(&self.workflow_name)
        .bind(&self.workflow_type)
        .bind(status)
        .bind(message)
        .bind(duration_ms)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(
                "workflow log write failed ({} {status}): {e}",
                self.workflow_name
            );
        }
    }

    async fn notify_slack(&self, status: &str, message: &str) {
        let Some(url) = &self.slack_webhook_url else {
            return;
        };
        let text = slack_text(&self.workflow_name, status, message);
        let result = reqwest::Client::new()
            .post(url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await;
        if let Err(e) = result {
            warn!("Slack notification failed: {e}");
        }
    }
}

fn slack_text(workflow_name: &str, status: &str, message: &str) -> String {
    format!("[{workflow_name}] {status}: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_text_format() {
        assert_eq!(
            slack_text("upsell_charge", "failed", "provider timeout"),
            "[upsell_charge] failed: provider timeout"
        );
    }
}
