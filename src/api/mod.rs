//! HTTP client for the Sitegen REST API

mod error;
pub mod models;

pub use error::{ApiError, Result};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use models::{JobStatus, Snapshot};

/// Thin request/response client for the one-shot API calls plus the two
/// status endpoints the generation watcher drives.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl {
            url: normalized.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn create_project(&self, project: &str, email: &str) -> Result<bool> {
        self.post_json(
            "api/GenerateSite/CreateProject",
            &json!({ "projectName": project, "projectEmail": email }),
        )
        .await
    }

    pub async fn check_project_name(&self, project: &str) -> Result<bool> {
        self.get_json(&format!("api/Dbml/check-project-name/{project}"))
            .await
    }

    pub async fn check_secret_code(&self, project: &str, email: &str, secret: &str) -> Result<bool> {
        self.get_json(&format!(
            "api/Dbml/check-secret-code/{project}/{email}/{secret}"
        ))
        .await
    }

    pub async fn forgot_secret_code(&self, project: &str, email: &str) -> Result<bool> {
        self.post_json(
            "api/GenerateSite/ForgotProjectSecret",
            &json!({ "projectName": project, "projectEmail": email }),
        )
        .await
    }

    pub async fn get_available_modules(&self) -> Result<serde_json::Value> {
        self.get_json("api/Dbml/get-modules").await
    }

    pub async fn get_project_modules(&self, project: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("api/Dbml/get-project-modules/{project}"))
            .await
    }

    pub async fn get_module_dbml(
        &self,
        project: &str,
        module: &str,
        template_key: &str,
    ) -> Result<String> {
        self.get_text(&format!(
            "api/Dbml/get-module-dbml/{project}/{module}/{template_key}"
        ))
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_project_module(
        &self,
        project: &str,
        email: &str,
        secret: &str,
        module: &str,
        template_key: &str,
        db_type_key: &str,
        pattern_key: &str,
    ) -> Result<bool> {
        self.post_json(
            "api/Dbml/add-project-module",
            &json!({
                "projectName": project,
                "projectEmail": email,
                "projectSecretCode": secret,
                "moduleName": module,
                "moduleTemplateKey": template_key,
                "dbTypeKey": db_type_key,
                "architecturalPatternKey": pattern_key,
            }),
        )
        .await
    }

    pub async fn remove_project_module(
        &self,
        project: &str,
        email: &str,
        secret: &str,
        module: &str,
    ) -> Result<bool> {
        self.post_json(
            "api/Dbml/remove-project-module",
            &json!({
                "projectName": project,
                "projectEmail": email,
                "projectSecretCode": secret,
                "moduleName": module,
            }),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn save_module_dbml(
        &self,
        project: &str,
        email: &str,
        secret: &str,
        module: &str,
        template_key: &str,
        dbml: &str,
        db_type_key: &str,
    ) -> Result<bool> {
        self.post_json(
            "api/Dbml/save-module-dbml",
            &json!({
                "projectName": project,
                "projectEmail": email,
                "projectSecretCode": secret,
                "moduleName": module,
                "moduleTemplateKey": template_key,
                "dbml": dbml,
                "dbTypeKey": db_type_key,
            }),
        )
        .await
    }

    pub async fn generate_project_solution(
        &self,
        project: &str,
        email: &str,
        secret: &str,
        session_id: &str,
    ) -> Result<bool> {
        self.post_json(
            "api/GenerateSite/GenerateProjectSolution",
            &json!({
                "projectName": project,
                "projectEmail": email,
                "projectSecretCode": secret,
                "sessionId": session_id,
            }),
        )
        .await
    }

    /// Look up the run tied to a watch session. Absent (404 or empty body)
    /// means the server has no record yet; transport errors propagate so the
    /// caller can retry.
    pub async fn get_active_run(&self, session_id: &str) -> Result<Option<JobStatus>> {
        let path = format!(
            "api/GenerateSite/GetActiveProjectBySessionId?sessionId={session_id}"
        );
        match self.send_get(&path).await {
            Ok(body) if body.trim().is_empty() => Ok(None),
            Ok(body) => Ok(serde_json::from_str(&body).ok()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the current step/action breakdown for the active job context.
    ///
    /// A structurally unexpected payload degrades to an empty snapshot so the
    /// display falls back to its waiting placeholder instead of erroring.
    pub async fn get_generation_steps(&self) -> Result<Snapshot> {
        let body = self.send_get("api/GenerateSite/GetGenerationSteps").await?;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        Ok(Snapshot::from_value(value))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send_get(path).await?;
        if body.trim().is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        serde_json::from_str(&body).map_err(|_| ApiError::EmptyResponse)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        self.send_get(path).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.join(path)?;
        debug!(%url, payload = %serde_json::to_string(body).unwrap_or_default(), "POST");

        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), body = %text, "response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error::extract_error_message(&text, status.as_u16()),
            });
        }
        if text.trim().is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        serde_json::from_str(&text).map_err(|_| ApiError::EmptyResponse)
    }

    async fn send_get(&self, path: &str) -> Result<String> {
        let url = self.join(path)?;
        debug!(%url, "GET");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), body = %text, "response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error::extract_error_message(&text, status.as_u16()),
            });
        }
        Ok(text)
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
            reason: e.to_string(),
        })
    }
}
