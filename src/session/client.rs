use anyhow::{anyhow, Context, Result};
use reqwest::{StatusCode, Url};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use crate::tasks::dto::{CreateTask, TaskFilter, TaskListResponse, UpdateTask};
use crate::tasks::repo::Task;

use super::SessionStore;

/// Typed client over the task API; login stores the credential in the
/// session store and any 401 clears it.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        Self::with_session(base, SessionStore::new())
    }

    pub fn with_session(base: &str, session: SessionStore) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base).context("invalid base URL")?,
            http: reqwest::Client::new(),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn register(&self, email: &str) -> Result<PublicUser> {
        let url = self.base.join("/auth/register")?;
        let resp = self
            .http
            .post(url)
            .json(&RegisterRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let resp = self.check(resp, StatusCode::CREATED).await?;
        Ok(resp.json().await?)
    }

    pub async fn login(&self, email: &str) -> Result<PublicUser> {
        let url = self.base.join("/auth/login")?;
        let resp = self
            .http
            .post(url)
            .json(&LoginRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let resp = self.check(resp, StatusCode::OK).await?;
        let auth: AuthResponse = resp.json().await?;
        self.session.set_credential(&auth.token);
        Ok(auth.user)
    }

    pub async fn list_tasks(&self, owner: Uuid, filter: &TaskFilter) -> Result<Vec<Task>> {
        let url = self.base.join(&format!("/users/{owner}/tasks"))?;
        let resp = self.bearer(self.http.get(url)).query(filter).send().await?;
        let resp = self.check(resp, StatusCode::OK).await?;
        let list: TaskListResponse = resp.json().await?;
        Ok(list.tasks)
    }

    pub async fn create_task(
        &self,
        owner: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task> {
        let url = self.base.join(&format!("/users/{owner}/tasks"))?;
        let resp = self
            .bearer(self.http.post(url))
            .json(&CreateTask {
                title: title.to_string(),
                description: description.map(str::to_string),
            })
            .send()
            .await?;
        let resp = self.check(resp, StatusCode::CREATED).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_task(&self, owner: Uuid, task_id: Uuid) -> Result<Task> {
        let url = self.base.join(&format!("/users/{owner}/tasks/{task_id}"))?;
        let resp = self.bearer(self.http.get(url)).send().await?;
        let resp = self.check(resp, StatusCode::OK).await?;
        Ok(resp.json().await?)
    }

    pub async fn update_task(
        &self,
        owner: Uuid,
        task_id: Uuid,
        fields: &UpdateTask,
    ) -> Result<Task> {
        let url = self.base.join(&format!("/users/{owner}/tasks/{task_id}"))?;
        let resp = self.bearer(self.http.put(url)).json(fields).send().await?;
        let resp = self.check(resp, StatusCode::OK).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_task(&self, owner: Uuid, task_id: Uuid) -> Result<()> {
        let url = self.base.join(&format!("/users/{owner}/tasks/{task_id}"))?;
        let resp = self.bearer(self.http.delete(url)).send().await?;
        self.check(resp, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    // The credential rides along when present; without one the request
    // goes out unauthenticated and draws the server's 401.
    fn bearer(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.current() {
            Some(session) => builder.bearer_auth(session.token),
            None => builder,
        }
    }

    // A 401 means the stored credential is dead; drop it so every
    // observer stops treating the session as live.
    async fn check(
        &self,
        resp: reqwest::Response,
        expected: StatusCode,
    ) -> Result<reqwest::Response> {
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(anyhow!("credential rejected"));
        }
        if resp.status() != expected {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("unexpected status {status}: {body}"));
        }
        Ok(resp)
    }
}
