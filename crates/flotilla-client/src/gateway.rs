use crate::{ClientConfig, ClientError};
use flotilla_core::{
    AppSettings, DumpOption, Instance, LivePayload, SiteGrant, SitePatch, StartInfo, User,
};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Reply of `transform_input_dump`: where the sanitized copy can be picked
/// up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransformResult {
    pub live_url: String,
}

/// The sole boundary making outbound calls to the CI/CD backend.
///
/// Every call is fire-and-forget: it resolves once, is never retried and
/// never cancelled. Non-2xx replies become `ClientError::Status` carrying
/// the status text and body so nothing is silently dropped.
pub struct Gateway {
    client: reqwest::Client,
    base: String,
}

impl Gateway {
    /// # Errors
    /// Returns `ClientError` if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Issue one request and normalize the outcome.
    ///
    /// # Errors
    /// `Http` on transport failure or timeout, `Status` on a non-2xx
    /// reply, `Malformed` when the body is not valid JSON.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let text = self.send_raw(method, path, query, body).await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    /// Like [`Gateway::send`] but returns the body verbatim, for endpoints
    /// serving opaque text fragments.
    ///
    /// # Errors
    /// `Http` on transport failure or timeout, `Status` on non-2xx.
    pub async fn send_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        let url = self.url(path);
        debug!(%url, ?query, "backend request");

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.to_string(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let value = self.send(Method::GET, path, query, None).await?;
        decode(value)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        let value = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(value)
    }

    // --- fleet state ---

    /// Full fleet summary; the only authoritative source of row existence.
    ///
    /// # Errors
    /// See [`Gateway::send`].
    pub async fn fleet_summary(
        &self,
        name: Option<&str>,
        archived: bool,
    ) -> Result<Vec<Instance>, ClientError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if archived {
            query.push(("archived", flag(true)));
        }
        self.get("data/sites", &query).await
    }

    /// Incremental live-state deltas for the periodic poll.
    ///
    /// # Errors
    /// See [`Gateway::send`].
    pub async fn live_values(&self) -> Result<LivePayload, ClientError> {
        self.get("data/site/live_values", &[]).await
    }

    /// Opaque aggregate resource-usage fragment, replaced wholesale.
    ///
    /// # Errors
    /// See [`Gateway::send_raw`].
    pub async fn resources(&self) -> Result<String, ClientError> {
        self.send_raw(Method::GET, "get_resources", &[], None).await
    }

    // --- lifecycle commands ---

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn create_instance(&self, name: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "make_custom_instance",
            &[("name", name.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn backup(&self, name: &str, dumpname: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "dump",
            &[("name", name.to_string()), ("dumpname", dumpname.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn delete(&self, name: &str) -> Result<Value, ClientError> {
        self.send(Method::GET, "delete", &[("name", name.to_string())], None)
            .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn rebuild(
        &self,
        name: &str,
        dump: Option<&str>,
        no_cache: bool,
        no_module_update: bool,
    ) -> Result<Value, ClientError> {
        let mut query = vec![
            ("name", name.to_string()),
            ("no_cache", flag(no_cache)),
            ("no_module_update", flag(no_module_update)),
        ];
        if let Some(dump) = dump {
            query.push(("dump", dump.to_string()));
        }
        self.send(Method::GET, "trigger/rebuild", &query, None).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn transform_input_dump(
        &self,
        dump: &str,
        anonymize: bool,
        erase: bool,
    ) -> Result<TransformResult, ClientError> {
        self.get(
            "transform_input_dump",
            &[
                ("dump", dump.to_string()),
                ("anonymize", flag(anonymize)),
                ("erase", flag(erase)),
            ],
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn update_site(&self, patch: &SitePatch) -> Result<Value, ClientError> {
        let body = serde_json::to_value(patch).map_err(|e| ClientError::Malformed(e.to_string()))?;
        self.post("update/site", &body).await
    }

    // --- settings & snapshots ---

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn app_settings(&self) -> Result<AppSettings, ClientError> {
        self.get("data/app_settings", &[]).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn set_app_settings(&self, settings: &AppSettings) -> Result<Value, ClientError> {
        let body =
            serde_json::to_value(settings).map_err(|e| ClientError::Malformed(e.to_string()))?;
        self.post("data/app_settings", &body).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn possible_dumps(&self) -> Result<Vec<DumpOption>, ClientError> {
        self.get("possible_dumps", &[]).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn possible_input_dumps(&self) -> Result<Vec<DumpOption>, ClientError> {
        self.get("possible_input_dumps", &[]).await
    }

    // --- fleet-wide operations ---

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn restart_delegator(&self) -> Result<Value, ClientError> {
        self.send(Method::GET, "restart_delegator", &[], None).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn start_all(&self) -> Result<Value, ClientError> {
        self.send(Method::GET, "start_all", &[], None).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn cleanup(&self) -> Result<Value, ClientError> {
        self.send(Method::GET, "cleanup", &[], None).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn build_again(&self, name: &str, all: bool) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "build_again",
            &[("all", flag(all)), ("name", name.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn reload_restart(&self, name: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "reload_restart",
            &[("name", name.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn turn_into_dev(&self, site: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "turn_into_dev",
            &[("site", site.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn restart_docker(&self, name: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "restart_docker",
            &[("name", name.to_string())],
            None,
        )
        .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn run_robot_tests(&self, name: &str) -> Result<Value, ClientError> {
        self.send(
            Method::GET,
            "run_robot_tests",
            &[("name", name.to_string())],
            None,
        )
        .await
    }

    // --- session & users ---

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn start_info(&self) -> Result<StartInfo, ClientError> {
        self.get("start_info", &[]).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn users(&self) -> Result<Vec<User>, ClientError> {
        self.get("data/users", &[]).await
    }

    /// # Errors
    /// See [`Gateway::send`]. Also fails when the backend returns an
    /// empty record list for the id.
    pub async fn user(&self, id: &str) -> Result<User, ClientError> {
        let records: Vec<User> = self.get("data/user", &[("id", id.to_string())]).await?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Malformed(format!("no user record for id {id}")))
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn save_user(&self, user: &User) -> Result<Value, ClientError> {
        let body = serde_json::to_value(user).map_err(|e| ClientError::Malformed(e.to_string()))?;
        self.post("data/user", &body).await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn delete_user(&self, id: &str) -> Result<Value, ClientError> {
        self.post("data/user/delete", &serde_json::json!({ "id": id }))
            .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn user_sites(&self, user_id: &str) -> Result<Vec<SiteGrant>, ClientError> {
        self.get("data/user_sites", &[("user_id", user_id.to_string())])
            .await
    }

    /// # Errors
    /// See [`Gateway::send`].
    pub async fn set_user_site(
        &self,
        user_id: &str,
        name: &str,
        allowed: bool,
    ) -> Result<Value, ClientError> {
        self.post(
            "data/user_sites",
            &serde_json::json!({
                "user_id": user_id,
                "name": name,
                "allowed": allowed,
            }),
        )
        .await
    }

    // --- browser-facing pages (surfaced as URLs in the console) ---

    #[must_use]
    pub fn start_url(&self, name: &str) -> String {
        format!("{}?name={name}", self.url("start"))
    }

    #[must_use]
    pub fn mails_url(&self, name: &str) -> String {
        format!("{}?initial_path=/mailer/&name={name}", self.url("start"))
    }

    #[must_use]
    pub fn logs_url(&self, name: &str) -> String {
        format!("{}?name={name}", self.url("show_logs"))
    }

    #[must_use]
    pub fn build_log_url(&self, name: &str) -> String {
        format!("{}?name={name}", self.url("build_log"))
    }

    #[must_use]
    pub fn shell_url(&self, name: &str) -> String {
        format!("{}?name={name}", self.url("shell_instance"))
    }

    #[must_use]
    pub fn debug_url(&self, name: &str) -> String {
        format!("{}?name={name}", self.url("debug_instance"))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
}

/// Checkbox wire format of the original console: "1"/"0".
fn flag(value: bool) -> String {
    if value { "1".into() } else { "0".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> Gateway {
        Gateway::new(&ClientConfig::new("http://localhost:8000/cicd/")).unwrap()
    }

    #[test]
    fn test_url_join_strips_duplicate_slashes() {
        let gateway = gateway();
        assert_eq!(
            gateway.url("/data/sites"),
            "http://localhost:8000/cicd/data/sites"
        );
        assert_eq!(
            gateway.url("get_resources"),
            "http://localhost:8000/cicd/get_resources"
        );
    }

    #[test]
    fn test_flag_encoding() {
        assert_eq!(flag(true), "1");
        assert_eq!(flag(false), "0");
    }

    #[test]
    fn test_page_urls() {
        let gateway = gateway();
        assert_eq!(
            gateway.start_url("br-123"),
            "http://localhost:8000/cicd/start?name=br-123"
        );
        assert_eq!(
            gateway.build_log_url("br-123"),
            "http://localhost:8000/cicd/build_log?name=br-123"
        );
        assert!(gateway.mails_url("br-123").contains("initial_path=/mailer/"));
    }

    #[test]
    fn test_decode_malformed_live_payload() {
        // A payload missing `sites` still decodes to the default; a payload
        // with the wrong shape surfaces as Malformed.
        let ok: Result<LivePayload, _> = decode(serde_json::json!({}));
        assert!(ok.unwrap().sites.is_empty());

        let bad: Result<LivePayload, _> = decode(serde_json::json!({ "sites": "nope" }));
        assert!(matches!(bad, Err(ClientError::Malformed(_))));
    }

    #[test]
    fn test_transform_result_shape() {
        let result: TransformResult =
            serde_json::from_str(r#"{"live_url": "http://x/dump.sanitized"}"#).unwrap();
        assert_eq!(result.live_url, "http://x/dump.sanitized");
    }
}
