use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::common::{
    AuthSession, AuthUser, ConversationRow, Message, NewMessage, NewParticipant,
    SharedConversation, SignUpResponse, User,
};
use crate::error::{GatewayError, GatewayResult};

use super::{AuthApi, Gateway};

const CONVERSATION_SELECT: &str =
    "*,participants:participants(id,user_id,last_read_message_id,user:users(*))";
const SHARED_SELECT: &str = "conversation_id,conversation:conversations(is_group)";

/// Gateway backed by a hosted PostgREST + GoTrue style service.
pub struct RestGateway {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestGateway {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn bearer(&self) -> String {
        let token = match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        token.unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        let response = ensure_success(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn execute(&self, builder: RequestBuilder) -> GatewayResult<()> {
        ensure_success(builder.send().await?).await?;
        Ok(())
    }

    async fn auth_call(&self, builder: RequestBuilder) -> GatewayResult<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Auth(error_message(&body)));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

async fn ensure_success(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// An expired or missing access token comes back as 401.
pub(crate) fn status_error(status: StatusCode, body: &str) -> GatewayError {
    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::NotAuthenticated;
    }
    GatewayError::Api {
        status: status.as_u16(),
        message: error_message(body),
    }
}

/// Pull the human-readable message out of an error body.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// `in.("a","b")` filter value.
pub(crate) fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

pub(crate) fn timestamp_param(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub(crate) fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
}

impl From<RemoteUser> for AuthUser {
    fn from(user: RemoteUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            name: user.user_metadata.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: RemoteUser,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));

        AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        }
    }
}

pub(crate) fn parse_sign_up(value: Value) -> GatewayResult<SignUpResponse> {
    if value.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value::<TokenResponse>(value)?.into();
        return Ok(SignUpResponse {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    if value.get("id").is_some() {
        let user: AuthUser = serde_json::from_value::<RemoteUser>(value)?.into();
        return Ok(SignUpResponse {
            user: Some(user),
            session: None,
        });
    }

    let user = match value.get("user") {
        Some(user) if !user.is_null() => {
            Some(serde_json::from_value::<RemoteUser>(user.clone())?.into())
        }
        _ => None,
    };
    Ok(SignUpResponse {
        user,
        session: None,
    })
}

#[derive(Deserialize)]
struct ConversationIdRow {
    conversation_id: String,
}

#[async_trait]
impl Gateway for RestGateway {
    async fn participant_conversation_ids(&self, user_id: &str) -> GatewayResult<Vec<String>> {
        let rows: Vec<ConversationIdRow> = self
            .fetch(
                self.request(Method::GET, self.table_url("participants"))
                    .query(&[("select", "conversation_id".to_string()), ("user_id", format!("eq.{user_id}"))]),
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.conversation_id).collect())
    }

    async fn conversations_with_participants(
        &self,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<ConversationRow>> {
        self.fetch(
            self.request(Method::GET, self.table_url("conversations"))
                .query(&[
                    ("select", CONVERSATION_SELECT.to_string()),
                    ("id", in_filter(conversation_ids)),
                    ("order", "updated_at.desc".to_string()),
                ]),
        )
        .await
    }

    async fn message(&self, message_id: &str) -> GatewayResult<Option<Message>> {
        let rows: Vec<Message> = self
            .fetch(
                self.request(Method::GET, self.table_url("messages"))
                    .query(&[("select", "*".to_string()), ("id", format!("eq.{message_id}"))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn count_messages_after(
        &self,
        conversation_id: &str,
        after: DateTime<Utc>,
    ) -> GatewayResult<u64> {
        let response = ensure_success(
            self.request(Method::HEAD, self.table_url("messages"))
                .header("Prefer", "count=exact")
                .query(&[
                    ("select", "*".to_string()),
                    ("conversation_id", format!("eq.{conversation_id}")),
                    ("created_at", format!("gt.{}", timestamp_param(after))),
                ])
                .send()
                .await?,
        )
        .await?;

        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| GatewayError::Api {
                status: response.status().as_u16(),
                message: "missing Content-Range count".to_string(),
            })
    }

    async fn users_except(&self, user_id: &str) -> GatewayResult<Vec<User>> {
        self.fetch(
            self.request(Method::GET, self.table_url("users"))
                .query(&[("select", "*".to_string()), ("id", format!("neq.{user_id}"))]),
        )
        .await
    }

    async fn messages(&self, conversation_id: &str) -> GatewayResult<Vec<Message>> {
        self.fetch(
            self.request(Method::GET, self.table_url("messages")).query(&[
                ("select", "*".to_string()),
                ("conversation_id", format!("eq.{conversation_id}")),
                ("order", "created_at.asc".to_string()),
            ]),
        )
        .await
    }

    async fn insert_message(&self, message: &NewMessage) -> GatewayResult<Message> {
        let rows: Vec<Message> = self
            .fetch(
                self.request(Method::POST, self.table_url("messages"))
                    .header("Prefer", "return=representation")
                    .json(message),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or(GatewayError::NotFound { table: "messages" })
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_message_id: &str,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        self.execute(
            self.request(Method::PATCH, self.table_url("conversations"))
                .query(&[("id", format!("eq.{conversation_id}"))])
                .json(&json!({
                    "last_message_id": last_message_id,
                    "updated_at": timestamp_param(updated_at),
                })),
        )
        .await
    }

    async fn mark_read(&self, participant_id: &str, message_id: &str) -> GatewayResult<()> {
        self.execute(
            self.request(Method::PATCH, self.table_url("participants"))
                .query(&[("id", format!("eq.{participant_id}"))])
                .json(&json!({ "last_read_message_id": message_id })),
        )
        .await
    }

    async fn shared_conversations(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<SharedConversation>> {
        self.fetch(
            self.request(Method::GET, self.table_url("participants")).query(&[
                ("select", SHARED_SELECT.to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("conversation_id", in_filter(conversation_ids)),
            ]),
        )
        .await
    }

    async fn insert_conversation(
        &self,
        is_group: bool,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<ConversationRow> {
        let rows: Vec<ConversationRow> = self
            .fetch(
                self.request(Method::POST, self.table_url("conversations"))
                    .header("Prefer", "return=representation")
                    .json(&json!({
                        "is_group": is_group,
                        "updated_at": timestamp_param(updated_at),
                    })),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or(GatewayError::NotFound { table: "conversations" })
    }

    async fn insert_participants(&self, rows: &[NewParticipant]) -> GatewayResult<()> {
        self.execute(
            self.request(Method::POST, self.table_url("participants"))
                .header("Prefer", "return=minimal")
                .json(rows),
        )
        .await
    }

    async fn insert_user(&self, user: &User) -> GatewayResult<()> {
        self.execute(
            self.request(Method::POST, self.table_url("users"))
                .header("Prefer", "return=minimal")
                .json(&json!({ "id": user.id, "email": user.email, "name": user.name })),
        )
        .await
    }
}

#[async_trait]
impl AuthApi for RestGateway {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<AuthSession> {
        let value = self
            .auth_call(
                self.request(Method::POST, self.auth_url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        let session: AuthSession = serde_json::from_value::<TokenResponse>(value)?.into();
        self.set_access_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> GatewayResult<SignUpResponse> {
        let value = self
            .auth_call(self.request(Method::POST, self.auth_url("signup")).json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            })))
            .await?;
        let response = parse_sign_up(value)?;
        if let Some(session) = &response.session {
            self.set_access_token(Some(session.access_token.clone()));
        }
        Ok(response)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        let result = self
            .auth_call(self.request(Method::POST, self.auth_url("logout")))
            .await
            .map(|_| ());
        self.set_access_token(None);
        result
    }

    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<AuthSession> {
        let value = self
            .auth_call(
                self.request(Method::POST, self.auth_url("token"))
                    .query(&[("grant_type", "refresh_token")])
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        let session: AuthSession = serde_json::from_value::<TokenResponse>(value)?.into();
        self.set_access_token(Some(session.access_token.clone()));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_not_authenticated() {
        let err = status_error(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#);
        assert!(matches!(err, GatewayError::NotAuthenticated));

        let err = status_error(StatusCode::CONFLICT, r#"{"message":"duplicate key"}"#);
        assert!(matches!(
            err,
            GatewayError::Api { status: 409, ref message } if message == "duplicate key"
        ));
    }

    #[test]
    fn in_filter_quotes_every_id() {
        let ids = vec!["a1".to_string(), "b2".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a1","b2")"#);
        assert_eq!(in_filter(&[]), "in.()");
    }

    #[test]
    fn content_range_total_reads_exact_counts() {
        assert_eq!(content_range_total("0-24/3573"), Some(3573));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-24/*"), None);
    }

    #[test]
    fn timestamps_use_utc_suffix() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(timestamp_param(ts), "2025-01-02T03:04:05.000000Z");
    }

    #[test]
    fn error_message_prefers_description_fields() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(error_message("  upstream timeout "), "upstream timeout");
    }

    #[test]
    fn sign_up_without_session_keeps_user() {
        let value = json!({
            "id": "u9",
            "email": "new@example.com",
            "user_metadata": { "name": "Newbie" }
        });
        let response = parse_sign_up(value).unwrap();
        assert!(response.session.is_none());
        let user = response.user.unwrap();
        assert_eq!(user.id, "u9");
        assert_eq!(user.name, "Newbie");
    }

    #[test]
    fn sign_up_with_session_returns_tokens() {
        let value = json!({
            "access_token": "jwt",
            "refresh_token": "r1",
            "expires_in": 3600,
            "user": { "id": "u9", "email": "new@example.com", "user_metadata": {} }
        });
        let response = parse_sign_up(value).unwrap();
        let session = response.session.unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
        assert!(session.expires_at.is_some());
        assert_eq!(response.user.unwrap().id, "u9");
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let gateway = RestGateway::new("https://example.test/", "anon");
        assert_eq!(gateway.bearer(), "anon");
        assert_eq!(gateway.table_url("users"), "https://example.test/rest/v1/users");
        gateway.set_access_token(Some("jwt".into()));
        assert_eq!(gateway.bearer(), "jwt");
    }
}
