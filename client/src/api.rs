use crate::endpoint::Endpoints;
use crate::error::ClientError;
use async_trait::async_trait;
use log::{debug, info};
use pingboard_common::protocol::{HostCandidate, HostRecord, decode_batch};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;

/// The request/response side of the backend.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Full current host list.
    async fn fetch_all(&self) -> Result<Vec<HostRecord>, ClientError>;

    /// Registers a host and returns the backend's canonical record.
    async fn create_host(&self, candidate: &HostCandidate) -> Result<HostRecord, ClientError>;

    /// Uploads a CSV file of hosts; returns the backend's summary text.
    async fn import_hosts(&self, file_name: &str, contents: Vec<u8>)
    -> Result<String, ClientError>;
}

pub struct RestClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl RestClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pingboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoints })
    }
}

#[async_trait]
impl HostApi for RestClient {
    async fn fetch_all(&self) -> Result<Vec<HostRecord>, ClientError> {
        debug!("fetching hosts from {}", self.endpoints.hosts());
        let response = self.http.get(self.endpoints.hosts().as_str()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(rejection(status, &body, "failed to load hosts"));
        }
        Ok(decode_batch(&body)?)
    }

    async fn create_host(&self, candidate: &HostCandidate) -> Result<HostRecord, ClientError> {
        info!("adding host {}", candidate.address());
        let response = self
            .http
            .post(self.endpoints.hosts().as_str())
            .json(candidate)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        interpret_create_response(status, &body, candidate)
    }

    async fn import_hosts(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<String, ClientError> {
        info!("importing {file_name} ({} bytes)", contents.len());
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoints.import().as_str())
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(rejection(status, &body, "failed to import hosts"));
        }
        Ok(body)
    }
}

/// The backend may answer a create with the canonical host (bare or under
/// `host`) or with a `{"status": ...}` envelope. Only `success` without a
/// record falls back to the candidate with defaults filled; anything else is
/// a rejection, so no unconfirmed row reaches the table.
fn interpret_create_response(
    status: StatusCode,
    body: &str,
    candidate: &HostCandidate,
) -> Result<HostRecord, ClientError> {
    if !status.is_success() {
        return Err(rejection(status, body, "failed to add host"));
    }

    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    for shape in [Some(&value), value.get("host")].into_iter().flatten() {
        if let Ok(record) = serde_json::from_value::<HostRecord>(shape.clone()) {
            return Ok(record);
        }
    }

    match value.get("status").and_then(Value::as_str) {
        Some("duplicate") => Err(ClientError::Rejected {
            status: Some(status.as_u16()),
            reason: format!("host {} is already monitored", candidate.address()),
        }),
        Some("success") => Ok(candidate.to_record()),
        _ => Err(ClientError::Rejected {
            status: Some(status.as_u16()),
            reason: server_reason(&value).unwrap_or_else(|| "failed to add host".to_string()),
        }),
    }
}

fn rejection(status: StatusCode, body: &str, generic: &str) -> ClientError {
    let reason = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| server_reason(&value))
        .unwrap_or_else(|| format!("{generic} ({status})"));

    ClientError::Rejected {
        status: Some(status.as_u16()),
        reason,
    }
}

// FastAPI puts validation failures in `detail` as a list of {msg, ...}.
fn server_reason(value: &Value) -> Option<String> {
    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(reason)) if !reason.is_empty() => return Some(reason.clone()),
            Some(Value::Array(items)) => {
                if let Some(msg) = items
                    .first()
                    .and_then(|item| item.get("msg"))
                    .and_then(Value::as_str)
                {
                    return Some(msg.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingboard_common::protocol::HostStatus;

    fn candidate() -> HostCandidate {
        HostCandidate::parse("10.0.0.2").unwrap()
    }

    fn reason_of(err: ClientError) -> (Option<u16>, String) {
        match err {
            ClientError::Rejected { status, reason } => (status, reason),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn canonical_record_is_returned() {
        let record = interpret_create_response(
            StatusCode::CREATED,
            r#"{"ip":"10.0.0.2","status":"unknown","rtt":null,"delivered":0,"loss":100,"last_ping":"00:00:00"}"#,
            &candidate(),
        )
        .unwrap();
        assert_eq!(record, HostRecord::new("10.0.0.2"));
    }

    #[test]
    fn nested_host_is_returned() {
        let record = interpret_create_response(
            StatusCode::OK,
            r#"{"status":"success","host":{"ip":"10.0.0.2","status":"online"}}"#,
            &candidate(),
        )
        .unwrap();
        assert_eq!(record.status, HostStatus::Online);
    }

    #[test]
    fn bare_success_falls_back_to_candidate() {
        let record =
            interpret_create_response(StatusCode::OK, r#"{"status":"success"}"#, &candidate())
                .unwrap();
        assert_eq!(record, candidate().to_record());
    }

    #[test]
    fn duplicate_is_a_write_failure() {
        let err =
            interpret_create_response(StatusCode::OK, r#"{"status":"duplicate"}"#, &candidate())
                .unwrap_err();
        assert_eq!(
            reason_of(err),
            (Some(200), "host 10.0.0.2 is already monitored".to_string())
        );
    }

    #[test]
    fn error_envelope_carries_server_message() {
        let err = interpret_create_response(
            StatusCode::OK,
            r#"{"status":"error","message":"Invalid IP"}"#,
            &candidate(),
        )
        .unwrap_err();
        assert_eq!(reason_of(err).1, "Invalid IP");
    }

    #[test]
    fn unrecognised_success_body_is_not_a_create() {
        for body in ["<html>proxy error</html>", "", "null", r#"{"ok":true}"#] {
            let err = interpret_create_response(StatusCode::OK, body, &candidate()).unwrap_err();
            assert_eq!(reason_of(err), (Some(200), "failed to add host".to_string()));
        }
    }

    #[test]
    fn unknown_status_keeps_the_server_reason() {
        let err = interpret_create_response(
            StatusCode::OK,
            r#"{"status":"rejected","message":"quota"}"#,
            &candidate(),
        )
        .unwrap_err();
        assert_eq!(reason_of(err).1, "quota");
    }

    #[test]
    fn http_failure_prefers_detail() {
        let err = interpret_create_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","ip"],"msg":"field required","type":"value_error.missing"}]}"#,
            &candidate(),
        )
        .unwrap_err();
        assert_eq!(reason_of(err), (Some(422), "field required".to_string()));
    }

    #[test]
    fn http_failure_without_reason_is_generic() {
        let err =
            interpret_create_response(StatusCode::BAD_GATEWAY, "<html>", &candidate()).unwrap_err();
        assert_eq!(
            reason_of(err).1,
            "failed to add host (502 Bad Gateway)"
        );
    }
}
