use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AppError, ResultExt};

// ============ Analysis payloads ============

/// Schema-less analysis payload returned by the backend.
///
/// Holds the union of quick extraction fields, `full_extraction`,
/// `lease_datapoints`, `vehicle_info`, `fairness_analysis` and
/// `negotiation_advice`. Nothing here is validated; readers go through the
/// accessors in `normalize` and supply their own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(Map<String, Value>);

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: every key in `update` overwrites, every other key stays.
    pub fn merge(&mut self, update: &Map<String, Value>) {
        for (key, value) in update {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Server-issued job id, when the payload carries one.
    pub fn job_id(&self) -> Option<&str> {
        self.get("job_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// True when the upload response asks the client to poll.
    pub fn is_pending(&self) -> bool {
        self.job_id().is_some() && self.get("status").and_then(Value::as_str) == Some("pending")
    }
}

impl From<Map<String, Value>> for AnalysisResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Body of `GET /analysis_status/{job_id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Still running.
    Pending,
    /// Finished; carries the nested `result` object when there is one.
    Done(Option<Map<String, Value>>),
    /// The backend gave up on the job.
    Error(Option<Value>),
    /// A status string this client does not know.
    Other(String),
}

impl JobStatus {
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Parse("status response has no 'status' string".to_string()))?;

        Ok(match status {
            "pending" => JobStatus::Pending,
            "done" => JobStatus::Done(value.get("result").and_then(Value::as_object).cloned()),
            "error" => JobStatus::Error(value.get("result").cloned()),
            other => JobStatus::Other(other.to_string()),
        })
    }
}

// ============ Saved contracts ============

/// An analysis the user chose to keep, under a name of their choosing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredContract {
    /// Assigned by `ContractShelf`; unique within one shelf.
    #[serde(default)]
    pub id: u64,
    pub result: AnalysisResult,
    pub saved_name: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredContract {
    pub fn new(result: AnalysisResult, saved_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            result,
            saved_name: saved_name.into(),
            saved_at: Utc::now(),
        }
    }
}

// ============ Chat ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

/// One line of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            text: text.into(),
        }
    }
}

// ============ Auth ============

/// Bearer token plus the username it was issued to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

// ============ Uploads ============

/// A PDF ready to be sent to `/process_lease_pdf`.
#[derive(Debug, Clone)]
pub struct LeaseUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub fast_mode: bool,
}

impl LeaseUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, fast_mode: bool) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            fast_mode,
        }
    }

    /// Reads a PDF from disk. The backend rejects anything without a `.pdf`
    /// extension, so that is checked up front.
    pub async fn from_path(path: &Path, fast_mode: bool) -> Result<Self, AppError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AppError::InvalidInput(format!("not a file path: {}", path.display())))?
            .to_string();

        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AppError::InvalidInput(format!(
                "file must be a PDF: {}",
                file_name
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::new(file_name, bytes, fast_mode))
    }
}
