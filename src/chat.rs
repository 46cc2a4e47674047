//! Chat about one saved contract.

use serde_json::Value;

use crate::api_client::LeaseApiClient;
use crate::errors::AppError;
use crate::models::{ChatMessage, StoredContract};
use crate::session::Session;

/// Transcript bound to the selected contract and its job id.
#[derive(Debug, Clone, Default)]
pub struct ChatThread {
    contract_id: Option<u64>,
    job_id: Option<String>,
    contract_name: Option<String>,
    transcript: Vec<ChatMessage>,
}

impl ChatThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the thread to `contract`. A different contract clears the
    /// transcript, even when it shares a job; reselecting the same one keeps it.
    pub fn select(&mut self, contract: &StoredContract) {
        let job_id = chat_job_id(contract);
        if self.contract_id != Some(contract.id) || job_id != self.job_id {
            self.transcript.clear();
        }
        self.contract_id = Some(contract.id);
        if job_id.is_none() {
            tracing::warn!("Contract '{}' has no job id, chat unavailable", contract.saved_name);
        }
        self.job_id = job_id;
        self.contract_name = Some(contract.saved_name.clone());
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn contract_name(&self) -> Option<&str> {
        self.contract_name.as_deref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Sends `text` and appends the reply.
    ///
    /// The user line is recorded before the request, so it stays in the
    /// transcript when the request fails.
    pub async fn send(
        &mut self,
        api: &LeaseApiClient,
        session: &Session,
        text: &str,
    ) -> Result<&ChatMessage, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("message is empty".to_string()));
        }
        let job_id = self.job_id.clone().ok_or_else(|| {
            AppError::InvalidInput("select a contract with an analysis job first".to_string())
        })?;

        self.transcript.push(ChatMessage::user(text));
        let reply = api.chat(session, &job_id, text).await?;
        self.transcript.push(ChatMessage::bot(reply));

        self.transcript
            .last()
            .ok_or_else(|| AppError::Parse("chat transcript is empty".to_string()))
    }
}

/// `job_id` at the top level, then inside `full_extraction`.
fn chat_job_id(contract: &StoredContract) -> Option<String> {
    let result = &contract.result;
    result
        .job_id()
        .or_else(|| {
            result
                .get("full_extraction")
                .and_then(|extraction| extraction.get("job_id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisResult;
    use serde_json::json;

    fn contract(name: &str, value: Value) -> StoredContract {
        StoredContract::new(AnalysisResult::from_value(value).unwrap(), name)
    }

    #[test]
    fn test_job_id_falls_back_to_full_extraction() {
        let mut thread = ChatThread::new();
        thread.select(&contract("A", json!({"full_extraction": {"job_id": "nested"}})));
        assert_eq!(thread.job_id(), Some("nested"));

        thread.select(&contract("B", json!({"job_id": "top", "full_extraction": {"job_id": "nested"}})));
        assert_eq!(thread.job_id(), Some("top"));
    }

    #[test]
    fn test_changing_selection_clears_transcript() {
        let mut thread = ChatThread::new();
        let a = contract("A", json!({"job_id": "a"}));
        thread.select(&a);
        thread.transcript.push(ChatMessage::user("hello"));

        thread.select(&a);
        assert_eq!(thread.transcript().len(), 1);

        thread.select(&contract("B", json!({"job_id": "b"})));
        assert!(thread.transcript().is_empty());
        assert_eq!(thread.contract_name(), Some("B"));
    }

    #[test]
    fn test_same_job_in_another_saved_copy_clears_transcript() {
        let mut shelf = crate::contracts::ContractShelf::new();
        let analysis = AnalysisResult::from_value(json!({"job_id": "shared"})).unwrap();
        shelf.save(analysis.clone(), "first copy");
        shelf.save(analysis, "second copy");

        let mut thread = ChatThread::new();
        thread.select(shelf.get(0).unwrap());
        thread.transcript.push(ChatMessage::user("about the first copy"));

        thread.select(shelf.get(0).unwrap());
        assert_eq!(thread.transcript().len(), 1);

        thread.select(shelf.get(1).unwrap());
        assert!(thread.transcript().is_empty());
        assert_eq!(thread.job_id(), Some("shared"));
    }

    #[tokio::test]
    async fn test_send_without_selection_is_rejected() {
        let api = LeaseApiClient::new(&crate::config::Config::default()).unwrap();
        let mut thread = ChatThread::new();

        let err = thread.send(&api, &Session::anonymous(), "hi").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(thread.transcript().is_empty());
    }
}
