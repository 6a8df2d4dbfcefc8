use std::sync::Arc;

use futures::future::try_join_all;
use futures::FutureExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::locale::{chunk_locale_map, LocaleMap, BATCH_SIZE};

use super::completion::{CompletionClient, CompletionError, CompletionRequest};
use super::prompts::Mode;

/// Merged model output, keyed like the input map.
pub type MergedResult = Map<String, Value>;

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("completion call for chunk {chunk} failed: {source}")]
    Upstream {
        chunk: usize,
        #[source]
        source: CompletionError,
    },
    #[error("reply for chunk {chunk} is not a usable json object: {reason}")]
    Parse { chunk: usize, reason: String },
}

/// Fans one completion call per chunk out onto the runtime and merges the replies.
///
/// All chunks are dispatched at once. The first failed call fails the whole run; calls already
/// in flight keep running and their results are dropped.
pub struct BatchOrchestrator {
    client: Arc<dyn CompletionClient>,
    batch_size: usize,
    strict_keys: bool,
}

impl BatchOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            batch_size: BATCH_SIZE,
            strict_keys: false,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_strict_keys(mut self, strict: bool) -> Self {
        self.strict_keys = strict;
        self
    }

    pub async fn run(
        &self,
        map: &LocaleMap,
        mode: Mode,
        input_language: &str,
        output_language: &str,
    ) -> Result<MergedResult, OrchestrateError> {
        let chunks = chunk_locale_map(map, self.batch_size);
        let total = chunks.len();
        info!(
            keys = map.len(),
            chunks = total,
            mode = mode.as_str(),
            from = input_language,
            to = output_language,
            "dispatching completion calls"
        );

        let tasks = chunks.iter().enumerate().map(|(idx, chunk)| {
            let client = self.client.clone();
            let request = CompletionRequest {
                mode,
                input_language: input_language.to_string(),
                output_language: output_language.to_string(),
                chunk: chunk.clone(),
            };
            tokio::spawn(async move {
                debug!(chunk = idx, keys = request.chunk.len(), "chunk dispatched");
                client
                    .complete(&request)
                    .await
                    .map_err(|source| OrchestrateError::Upstream { chunk: idx, source })
            })
            .map(move |joined| match joined {
                Ok(res) => res,
                Err(e) => Err(OrchestrateError::Upstream {
                    chunk: idx,
                    source: CompletionError::Interrupted(e.to_string()),
                }),
            })
        });

        let replies = try_join_all(tasks).await.inspect_err(|e| {
            error!(error = %e, chunks = total, "completion call failed, discarding batch");
        })?;

        let mut merged = MergedResult::new();
        for (idx, (raw, sent)) in replies.iter().zip(chunks.iter()).enumerate() {
            let obj = parse_chunk_reply(raw)
                .and_then(|obj| {
                    if self.strict_keys {
                        check_keys(&obj, sent)?;
                    }
                    Ok(obj)
                })
                .map_err(|reason| OrchestrateError::Parse { chunk: idx, reason })
                .inspect_err(|e| error!(error = %e, "unusable completion reply"))?;
            merged.extend(obj);
        }

        info!(keys = merged.len(), chunks = total, "batch merged");
        Ok(merged)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let s = text.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest.trim_start_matches(char::is_alphanumeric),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub(crate) fn parse_chunk_reply(raw: &str) -> Result<MergedResult, String> {
    let text = strip_code_fence(raw);
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(format!("expected a json object, got {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn check_keys(obj: &MergedResult, sent: &LocaleMap) -> Result<(), String> {
    if let Some(missing) = sent.keys().find(|k| !obj.contains_key(k.as_str())) {
        return Err(format!("missing key {missing:?}"));
    }
    if let Some(extra) = obj.keys().find(|k| !sent.contains_key(k.as_str())) {
        return Err(format!("unexpected key {extra:?}"));
    }
    Ok(())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{parse_chunk_reply, BatchOrchestrator, OrchestrateError};
    use crate::locale::LocaleMap;
    use crate::pipeline::completion::{CompletionClient, CompletionError, CompletionRequest};
    use crate::pipeline::prompts::Mode;

    /// Upper-cases every value; optionally fails or garbles one chunk by its first key.
    #[derive(Default)]
    struct UpperStub {
        fail_on: Option<String>,
        garble_on: Option<String>,
        calls: AtomicUsize,
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl CompletionClient for UpperStub {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push(request.chunk.len());
            let first = request.chunk.keys().next().cloned().unwrap_or_default();
            if self.fail_on.as_deref() == Some(first.as_str()) {
                return Err(CompletionError::Authentication);
            }
            if self.garble_on.as_deref() == Some(first.as_str()) {
                return Ok("Sorry, I cannot help with that.".to_string());
            }
            let out: serde_json::Map<String, serde_json::Value> = request
                .chunk
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_uppercase())))
                .collect();
            Ok(serde_json::to_string(&out).unwrap())
        }
    }

    fn numbered(n: usize) -> LocaleMap {
        (0..n).map(|i| (format!("k{i:03}"), format!("v{i}"))).collect()
    }

    #[tokio::test]
    async fn merges_all_chunks_in_order() {
        let stub = Arc::new(UpperStub::default());
        let orch = BatchOrchestrator::new(stub.clone());
        let map = numbered(65);

        let merged = orch.run(&map, Mode::Translate, "en", "de").await.unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        let mut sizes = stub.sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![5, 30, 30]);

        let keys: Vec<&String> = merged.keys().collect();
        let want: Vec<&String> = map.keys().collect();
        assert_eq!(keys, want);
        assert_eq!(merged["k064"], "V64");
    }

    #[tokio::test]
    async fn empty_map_makes_no_calls() {
        let stub = Arc::new(UpperStub::default());
        let orch = BatchOrchestrator::new(stub.clone());
        let merged = orch
            .run(&LocaleMap::new(), Mode::FillEmpty, "en", "de")
            .await
            .unwrap();
        assert!(merged.is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_failed_call_fails_everything() {
        let stub = Arc::new(UpperStub {
            fail_on: Some("k030".to_string()),
            ..UpperStub::default()
        });
        let orch = BatchOrchestrator::new(stub);
        let err = orch
            .run(&numbered(61), Mode::Translate, "en", "de")
            .await
            .unwrap_err();
        match err {
            OrchestrateError::Upstream { chunk, source } => {
                assert_eq!(chunk, 1);
                assert!(matches!(source, CompletionError::Authentication));
            }
            other => panic!("expected upstream error, got {other}"),
        }
    }

    #[tokio::test]
    async fn one_garbled_reply_fails_everything() {
        let stub = Arc::new(UpperStub {
            garble_on: Some("k060".to_string()),
            ..UpperStub::default()
        });
        let orch = BatchOrchestrator::new(stub.clone());
        let err = orch
            .run(&numbered(61), Mode::Translate, "en", "de")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrateError::Parse { chunk: 2, .. }), "{err}");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn strict_keys_rejects_renamed_keys() {
        struct Renamer;

        #[async_trait]
        impl CompletionClient for Renamer {
            async fn complete(&self, _: &CompletionRequest) -> Result<String, CompletionError> {
                Ok(r#"{"Hallo": "Hallo"}"#.to_string())
            }
        }

        let map: LocaleMap = [("hello".to_string(), "Hello".to_string())]
            .into_iter()
            .collect();
        let lenient = BatchOrchestrator::new(Arc::new(Renamer));
        assert!(lenient.run(&map, Mode::Translate, "en", "de").await.is_ok());

        let strict = BatchOrchestrator::new(Arc::new(Renamer)).with_strict_keys(true);
        let err = strict.run(&map, Mode::Translate, "en", "de").await.unwrap_err();
        assert!(matches!(err, OrchestrateError::Parse { .. }), "{err}");
    }

    #[tokio::test]
    async fn panicking_call_counts_as_upstream_failure() {
        struct Panicker;

        #[async_trait]
        impl CompletionClient for Panicker {
            async fn complete(&self, _: &CompletionRequest) -> Result<String, CompletionError> {
                panic!("boom");
            }
        }

        let orch = BatchOrchestrator::new(Arc::new(Panicker));
        let err = orch
            .run(&numbered(2), Mode::Translate, "en", "de")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                OrchestrateError::Upstream {
                    chunk: 0,
                    source: CompletionError::Interrupted(_)
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn reply_parsing_accepts_fenced_objects_only() {
        let fenced = "```json\n{\"a\": \"b\"}\n```";
        assert_eq!(parse_chunk_reply(fenced).unwrap()["a"], "b");
        assert_eq!(parse_chunk_reply("  {\"a\": \"b\"}  ").unwrap()["a"], "b");
        assert_eq!(parse_chunk_reply("```json {\"a\": \"b\"} ```").unwrap()["a"], "b");
        assert_eq!(parse_chunk_reply("```{\"a\": \"b\"}```").unwrap()["a"], "b");
        assert!(parse_chunk_reply("[1, 2]").is_err());
        assert!(parse_chunk_reply("{\"a\": ").is_err());
        assert!(parse_chunk_reply("").is_err());
    }
}
