//! Replay of recorded call histories

use crate::error::Result;
use crate::recorder::{call_count, read_history, CallRecord, Outcome};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use tracing::debug;

/// Ordered trace of the calls made to one operation
#[derive(Debug, Clone, PartialEq)]
pub struct CallTrace {
    /// Operation name
    pub operation: String,

    /// Value of the invocation counter
    pub calls: u64,

    /// Recorded calls, earliest first
    pub records: Vec<CallRecord>,
}

impl CallTrace {
    /// Number of recorded argument/outcome pairs
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The lines `fmt::Display` prints, one per call after the summary
    pub fn lines(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| format_call(&self.operation, record))
            .collect()
    }
}

fn format_args(args: &Value) -> String {
    args.to_string()
}

fn format_call(operation: &str, record: &CallRecord) -> String {
    match &record.outcome {
        Outcome::Returned(value) => {
            format!("{}(*{}) -> {}", operation, format_args(&record.args), value)
        }
        Outcome::Failed(message) => format!(
            "{}(*{}) -> error: {}",
            operation,
            format_args(&record.args),
            message
        ),
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.operation, self.calls)?;
        for record in &self.records {
            writeln!(f, "{}", format_call(&self.operation, record))?;
        }
        Ok(())
    }
}

/// Rebuild the call trace of `operation`
///
/// An operation that was never invoked yields a trace with zero calls.
pub async fn replay(store: &dyn KeyValueStore, operation: &str) -> Result<CallTrace> {
    let calls = call_count(store, operation).await?;
    let records = read_history(store, operation).await?;

    debug!(
        "Replaying {}: {} calls, {} recorded",
        operation,
        calls,
        records.len()
    );

    Ok(CallTrace {
        operation: operation.to_string(),
        calls,
        records,
    })
}

/// Replay `operation` into `out`
pub async fn replay_to<W: Write>(
    store: &dyn KeyValueStore,
    operation: &str,
    out: &mut W,
) -> Result<CallTrace> {
    let trace = replay(store, operation).await?;
    write!(out, "{}", trace).map_err(|e| crate::error::CacheError::Other(e.to_string()))?;
    Ok(trace)
}

/// Replay `operation` to stdout
pub async fn print_replay(store: &dyn KeyValueStore, operation: &str) -> Result<CallTrace> {
    let trace = replay(store, operation).await?;
    print!("{}", trace);
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_replay_unknown_operation() {
        let store = MemoryStore::default();

        let trace = replay(&store, "Cache.store").await.unwrap();
        assert_eq!(trace.calls, 0);
        assert!(trace.is_empty());
        assert_eq!(trace.to_string(), "Cache.store was called 0 times:\n");
    }

    #[test]
    fn test_trace_display() {
        let trace = CallTrace {
            operation: "Cache.store".to_string(),
            calls: 2,
            records: vec![
                CallRecord {
                    args: json!(["foo"]),
                    outcome: Outcome::Returned(json!("id-1")),
                },
                CallRecord {
                    args: json!([42]),
                    outcome: Outcome::Failed("Store error: down".to_string()),
                },
            ],
        };

        assert_eq!(
            trace.to_string(),
            "Cache.store was called 2 times:\n\
             Cache.store(*[\"foo\"]) -> \"id-1\"\n\
             Cache.store(*[42]) -> error: Store error: down\n"
        );
        assert_eq!(trace.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_replay_to_writer() {
        let store = MemoryStore::default();
        store.incr("Op.run").await.unwrap();
        store
            .rpush("Op.run:inputs", br#"{"v":1,"args":[1]}"#.to_vec())
            .await
            .unwrap();
        store
            .rpush("Op.run:outputs", br#"{"v":1,"ok":true}"#.to_vec())
            .await
            .unwrap();

        let mut out = Vec::new();
        let trace = replay_to(&store, "Op.run", &mut out).await.unwrap();

        assert_eq!(trace.calls, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Op.run was called 1 times:\nOp.run(*[1]) -> true\n"
        );
    }
}
