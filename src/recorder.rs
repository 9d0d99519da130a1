//! # Call Recording
//!
//! Instrumentation is explicit composition. An [`Operation`] is any async
//! callable that runs against a [`KeyValueStore`]; two wrapper layers add
//! bookkeeping around it:
//!
//! - [`Counted`] increments the counter stored under the operation name
//!   before delegating.
//! - [`Recorded`] appends the rendered arguments to `<name>:inputs` before
//!   delegating and the rendered outcome to `<name>:outputs` afterwards.
//!
//! [`instrument`] applies both with counting outermost, so the counter is
//! bumped before the history sees the call.
//!
//! ## History format
//!
//! Each list element is a JSON object tagged with a format version:
//!
//! ```text
//! <name>:inputs   {"args":["foo"],"v":1}
//! <name>:outputs  {"ok":"0b6f...","v":1}   or   {"err":"...","v":1}
//! ```
//!
//! A failed call still appends an `err` record so that index *i* of the
//! inputs list always pairs with index *i* of the outputs list. Failures are
//! also counted under `<name>:failures`.
//!
//! ## Concurrency
//!
//! Each store primitive is atomic, so counters never lose increments and the
//! two lists always end up with the same length. The wrappers hold no lock
//! across a call though: when callers overlap, the *i*-th input and the
//! *i*-th output may belong to different calls. Pairing is exact only for
//! sequential callers of one operation.

use crate::error::{CacheError, Result};
use crate::store::{KeyValueStore, RawValue};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Version written into every history record
pub const HISTORY_FORMAT_VERSION: u64 = 1;

/// An async callable that runs against a key-value store
#[async_trait]
pub trait Operation: Send + Sync {
    /// Positional arguments, usually a tuple
    type Args: Serialize + Send + Sync + 'static;

    /// Value returned on success
    type Output: Serialize + Send + 'static;

    /// Stable qualified name, used as the key namespace for counters and history
    fn name(&self) -> &str;

    /// Run the operation
    async fn invoke(&self, store: &dyn KeyValueStore, args: Self::Args) -> Result<Self::Output>;
}

/// Store keys owned by one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKeys {
    /// Invocation counter
    pub calls: String,
    /// Rendered argument list
    pub inputs: String,
    /// Rendered outcome list
    pub outputs: String,
    /// Failure counter
    pub failures: String,
}

impl HistoryKeys {
    /// Keys for the operation called `name`
    pub fn for_operation(name: &str) -> Self {
        Self {
            calls: name.to_string(),
            inputs: format!("{}:inputs", name),
            outputs: format!("{}:outputs", name),
            failures: format!("{}:failures", name),
        }
    }
}

/// Counting layer
pub struct Counted<O> {
    inner: O,
}

impl<O: Operation> Counted<O> {
    pub fn new(inner: O) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: Operation> Operation for Counted<O> {
    type Args = O::Args;
    type Output = O::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, store: &dyn KeyValueStore, args: Self::Args) -> Result<Self::Output> {
        let calls = store.incr(self.name()).await?;
        debug!("{} call #{}", self.name(), calls);
        self.inner.invoke(store, args).await
    }
}

/// History layer
pub struct Recorded<O> {
    inner: O,
    keys: HistoryKeys,
}

impl<O: Operation> Recorded<O> {
    pub fn new(inner: O) -> Self {
        let keys = HistoryKeys::for_operation(inner.name());
        Self { inner, keys }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn keys(&self) -> &HistoryKeys {
        &self.keys
    }
}

#[async_trait]
impl<O: Operation> Operation for Recorded<O> {
    type Args = O::Args;
    type Output = O::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, store: &dyn KeyValueStore, args: Self::Args) -> Result<Self::Output> {
        store.rpush(&self.keys.inputs, render_input(&args)?).await?;

        let result = self.inner.invoke(store, args).await;

        let record = match &result {
            Ok(output) => render_output(output).unwrap_or_else(|e| render_error(&e)),
            Err(e) => render_error(e),
        };
        store.rpush(&self.keys.outputs, record).await?;

        if let Err(e) = &result {
            let failures = store.incr(&self.keys.failures).await?;
            warn!("{} failed ({} failures so far): {}", self.name(), failures, e);
        }

        result
    }
}

/// Wrap `op` with counting (outer) and history (inner)
pub fn instrument<O: Operation>(op: O) -> Counted<Recorded<O>> {
    Counted::new(Recorded::new(op))
}

fn render_input<A: Serialize>(args: &A) -> Result<RawValue> {
    let record = json!({ "v": HISTORY_FORMAT_VERSION, "args": serde_json::to_value(args)? });
    Ok(record.to_string().into_bytes())
}

fn render_output<T: Serialize>(output: &T) -> Result<RawValue> {
    let record = json!({ "v": HISTORY_FORMAT_VERSION, "ok": serde_json::to_value(output)? });
    Ok(record.to_string().into_bytes())
}

fn render_error(error: &CacheError) -> RawValue {
    json!({ "v": HISTORY_FORMAT_VERSION, "err": error.to_string() })
        .to_string()
        .into_bytes()
}

/// Outcome of one recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The call returned this value
    Returned(Value),
    /// The call failed with this message
    Failed(String),
}

/// One decoded history entry
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Positional arguments as recorded
    pub args: Value,
    /// What the call produced
    pub outcome: Outcome,
}

fn parse_record(raw: &[u8], list: &str) -> Result<serde_json::Map<String, Value>> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| CacheError::History(format!("malformed {} record: {}", list, e)))?;

    let Value::Object(map) = value else {
        return Err(CacheError::History(format!("{} record is not an object", list)));
    };

    match map.get("v").and_then(Value::as_u64) {
        Some(HISTORY_FORMAT_VERSION) => Ok(map),
        Some(other) => Err(CacheError::History(format!(
            "unsupported {} record version {}",
            list, other
        ))),
        None => Err(CacheError::History(format!("{} record has no version", list))),
    }
}

/// Decode one `:inputs` element into its argument list
pub fn decode_input(raw: &[u8]) -> Result<Value> {
    let mut map = parse_record(raw, "input")?;
    map.remove("args")
        .ok_or_else(|| CacheError::History("input record has no args".to_string()))
}

/// Decode one `:outputs` element
pub fn decode_output(raw: &[u8]) -> Result<Outcome> {
    let mut map = parse_record(raw, "output")?;

    if let Some(value) = map.remove("ok") {
        return Ok(Outcome::Returned(value));
    }

    match map.remove("err") {
        Some(Value::String(message)) => Ok(Outcome::Failed(message)),
        Some(other) => Ok(Outcome::Failed(other.to_string())),
        None => Err(CacheError::History(
            "output record has neither ok nor err".to_string(),
        )),
    }
}

/// Read and pair the recorded history of `name`, earliest call first
///
/// Pairs are formed up to the shorter list, so a call still in flight is
/// left out.
pub async fn read_history(store: &dyn KeyValueStore, name: &str) -> Result<Vec<CallRecord>> {
    let keys = HistoryKeys::for_operation(name);
    let inputs = store.lrange(&keys.inputs, 0, -1).await?;
    let outputs = store.lrange(&keys.outputs, 0, -1).await?;

    inputs
        .iter()
        .zip(outputs.iter())
        .map(|(input, output)| -> Result<CallRecord> {
            Ok(CallRecord {
                args: decode_input(input)?,
                outcome: decode_output(output)?,
            })
        })
        .collect()
}

/// Current invocation count of `name`, 0 when it was never called
pub async fn call_count(store: &dyn KeyValueStore, name: &str) -> Result<u64> {
    counter_value(store, name).await
}

/// Number of failed invocations of `name`
pub async fn failure_count(store: &dyn KeyValueStore, name: &str) -> Result<u64> {
    counter_value(store, &HistoryKeys::for_operation(name).failures).await
}

async fn counter_value(store: &dyn KeyValueStore, key: &str) -> Result<u64> {
    match store.get(key).await? {
        Some(raw) => {
            let text = std::str::from_utf8(&raw).map_err(|e| CacheError::decode("counter", e))?;
            text.trim()
                .parse::<u64>()
                .map_err(|e| CacheError::decode("counter", e))
        }
        None => Ok(0),
    }
}
