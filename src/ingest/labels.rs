//! Label id resolution.
//!
//! Tracker payloads carry label ids, while routing decisions are made on
//! label names. The tracker client that does the lookup lives outside this
//! crate; [`LabelResolver`] is the seam it plugs into.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;

/// Resolves tracker label ids to display names.
///
/// # Example (in-memory)
///
/// ```
/// use autopilot::ingest::{LabelResolver, StaticLabels};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let labels = StaticLabels::from_pairs([("lbl-1", "autopilot")]);
/// let names = labels.resolve(&["lbl-1".to_string(), "lbl-x".to_string()]).await.unwrap();
/// assert_eq!(names, ["autopilot"]);
/// # }
/// ```
pub trait LabelResolver {
    /// The error type returned by this resolver.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the names of the given label ids, in input order.
    ///
    /// Ids the resolver does not know are dropped.
    fn resolve(
        &self,
        label_ids: &[String],
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;
}

/// Fixed id→name table, loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticLabels {
    names: HashMap<String, String>,
}

impl StaticLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        StaticLabels {
            names: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parses `id=name` pairs separated by commas, as used in configuration.
    ///
    /// Blank entries and entries without `=` are skipped.
    pub fn parse(pairs: &str) -> Self {
        Self::from_pairs(pairs.split(',').filter_map(|pair| {
            let (id, name) = pair.split_once('=')?;
            let (id, name) = (id.trim(), name.trim());
            (!id.is_empty() && !name.is_empty()).then(|| (id.to_string(), name.to_string()))
        }))
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl LabelResolver for StaticLabels {
    type Error = Infallible;

    async fn resolve(&self, label_ids: &[String]) -> Result<Vec<String>, Self::Error> {
        Ok(label_ids
            .iter()
            .filter_map(|id| self.names.get(id).cloned())
            .collect())
    }
}
