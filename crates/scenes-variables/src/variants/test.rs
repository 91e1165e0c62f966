//! Variable with controllable completion, for exercising resolution order

use crate::multi_value::{
    MultiValueVariable, MultiValueVariableState, OptionsRequest, OptionsStream, ValueOptionsSource,
};
use crate::selection::VariableValueOption;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// Options answered from a fixed metric tree once completion is signalled
///
/// The tree has three levels named `A`, `B`, `C`, then `AA`..`CC`, then
/// `AAA`..`CCC`. Queries are dot-separated paths where `*` matches every
/// node and `{A,B}` matches a set.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    signal: Arc<Notify>,
    delay: Option<Duration>,
    requests: Arc<AtomicUsize>,
    issued_query: Arc<Mutex<Option<String>>>,
}

impl TestOptions {
    /// Source answering only when signalled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source also answering on its own after `delay`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Let the pending (or next) request complete
    pub fn signal_update_completed(&self) {
        self.signal.notify_one();
    }

    /// Number of option requests made
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Interpolated query of the last completed request
    #[must_use]
    pub fn issued_query(&self) -> Option<String> {
        self.issued_query.lock().clone()
    }
}

impl ValueOptionsSource for TestOptions {
    const KIND: &'static str = "test";

    fn get_value_options(&self, request: OptionsRequest) -> OptionsStream {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let signal = Arc::clone(&self.signal);
        let delay = self.delay;
        let issued = Arc::clone(&self.issued_query);

        stream::once(async move {
            match delay {
                Some(delay) => {
                    tokio::select! {
                        () = signal.notified() => {}
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => signal.notified().await,
            }
            trace!(variable = %request.name, query = %request.query, "issuing test query");
            *issued.lock() = Some(request.query.clone());
            Ok(query_metric_tree(&request.query)
                .into_iter()
                .map(VariableValueOption::same)
                .collect())
        })
        .boxed()
    }
}

/// Multi-value variable backed by [`TestOptions`]
pub type TestVariable = MultiValueVariable<TestOptions>;

impl TestVariable {
    /// Test variable with a query and its own source handle
    #[must_use]
    pub fn with_query(name: &str, query: &str) -> (Arc<Self>, TestOptions) {
        let source = TestOptions::new();
        let variable = Self::new(
            MultiValueVariableState {
                query: query.to_string(),
                ..MultiValueVariableState::named(name)
            },
            source.clone(),
        );
        (variable, source)
    }
}

const TREE_LETTERS: [char; 3] = ['A', 'B', 'C'];
const TREE_DEPTH: usize = 3;

/// Names matching `query` in the metric tree
///
/// A query starting with `value` is echoed back as its only result.
#[must_use]
pub fn query_metric_tree(query: &str) -> Vec<String> {
    if query.starts_with("value") {
        return vec![query.to_string()];
    }
    let mut level: Vec<String> = TREE_LETTERS.iter().map(char::to_string).collect();
    let segments: Vec<&str> = query.split('.').collect();
    for (depth, segment) in segments.iter().enumerate() {
        let matched: Vec<String> = level
            .into_iter()
            .filter(|name| segment_matches(segment, name))
            .collect();
        if depth + 1 == segments.len() {
            return matched;
        }
        if depth + 1 >= TREE_DEPTH {
            return Vec::new();
        }
        level = matched
            .iter()
            .flat_map(|parent| TREE_LETTERS.iter().map(move |c| format!("{parent}{c}")))
            .collect();
    }
    level
}

fn segment_matches(segment: &str, name: &str) -> bool {
    if segment == "*" {
        return true;
    }
    match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(set) => set.split(',').any(|option| option == name),
        None => segment == name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::VariableSelection;
    use pretty_assertions::assert_eq;

    #[test]
    fn metric_tree_queries() {
        assert_eq!(query_metric_tree("*"), vec!["A", "B", "C"]);
        assert_eq!(query_metric_tree("A.*"), vec!["AA", "AB", "AC"]);
        assert_eq!(query_metric_tree("{A,C}.B"), vec!["AB", "CB"]);
        assert_eq!(query_metric_tree("A.B.*"), vec!["ABA", "ABB", "ABC"]);
        assert_eq!(query_metric_tree("value1"), vec!["value1"]);
        assert!(query_metric_tree("D.*").is_empty());
    }

    #[tokio::test]
    async fn resolves_after_signal() {
        let (variable, source) = TestVariable::with_query("server", "A.*");
        source.signal_update_completed();
        variable.clone().validate_and_update().await.unwrap();

        assert_eq!(source.request_count(), 1);
        assert_eq!(source.issued_query().as_deref(), Some("A.*"));
        assert_eq!(variable.state().value, VariableSelection::from("AA"));
        assert_eq!(variable.state().options.len(), 3);
    }

    #[tokio::test]
    async fn resolves_after_delay() {
        let source = TestOptions::new().with_delay(Duration::from_millis(5));
        let variable = TestVariable::new(
            MultiValueVariableState {
                query: "*".to_string(),
                ..MultiValueVariableState::named("server")
            },
            source,
        );
        variable.clone().validate_and_update().await.unwrap();
        assert_eq!(variable.state().value, VariableSelection::from("A"));
    }
}
