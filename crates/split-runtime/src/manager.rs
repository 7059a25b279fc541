//! The read-only projection over stored rules: a thin view used by
//! operators and dashboards, never by the evaluation path itself.

use std::sync::Arc;

use split_core::model::Split;
use split_core::storage::SplitStorage;

/// A human-readable snapshot of one stored [`Split`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitView {
    pub name: String,
    pub traffic_type: String,
    pub killed: bool,
    pub treatments: Vec<String>,
    pub change_number: i64,
}

impl From<&Split> for SplitView {
    fn from(split: &Split) -> Self {
        Self {
            name: split.name.clone(),
            traffic_type: split.traffic_type_name.clone(),
            killed: split.killed,
            treatments: split.treatments(),
            change_number: split.change_number,
        }
    }
}

/// Read-only view over a [`crate::factory::SplitFactory`]'s split storage.
/// Shares storage with any [`crate::client::SplitClient`] built from the
/// same factory; never writes.
pub struct SplitManager {
    split_storage: Arc<dyn SplitStorage>,
}

impl SplitManager {
    pub(crate) fn new(split_storage: Arc<dyn SplitStorage>) -> Self {
        Self { split_storage }
    }

    pub fn split_names(&self) -> Vec<String> {
        self.split_storage
            .get_all()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn splits(&self) -> Vec<SplitView> {
        self.split_storage
            .get_all()
            .iter()
            .map(SplitView::from)
            .collect()
    }

    pub fn split(&self, name: &str) -> Option<SplitView> {
        self.split_storage.get(name).as_ref().map(SplitView::from)
    }
}
