use crate::forms::form::FormStatus;
use std::sync::Arc;

/// Ordered set of forms selected by the caller for one transfer operation.
/// Immutable for the duration of a pipeline invocation; only each form's
/// status string changes.
#[derive(Debug, Clone, Default)]
pub struct TransferForms {
    forms: Vec<Arc<FormStatus>>,
}

impl TransferForms {
    pub fn from(forms: Vec<Arc<FormStatus>>) -> Self {
        Self { forms }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FormStatus>> {
        self.forms.iter()
    }

    /// Forms matching the predicate, in selection order.
    pub fn filter<P>(&self, pred: P) -> Vec<Arc<FormStatus>>
    where
        P: Fn(&FormStatus) -> bool,
    {
        self.forms
            .iter()
            .filter(|f| pred(f))
            .cloned()
            .collect()
    }

    /// Map every form to some derived value (typically a transfer job).
    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Arc<FormStatus>) -> T,
    {
        self.forms.iter().map(f).collect()
    }
}

impl FromIterator<Arc<FormStatus>> for TransferForms {
    fn from_iter<I: IntoIterator<Item = Arc<FormStatus>>>(iter: I) -> Self {
        Self {
            forms: iter.into_iter().collect(),
        }
    }
}
