use crate::ImportWarning;

/// Default cap on collected warnings per load.
pub const DEFAULT_MAX_WARNINGS: usize = 1_000;

pub(crate) const WARNINGS_SUPPRESSED_MESSAGE: &str = "additional warnings suppressed";

/// Bounded warning collector: once `max` warnings are held, one terminal marker is added and
/// everything after it is dropped (still logged).
#[derive(Debug)]
pub(crate) struct Warnings {
    items: Vec<ImportWarning>,
    max: usize,
}

impl Warnings {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
        }
    }

    pub(crate) fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        if self.items.len() < self.max {
            self.items.push(ImportWarning::new(message));
            return;
        }
        if self.items.len() == self.max {
            self.items
                .push(ImportWarning::new(WARNINGS_SUPPRESSED_MESSAGE));
        }
    }

    pub(crate) fn into_vec(self) -> Vec<ImportWarning> {
        self.items
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
