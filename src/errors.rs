//! Aggregation of independent failures into a single error.

use std::fmt;

/// Several failures that must all be reported
///
/// Used where a second step runs after a first one failed (cleanup after a
/// failed create, update after a failed status patch) so neither cause is lost.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<anyhow::Error>);

impl ErrorList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: anyhow::Error) {
        self.0.push(err);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok` when empty, the error itself when there is only one
    pub fn into_result(mut self) -> Result<(), anyhow::Error> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(anyhow::Error::new(self)),
        }
    }

    /// Like [`Self::into_result`] for callers that already know something failed
    #[must_use]
    pub fn into_error(self) -> anyhow::Error {
        match self.into_result() {
            Ok(()) => anyhow::anyhow!("unknown error"),
            Err(err) => err,
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred: ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}
