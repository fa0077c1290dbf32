//! # Store Errors
//!
//! Errors raised by the store engine itself. Document-specific failures travel inside
//! [`StoreError::Document`] and can be recovered with [`StoreError::into_document_error`].

/// Errors that can occur within the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store closed")]
    StoreClosed,
    #[error("Store dropped response channel")]
    StoreDropped,
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Document error: {0}")]
    Document(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Recovers the typed document error, if this is one.
    ///
    /// Returns `Err(self)` unchanged for engine errors or for a document error of another type.
    pub fn into_document_error<E>(self) -> Result<E, StoreError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            StoreError::Document(inner) => match inner.downcast::<E>() {
                Ok(typed) => Ok(*typed),
                Err(other) => Err(StoreError::Document(other)),
            },
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("conflict")]
    struct Conflict;

    #[test]
    fn typed_error_survives_the_box() {
        let err = StoreError::Document(Box::new(Conflict));
        assert_eq!(err.into_document_error::<Conflict>().ok(), Some(Conflict));
    }

    #[test]
    fn engine_errors_are_passed_back() {
        let err = StoreError::StoreClosed;
        assert!(matches!(err.into_document_error::<Conflict>(), Err(StoreError::StoreClosed)));
        let foreign = StoreError::Document(Box::new(std::io::Error::other("disk")));
        assert!(matches!(foreign.into_document_error::<Conflict>(), Err(StoreError::Document(_))));
    }
}
