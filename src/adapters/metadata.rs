//! Process identity for owner records and diagnostics.

/// Supplies the identifier string written into the information region and
/// quoted in timeout errors. Expected to be cheap and stable for the
/// lifetime of the process.
pub trait ProcessMetaDataProvider: Send + Sync {
    fn process_identifier(&self) -> String;
}

/// Default provider: the OS process id.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentProcessMetaDataProvider;

impl ProcessMetaDataProvider for CurrentProcessMetaDataProvider {
    fn process_identifier(&self) -> String {
        std::process::id().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_stable_within_a_process() {
        let provider = CurrentProcessMetaDataProvider;
        assert_eq!(provider.process_identifier(), provider.process_identifier());
        assert!(!provider.process_identifier().is_empty());
    }
}
