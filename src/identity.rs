use crate::error::AnalyzerError;

/// Raw identifying information for one test, as reported by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TestMetadata {
    pub uri: Option<String>,
    pub line: Option<u32>,
    pub name: Option<String>,
}

impl TestMetadata {
    pub fn locator(uri: impl Into<String>, line: u32) -> Self {
        Self {
            uri: Some(uri.into()),
            line: Some(line),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            line: None,
            name: Some(name.into()),
        }
    }
}

/// Derives the stable key that correlates a test across runs.
///
/// Preferred form is the structural locator `<uri>:<line>`; a bare uri or
/// a whitespace-normalized display name are fallbacks. Outline example
/// rows carry their own line in results documents, so locator keys keep
/// distinct examples distinct. There is no random last resort: metadata
/// with nothing usable in it is an ingestion error, since a generated key
/// can never match any prior run.
pub fn resolve(meta: &TestMetadata) -> Result<String, AnalyzerError> {
    if let Some(uri) = meta.uri.as_deref().filter(|u| !u.trim().is_empty()) {
        return Ok(match meta.line {
            Some(line) if line > 0 => format!("{}:{}", uri.trim(), line),
            _ => uri.trim().to_string(),
        });
    }

    if let Some(name) = meta.name.as_deref() {
        let normalized = normalize_name(name);
        if !normalized.is_empty() {
            return Ok(normalized);
        }
    }

    Err(AnalyzerError::UnresolvableIdentity(format!("{:?}", meta)))
}

// Trim and collapse inner whitespace runs so cosmetic spacing changes in
// display names do not fork the history.
fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_wins_over_name() {
        let meta = TestMetadata {
            uri: Some("classpath:features/login.feature".to_string()),
            line: Some(42),
            name: Some("Login works".to_string()),
        };
        assert_eq!(
            resolve(&meta).unwrap(),
            "classpath:features/login.feature:42"
        );
    }

    #[test]
    fn uri_without_line_is_used_alone() {
        let meta = TestMetadata {
            uri: Some("features/login.feature".to_string()),
            line: None,
            name: None,
        };
        assert_eq!(resolve(&meta).unwrap(), "features/login.feature");
    }

    #[test]
    fn zero_line_is_ignored() {
        let meta = TestMetadata {
            uri: Some("f.feature".to_string()),
            line: Some(0),
            name: None,
        };
        assert_eq!(resolve(&meta).unwrap(), "f.feature");
    }

    #[test]
    fn name_fallback_normalizes_whitespace() {
        let meta = TestMetadata::named("  Login   works \t fine ");
        assert_eq!(resolve(&meta).unwrap(), "Login works fine");
    }

    #[test]
    fn same_key_across_runs() {
        let a = resolve(&TestMetadata::locator("f.feature", 10)).unwrap();
        let b = resolve(&TestMetadata::locator("f.feature", 10)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blank_metadata_is_an_error() {
        let meta = TestMetadata {
            uri: Some("   ".to_string()),
            line: None,
            name: Some("  ".to_string()),
        };
        assert!(matches!(
            resolve(&meta),
            Err(AnalyzerError::UnresolvableIdentity(_))
        ));
    }
}
