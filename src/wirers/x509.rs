//! X.509 client certificate authentication.

use regex::Regex;

use crate::chain::{ChainFilter, X509Filter};
use crate::config::SecurityConfig;
use crate::error::CompileError;
use crate::order::{FilterSlot, Placement};
use crate::resolver::Resolver;
use crate::wirers::{Contribution, FeatureWirer};

const DEFAULT_SUBJECT_PRINCIPAL_REGEX: &str = "CN=(.*?)(?:,|$)";

/// Wires principal extraction from verified client certificates.
///
/// The subject principal regex must compile and capture exactly one group, which is the
/// extracted principal.
pub struct X509Wirer;

impl FeatureWirer for X509Wirer {
    fn name(&self) -> &'static str {
        "x509"
    }

    fn applies(&self, config: &SecurityConfig) -> bool {
        config.x509.is_some()
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        _resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let x509 = config
            .x509
            .as_ref()
            .ok_or_else(|| CompileError::validation("x509", "missing"))?;
        let pattern = x509
            .subject_principal_regex
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBJECT_PRINCIPAL_REGEX.to_string());

        let compiled = Regex::new(&pattern).map_err(|e| {
            CompileError::validation(
                "x509.subject_principal_regex",
                format!("malformed regex '{}': {}", pattern, e),
            )
        })?;
        if compiled.captures_len() != 2 {
            return Err(CompileError::validation(
                "x509.subject_principal_regex",
                "regex must contain exactly one capture group for the principal",
            ));
        }

        Ok(Contribution::default().filter(
            ChainFilter::X509(X509Filter {
                subject_principal_regex: pattern,
            }),
            Placement::Slot(FilterSlot::X509),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(yaml: &str) -> Result<Contribution, CompileError> {
        let config: SecurityConfig = serde_yaml::from_str(yaml).unwrap();
        X509Wirer.wire(&config, &Resolver::new())
    }

    #[test]
    fn default_regex_extracts_common_name() {
        let contribution = wire("x509: {}\n").unwrap();
        let ChainFilter::X509(filter) = &contribution.filters[0].0 else {
            panic!("expected x509 filter");
        };
        let re = Regex::new(&filter.subject_principal_regex).unwrap();
        let caps = re.captures("CN=alice,OU=dev").unwrap();
        assert_eq!(&caps[1], "alice");
    }

    #[test]
    fn malformed_regex_is_rejected() {
        let err = wire("x509:\n  subject_principal_regex: '(['\n").unwrap_err();
        assert!(matches!(err, CompileError::Validation { ref field, .. }
            if field == "x509.subject_principal_regex"));
    }

    #[test]
    fn regex_without_capture_group_is_rejected() {
        let err = wire("x509:\n  subject_principal_regex: 'CN=.*'\n").unwrap_err();
        assert!(matches!(err, CompileError::Validation { .. }));
    }
}
