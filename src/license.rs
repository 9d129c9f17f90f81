//! Tech-pack licensing filter
//!
//! Bridges the external license service and tech-pack descriptors. A tech
//! pack is licensed when any one of its license codes is valid. A tech pack
//! with no codes configured is not installed, and an unreachable license
//! service counts as "not licensed"; in both cases the tech pack is
//! excluded from resolution rather than failing the request.

use crate::types::TechPackDescriptor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a [`LicenseService`] implementation
#[derive(Error, Debug)]
pub enum LicenseError {
    /// The license service could not be reached
    #[error("licensing service unavailable: {0}")]
    Unavailable(String),
}

/// External license validity checks, one code at a time
pub trait LicenseService: Send + Sync {
    /// Whether the given license code is currently valid
    fn has_license(&self, code: &str) -> Result<bool, LicenseError>;
}

/// Applies license checks to tech packs
pub struct TechPackLicensing {
    service: Arc<dyn LicenseService>,
}

impl TechPackLicensing {
    /// Create a licensing filter over the given service
    pub fn new(service: Arc<dyn LicenseService>) -> Self {
        Self { service }
    }

    /// Whether any of the tech pack's license codes is valid.
    ///
    /// No configured codes means the tech pack is not installed; a service
    /// failure is logged and treated as not licensed.
    pub fn is_licensed(&self, tech_pack: &TechPackDescriptor) -> bool {
        if tech_pack.license_codes.is_empty() {
            debug!(
                tech_pack = %tech_pack.name,
                "no license codes configured, tech pack is not installed"
            );
            return false;
        }
        for code in &tech_pack.license_codes {
            match self.service.has_license(code) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        tech_pack = %tech_pack.name,
                        license_code = %code,
                        error = %e,
                        "license check failed, treating tech pack as unlicensed"
                    );
                    return false;
                }
            }
        }
        false
    }

    /// Filter to the licensed subset, preserving order
    pub fn licensed<'a>(
        &self,
        tech_packs: &'a [TechPackDescriptor],
    ) -> Vec<&'a TechPackDescriptor> {
        tech_packs
            .iter()
            .filter(|tp| self.is_licensed(tp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct FixedLicenses {
        valid: HashSet<String>,
        fail: bool,
    }

    impl FixedLicenses {
        fn with(codes: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                valid: codes.iter().map(|c| c.to_string()).collect(),
                fail: false,
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                valid: HashSet::new(),
                fail: true,
            })
        }
    }

    impl LicenseService for FixedLicenses {
        fn has_license(&self, code: &str) -> Result<bool, LicenseError> {
            if self.fail {
                return Err(LicenseError::Unavailable("connection refused".into()));
            }
            Ok(self.valid.contains(code))
        }
    }

    #[test]
    fn test_any_valid_code_licenses_the_tech_pack() {
        let licensing = TechPackLicensing::new(FixedLicenses::with(&["CXC002"]));
        let tp = TechPackDescriptor::new("EVENT_E_SGEH")
            .with_license_code("CXC001")
            .with_license_code("CXC002");
        assert!(licensing.is_licensed(&tp));
    }

    #[test]
    fn test_no_codes_means_not_installed() {
        let licensing = TechPackLicensing::new(FixedLicenses::with(&["CXC001"]));
        let tp = TechPackDescriptor::new("EVENT_E_SGEH");
        assert!(!licensing.is_licensed(&tp));
    }

    #[test]
    fn test_unreachable_service_means_unlicensed() {
        let licensing = TechPackLicensing::new(FixedLicenses::unreachable());
        let tp = TechPackDescriptor::new("EVENT_E_SGEH").with_license_code("CXC001");
        assert!(!licensing.is_licensed(&tp));
    }

    #[test]
    fn test_licensed_filter_preserves_order() {
        let licensing = TechPackLicensing::new(FixedLicenses::with(&["CXC_LTE"]));
        let packs = vec![
            TechPackDescriptor::new("EVENT_E_SGEH").with_license_code("CXC_SGEH"),
            TechPackDescriptor::new("EVENT_E_LTE").with_license_code("CXC_LTE"),
        ];
        let licensed = licensing.licensed(&packs);
        assert_eq!(licensed.len(), 1);
        assert_eq!(licensed[0].name, "EVENT_E_LTE");
    }
}
