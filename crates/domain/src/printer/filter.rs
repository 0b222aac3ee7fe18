use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PRINTER_SERVICE_UUID;

/// Criteria used to pick a printer out of the advertising devices.
///
/// A device matches when it advertises any of `services` or its name starts
/// with any of `name_prefixes`. An empty filter accepts every device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    #[serde(default)]
    pub services: Vec<Uuid>,
    #[serde(default)]
    pub name_prefixes: Vec<String>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            services: vec![PRINTER_SERVICE_UUID],
            name_prefixes: vec!["Printer".to_string(), "BT".to_string()],
        }
    }
}

impl DeviceFilter {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.name_prefixes.is_empty()
    }

    pub fn matches(&self, name: Option<&str>, advertised: &[Uuid]) -> bool {
        if self.is_empty() {
            return true;
        }

        let service_match = advertised
            .iter()
            .any(|service| self.services.contains(service));

        let name_match = name.is_some_and(|name| {
            self.name_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
        });

        service_match || name_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_printer_service() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(None, &[PRINTER_SERVICE_UUID]));
        assert!(!filter.matches(None, &[Uuid::nil()]));
    }

    #[test]
    fn test_default_matches_name_prefixes() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(Some("Printer-001"), &[]));
        assert!(filter.matches(Some("BT-58"), &[]));
        assert!(!filter.matches(Some("Headphones"), &[]));
        assert!(!filter.matches(Some("my BT"), &[]));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = DeviceFilter {
            services: vec![],
            name_prefixes: vec![],
        };
        assert!(filter.matches(None, &[]));
    }
}
