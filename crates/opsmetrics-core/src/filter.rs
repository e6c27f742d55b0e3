//! Attribute admission policy.
//!
//! Attributes that embed an application identifier (`appId=<uuid>`) are
//! blacklisted unless application-specific metrics were explicitly enabled.

use std::sync::LazyLock;

use regex::Regex;

static APP_METRIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("appId=[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("app metric pattern is valid")
});

/// True if the attribute name carries an `appId=<uuid>` segment.
pub fn is_app_specific(attribute_name: &str) -> bool {
    APP_METRIC_PATTERN.is_match(attribute_name)
}

/// Decide whether an attribute is eligible for extraction.
pub fn admit(attribute_name: &str, include_app_specific: bool) -> bool {
    include_app_specific || !is_app_specific(attribute_name)
}

/// Attribute filter bound to a fixed policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    include_app_specific: bool,
}

impl AttributeFilter {
    pub fn new(include_app_specific: bool) -> Self {
        Self {
            include_app_specific,
        }
    }

    pub fn include_app_specific(&self) -> bool {
        self.include_app_specific
    }

    pub fn admit(&self, attribute_name: &str) -> bool {
        admit(attribute_name, self.include_app_specific)
    }
}
