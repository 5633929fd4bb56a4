//! Setting finders read by endpoint extractors.

use super::SettingFinder;
use std::collections::HashMap;

/// Identifier under which a [`StaticSettingFinder`] is usually registered.
pub const STATIC_SETTING_FINDER: &str = "static";

/// Reads settings from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSettingFinder;

impl SettingFinder for EnvSettingFinder {
    fn find(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed key/value settings, built once at configuration time.
#[derive(Debug, Default, Clone)]
pub struct StaticSettingFinder {
    values: HashMap<String, String>,
}

impl StaticSettingFinder {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl SettingFinder for StaticSettingFinder {
    fn find(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
