use std::collections::HashMap;

/// Named configuration lookup. A missing key means "use the built-in default".
pub trait SettingsProvider: Send + Sync {
    fn get_setting(&self, name: &str) -> Option<String>;
}

impl<F> SettingsProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn get_setting(&self, name: &str) -> Option<String> {
        self(name)
    }
}

impl SettingsProvider for HashMap<String, String> {
    fn get_setting(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
