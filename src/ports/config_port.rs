//! Configuration access port trait.

/// Raw key lookup. Typed parsing and range checks live in
/// `domain::config_validation`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
