//! Static registries of assistant modes and models.
//!
//! Both registries are plain values: the client and the controller receive
//! them at construction and never mutate them afterwards.

use crate::error::{Error, Result};

/// Mode a fresh session starts in.
pub const DEFAULT_MODE: &str = "general";

/// Model a fresh session starts with.
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// Registry key standing for "an identifier typed by the user".
pub const CUSTOM_MODEL_KEY: &str = "8";

/// Alias accepted for [`CUSTOM_MODEL_KEY`].
pub const CUSTOM_MODEL_ALIAS: &str = "custom";

const HACKER_PROMPT: &str = "You are a senior offensive-security engineer helping with authorized \
penetration tests, CTF challenges and defensive hardening. Explain vulnerabilities, attack \
techniques and tooling precisely, answer in markdown with concrete commands where useful, and \
name the detection and mitigation for every technique you describe.";

const CODER_PROMPT: &str = "You are an expert Python/JavaScript/PHP/C++ developer specializing in:
- Security tools development
- Reverse engineering scripts
- Network tools and scanners
- Web security utilities
- Cryptography implementations
- System automation scripts

Write clean, efficient, and well-commented code with security best practices.";

const GENERAL_PROMPT: &str = "You are a helpful AI assistant with expertise in multiple domains.
Provide accurate, detailed, and useful information while maintaining ethical standards.";

/////////////////////////////////////////// Modes ///////////////////////////////////////////

/// Mapping from mode name to the system prompt sent with every request in that mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeRegistry {
    modes: Vec<(String, String)>,
}

impl ModeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `hacker`, `coder` and `general` modes.
    pub fn builtin() -> Self {
        Self::new()
            .with_mode("hacker", HACKER_PROMPT)
            .with_mode("coder", CODER_PROMPT)
            .with_mode(DEFAULT_MODE, GENERAL_PROMPT)
    }

    /// Registers a mode, replacing any prompt already registered under `name`.
    pub fn with_mode(mut self, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        let name = name.into();
        let prompt = prompt.into();
        match self.modes.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = prompt,
            None => self.modes.push((name, prompt)),
        }
        self
    }

    /// Returns true if `name` is a registered mode.
    pub fn contains(&self, name: &str) -> bool {
        self.modes.iter().any(|(existing, _)| existing == name)
    }

    /// Returns the system prompt registered for `name`.
    pub fn system_prompt(&self, name: &str) -> Option<&str> {
        self.modes
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, prompt)| prompt.as_str())
    }

    /// Registered mode names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(|(name, _)| name.as_str())
    }
}

/////////////////////////////////////////// Models //////////////////////////////////////////

/// Mapping from short selection keys to provider model identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    models: Vec<(String, String)>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The OpenRouter models offered by default.
    pub fn builtin() -> Self {
        Self::new()
            .with_model("1", DEFAULT_MODEL)
            .with_model("2", "openai/gpt-4")
            .with_model("3", "openai/gpt-4-turbo")
            .with_model("4", "meta-llama/llama-3-70b-instruct")
            .with_model("5", "google/gemini-pro")
            .with_model("6", "anthropic/claude-3-opus")
            .with_model("7", "mistralai/mistral-7b-instruct")
    }

    /// Registers a model under a selection key.
    pub fn with_model(mut self, key: impl Into<String>, model: impl Into<String>) -> Self {
        let key = key.into();
        let model = model.into();
        match self.models.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = model,
            None => self.models.push((key, model)),
        }
        self
    }

    /// Returns the model identifier registered under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, model)| model.as_str())
    }

    /// Registered `(key, model)` pairs in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.models
            .iter()
            .map(|(key, model)| (key.as_str(), model.as_str()))
    }

    /// Resolves user input to a provider model identifier.
    ///
    /// Accepted forms:
    /// - a registry key (`3`) selects the registered model;
    /// - the custom sentinel followed by an identifier (`8 vendor/model`,
    ///   `custom vendor/model`) selects that identifier;
    /// - any other single identifier (`vendor/model`) is taken verbatim.
    ///
    /// The sentinel on its own is rejected because it names no model.
    pub fn resolve(&self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::validation(
                "a model key or identifier is required",
                Some("model".to_string()),
            ));
        }
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, Some(rest.trim())),
            None => (input, None),
        };
        if is_custom_sentinel(head) {
            return match rest.filter(|rest| !rest.is_empty()) {
                Some(identifier) => Ok(identifier.to_string()),
                None => Err(Error::validation(
                    "the custom model selection needs an identifier, e.g. `model custom vendor/model`",
                    Some("model".to_string()),
                )),
            };
        }
        if rest.is_some() {
            return Err(Error::validation(
                format!("model identifiers cannot contain whitespace: {input:?}"),
                Some("model".to_string()),
            ));
        }
        Ok(self.get(head).unwrap_or(head).to_string())
    }
}

fn is_custom_sentinel(key: &str) -> bool {
    key == CUSTOM_MODEL_KEY || key.eq_ignore_ascii_case(CUSTOM_MODEL_ALIAS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_modes_have_prompts() {
        let modes = ModeRegistry::builtin();
        for name in ["hacker", "coder", "general"] {
            assert!(modes.contains(name), "{name} should be registered");
            assert!(modes.system_prompt(name).is_some());
        }
        assert!(!modes.contains("pirate"));
        assert_eq!(modes.system_prompt("pirate"), None);
        assert_eq!(
            modes.names().collect::<Vec<_>>(),
            vec!["hacker", "coder", "general"]
        );
    }

    #[test]
    fn with_mode_replaces_existing_prompt() {
        let modes = ModeRegistry::new()
            .with_mode("terse", "Be terse.")
            .with_mode("terse", "Be very terse.");
        assert_eq!(modes.names().count(), 1);
        assert_eq!(modes.system_prompt("terse"), Some("Be very terse."));
    }

    #[test]
    fn resolve_registry_key() {
        let models = ModelRegistry::builtin();
        assert_eq!(models.resolve("1").unwrap(), DEFAULT_MODEL);
        assert_eq!(models.resolve(" 6 ").unwrap(), "anthropic/claude-3-opus");
    }

    #[test]
    fn resolve_custom_sentinel() {
        let models = ModelRegistry::builtin();
        assert_eq!(
            models.resolve("8 qwen/qwen-2-72b-instruct").unwrap(),
            "qwen/qwen-2-72b-instruct"
        );
        assert_eq!(
            models.resolve("custom   qwen/qwen-2-72b-instruct").unwrap(),
            "qwen/qwen-2-72b-instruct"
        );
        assert!(models.resolve("8").unwrap_err().is_validation());
        assert!(models.resolve("custom").unwrap_err().is_validation());
    }

    #[test]
    fn resolve_arbitrary_identifier() {
        let models = ModelRegistry::builtin();
        assert_eq!(
            models.resolve("openai/gpt-4o").unwrap(),
            "openai/gpt-4o"
        );
        assert!(models.resolve("").is_err());
        assert!(models.resolve("two words").is_err());
    }
}
