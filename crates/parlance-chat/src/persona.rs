//! Persona registry: named system prompts, fixed at startup.

use parlance_core::config::PersonaConfig;

use crate::error::ChatError;

/// Persona a session starts with when nothing else is configured.
pub const DEFAULT_PERSONA: &str = "General (default)";

const BUILTIN_PERSONAS: &[(&str, &str)] = &[
    (DEFAULT_PERSONA, "You are a helpful, concise assistant."),
    (
        "Friendly Tutor",
        "You are a patient tutor who explains step-by-step with examples.",
    ),
    (
        "Strict Interviewer",
        "You ask probing, concise questions and challenge assumptions.",
    ),
    (
        "Creative Writer",
        "You write with flair, vivid imagery, but stay on brief.",
    ),
    (
        "Code Assistant",
        "You are a senior developer; offer clear, runnable code and best practices.",
    ),
];

/// A named system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub system_prompt: String,
}

/// Read-only mapping from persona name to system prompt.
///
/// Built once at startup and shared between sessions; no method mutates it
/// after construction.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
    default: String,
}

impl PersonaRegistry {
    /// Registry holding only the built-in personas.
    pub fn builtin() -> Self {
        Self {
            personas: BUILTIN_PERSONAS
                .iter()
                .map(|(name, prompt)| Persona {
                    name: name.to_string(),
                    system_prompt: prompt.to_string(),
                })
                .collect(),
            default: DEFAULT_PERSONA.to_string(),
        }
    }

    /// Built-ins merged with the configured custom personas.
    ///
    /// A custom entry sharing a built-in name replaces its prompt in place;
    /// new names are appended in alphabetical order. Fails if the configured
    /// default persona does not exist after merging.
    pub fn from_config(config: &PersonaConfig) -> Result<Self, ChatError> {
        let mut registry = Self::builtin();

        for (name, prompt) in &config.custom {
            let name = name.trim();
            if name.is_empty() || prompt.trim().is_empty() {
                tracing::warn!(persona = %name, "Skipping custom persona with blank name or prompt");
                continue;
            }
            match registry.personas.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    tracing::debug!(persona = %name, "Custom prompt overrides built-in persona");
                    existing.system_prompt = prompt.clone();
                }
                None => registry.personas.push(Persona {
                    name: name.to_string(),
                    system_prompt: prompt.clone(),
                }),
            }
        }

        let default = config.default.trim();
        if !registry.contains(default) {
            return Err(ChatError::UnknownPersona(default.to_string()));
        }
        registry.default = default.to_string();

        tracing::info!(
            count = registry.personas.len(),
            default = %registry.default,
            "Persona registry ready"
        );
        Ok(registry)
    }

    /// System prompt for `name`.
    pub fn get(&self, name: &str) -> Result<&str, ChatError> {
        self.personas
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.system_prompt.as_str())
            .ok_or_else(|| ChatError::UnknownPersona(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.personas.iter().any(|p| p.name == name)
    }

    /// Persona names, built-ins first.
    pub fn names(&self) -> Vec<&str> {
        self.personas.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn default_persona(&self) -> &str {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Tests
// =============================================================================
