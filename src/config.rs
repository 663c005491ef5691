//! Conversation options and their environment overrides.

use std::env;

use crate::budget::{BudgetStrategy, ContextBudget, DEFAULT_CONTEXT_BUDGET};
use crate::engine::Engine;

pub const DEFAULT_MAX_TOKENS: u32 = 256;

pub const ENV_MODEL: &str = "GPT_CLIENT_MODEL";
pub const ENV_SYSTEM_PROMPT: &str = "GPT_CLIENT_SYSTEM_PROMPT";
pub const ENV_MAX_TOKENS: &str = "GPT_CLIENT_MAX_TOKENS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub engine: Engine,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub system_prompt: String,
    pub temperature: Option<f64>,
    /// Character budget for the system prompt plus retained turns.
    pub context_budget: usize,
    /// Overrides the engine's default strategy when set.
    pub strategy: Option<BudgetStrategy>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            stop: Vec::new(),
            system_prompt: String::new(),
            temperature: None,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            strategy: None,
        }
    }
}

impl ClientOptions {
    /// Defaults overlaid with `GPT_CLIENT_*` variables. Unparseable values are
    /// ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(model) = env_string_opt(ENV_MODEL) {
            options.engine = Engine::from(model.as_str());
        }
        if let Some(prompt) = env_string_opt(ENV_SYSTEM_PROMPT) {
            options.system_prompt = prompt;
        }
        if let Some(max_tokens) = env_string_opt(ENV_MAX_TOKENS).and_then(|value| value.trim().parse().ok()) {
            options.max_tokens = max_tokens;
        }
        options
    }

    pub fn with_engine(mut self, engine: impl Into<Engine>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn with_strategy(mut self, strategy: BudgetStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn budget(&self) -> ContextBudget {
        ContextBudget::new(
            self.context_budget,
            self.strategy
                .unwrap_or_else(|| self.engine.default_strategy()),
        )
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{ClientOptions, ENV_MAX_TOKENS, ENV_MODEL, ENV_SYSTEM_PROMPT};
    use crate::budget::{BudgetStrategy, DEFAULT_CONTEXT_BUDGET};
    use crate::engine::Engine;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults_apply_when_unset() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_MODEL, None);
        let _g2 = set_env_guard(ENV_SYSTEM_PROMPT, None);
        let _g3 = set_env_guard(ENV_MAX_TOKENS, None);

        let options = ClientOptions::from_env();
        assert_eq!(options, ClientOptions::default());
        assert_eq!(options.engine, Engine::Gpt35Turbo);
        assert_eq!(options.max_tokens, 256);
        assert_eq!(options.context_budget, DEFAULT_CONTEXT_BUDGET);
    }

    #[test]
    fn env_values_override_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_MODEL, Some("text-davinci-003"));
        let _g2 = set_env_guard(ENV_SYSTEM_PROMPT, Some("You are terse."));
        let _g3 = set_env_guard(ENV_MAX_TOKENS, Some("512"));

        let options = ClientOptions::from_env();
        assert_eq!(options.engine, Engine::TextDavinci003);
        assert_eq!(options.system_prompt, "You are terse.");
        assert_eq!(options.max_tokens, 512);
        assert_eq!(options.budget().strategy(), BudgetStrategy::PartialClip);
    }

    #[test]
    fn unparseable_max_tokens_is_ignored() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_MAX_TOKENS, Some("lots"));
        assert_eq!(ClientOptions::from_env().max_tokens, 256);
    }

    #[test]
    fn explicit_strategy_overrides_engine_default() {
        let options = ClientOptions::default().with_strategy(BudgetStrategy::PartialClip);
        assert_eq!(options.budget().strategy(), BudgetStrategy::PartialClip);
    }
}
