use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::budget::BudgetStrategy;

/// Model the conversation client targets.
///
/// Chat engines go to `/chat/completions`; everything else, including unknown
/// names, is treated as a legacy text engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Engine {
    #[default]
    Gpt35Turbo,
    Gpt35Turbo0301,
    TextDavinci003,
    TextDavinci002,
    TextDavinci001,
    TextCurie001,
    TextBabbage001,
    TextAda001,
    Davinci,
    Curie,
    Babbage,
    Ada,
    Other(String),
}

impl Engine {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt35Turbo0301 => "gpt-3.5-turbo-0301",
            Self::TextDavinci003 => "text-davinci-003",
            Self::TextDavinci002 => "text-davinci-002",
            Self::TextDavinci001 => "text-davinci-001",
            Self::TextCurie001 => "text-curie-001",
            Self::TextBabbage001 => "text-babbage-001",
            Self::TextAda001 => "text-ada-001",
            Self::Davinci => "davinci",
            Self::Curie => "curie",
            Self::Babbage => "babbage",
            Self::Ada => "ada",
            Self::Other(name) => name,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, Self::Gpt35Turbo | Self::Gpt35Turbo0301)
    }

    /// Chat engines drop whole turns; text engines clip the boundary turn.
    pub fn default_strategy(&self) -> BudgetStrategy {
        if self.is_chat() {
            BudgetStrategy::WholeTurn
        } else {
            BudgetStrategy::PartialClip
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let engine = match value {
            "gpt-3.5-turbo" => Self::Gpt35Turbo,
            "gpt-3.5-turbo-0301" => Self::Gpt35Turbo0301,
            "text-davinci-003" => Self::TextDavinci003,
            "text-davinci-002" => Self::TextDavinci002,
            "text-davinci-001" => Self::TextDavinci001,
            "text-curie-001" => Self::TextCurie001,
            "text-babbage-001" => Self::TextBabbage001,
            "text-ada-001" => Self::TextAda001,
            "davinci" => Self::Davinci,
            "curie" => Self::Curie,
            "babbage" => Self::Babbage,
            "ada" => Self::Ada,
            other => Self::Other(other.to_owned()),
        };
        Ok(engine)
    }
}

impl From<&str> for Engine {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(engine) => engine,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Engine;
    use crate::budget::BudgetStrategy;

    #[test]
    fn known_names_round_trip() {
        for name in ["gpt-3.5-turbo", "gpt-3.5-turbo-0301", "text-davinci-003", "ada"] {
            assert_eq!(Engine::from(name).as_str(), name);
        }
        assert!(!matches!(Engine::from("davinci"), Engine::Other(_)));
    }

    #[test]
    fn unknown_names_are_legacy_text_engines() {
        let engine = Engine::from("my-finetune");
        assert_eq!(engine, Engine::Other("my-finetune".to_owned()));
        assert!(!engine.is_chat());
        assert_eq!(engine.default_strategy(), BudgetStrategy::PartialClip);
    }

    #[test]
    fn chat_engines_drop_whole_turns() {
        assert!(Engine::default().is_chat());
        assert_eq!(
            Engine::Gpt35Turbo0301.default_strategy(),
            BudgetStrategy::WholeTurn
        );
    }
}
