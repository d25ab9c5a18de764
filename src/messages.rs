use std::env;

/// Language used for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Ja,
}

impl Locale {
    /// Pick the locale from the usual POSIX variables, first non-empty one wins.
    pub fn from_env() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .find(|value| !value.is_empty())
            .map(|value| Self::from_tag(&value))
            .unwrap_or(Locale::En)
    }

    /// `ja`, `ja_JP.UTF-8`, ... map to Japanese, everything else to English.
    pub fn from_tag(tag: &str) -> Self {
        if tag.to_ascii_lowercase().starts_with("ja") {
            Locale::Ja
        } else {
            Locale::En
        }
    }
}

/// "command not defined" message for the given raw input.
pub fn command_not_defined(locale: Locale, raw: &str) -> String {
    match locale {
        Locale::En => format!("command not defined: {}", raw),
        Locale::Ja => format!("コマンドが定義されていません: {}", raw),
    }
}
