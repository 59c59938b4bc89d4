use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

use crate::core::{
    domain::{CommandLine, Language},
    errors::JudgeError,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Language `{0}` is registered more than once")]
    DuplicateLanguage(String),
    #[error("Language `{language}` has an invalid source file name `{source_file}`")]
    InvalidSourceFile {
        language: String,
        source_file: String,
    },
}

/// Static mapping from a language id to its toolchain commands.
#[derive(Clone, Debug)]
pub struct LanguageRegistry {
    languages: HashMap<String, Language>,
}

impl LanguageRegistry {
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Result<Self, RegistryError> {
        let mut registry = HashMap::new();

        for language in languages {
            if !is_plain_file_name(&language.source_file) {
                return Err(RegistryError::InvalidSourceFile {
                    language: language.id,
                    source_file: language.source_file,
                });
            }
            if registry.contains_key(&language.id) {
                return Err(RegistryError::DuplicateLanguage(language.id));
            }
            registry.insert(language.id.clone(), language);
        }

        Ok(Self {
            languages: registry,
        })
    }

    pub fn builtin() -> Self {
        let languages = [
            Language::compiled(
                "cpp",
                "main.cpp",
                CommandLine::new("g++", ["main.cpp", "-O2", "-std=c++17", "-o", "main"]),
                CommandLine::new("./main", Vec::<String>::new()),
            ),
            Language::compiled(
                "java",
                "Main.java",
                CommandLine::new("javac", ["Main.java"]),
                CommandLine::new("java", ["Main"]),
            ),
            Language::interpreted("js", "main.js", CommandLine::new("node", ["main.js"])),
        ];

        Self {
            languages: languages
                .into_iter()
                .map(|language| (language.id.clone(), language))
                .collect(),
        }
    }

    pub fn resolve(&self, id: &str) -> Result<&Language, JudgeError> {
        self.languages
            .get(id)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(id.to_string()))
    }

    /// Languages ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        let mut languages: Vec<_> = self.languages.values().collect();
        languages.sort_by(|a, b| a.id.cmp(&b.id));
        languages.into_iter()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }
}

/// The source file must land directly inside the workspace.
fn is_plain_file_name(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .is_some_and(|file_name| file_name == OsStr::new(name))
}
