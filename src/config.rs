use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DEFAULT_COMPILE_TIMEOUT_MS, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIME_LIMIT_MS};
use crate::core::{
    domain::{CommandLine, Language, Limits},
    registry::{LanguageRegistry, RegistryError},
    workspace::Workspaces,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid toml content in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Language `{language}` has an empty {stage} command")]
    EmptyCommand {
        language: String,
        stage: &'static str,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("`{0}` must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Judge configuration, read from a TOML file.
///
/// ```toml
/// workspace_root = "/var/tmp/codejudge"
/// max_output_bytes = 1048576
/// default_time_limit_ms = 2000
/// compile_timeout_ms = 12000
///
/// [languages.cpp]
/// source_file = "main.cpp"
/// compile = ["g++", "main.cpp", "-O2", "-std=c++17", "-o", "main"]
/// run = ["./main"]
/// compile_timeout_ms = 20000
///
/// [languages.py]
/// source_file = "main.py"
/// run = "python3 main.py"
/// ```
///
/// Without a `languages` table the built-in languages are used.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    pub workspace_root: PathBuf,
    pub max_output_bytes: usize,
    pub default_time_limit_ms: u64,
    pub compile_timeout_ms: u64,
    pub languages: Option<BTreeMap<String, LanguageConfig>>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            default_time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
            languages: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    pub source_file: String,
    #[serde(default)]
    pub compile: Option<CommandSpec>,
    pub run: CommandSpec,
    #[serde(default)]
    pub compile_timeout_ms: Option<u64>,
}

/// Either an argument list or a whitespace-separated command string.
/// Only the list form can express arguments that contain spaces.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Argv(Vec<String>),
    Line(String),
}

impl CommandSpec {
    fn to_command_line(&self) -> Option<CommandLine> {
        match self {
            CommandSpec::Argv(argv) => CommandLine::from_argv(argv),
            CommandSpec::Line(line) => CommandLine::parse(line),
        }
    }
}

impl JudgeConfig {
    /// Reads `path` if given, otherwise falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn limits(&self) -> Result<Limits, ConfigError> {
        if self.max_output_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_output_bytes"));
        }
        if self.default_time_limit_ms == 0 {
            return Err(ConfigError::ZeroLimit("default_time_limit_ms"));
        }
        if self.compile_timeout_ms == 0 {
            return Err(ConfigError::ZeroLimit("compile_timeout_ms"));
        }

        Ok(Limits {
            default_time_limit: Duration::from_millis(self.default_time_limit_ms),
            compile_timeout: Duration::from_millis(self.compile_timeout_ms),
            max_output_bytes: self.max_output_bytes,
        })
    }

    pub fn registry(&self) -> Result<LanguageRegistry, ConfigError> {
        let Some(languages) = &self.languages else {
            return Ok(LanguageRegistry::builtin());
        };

        let languages = languages
            .iter()
            .map(|(id, config)| config.to_language(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LanguageRegistry::new(languages)?)
    }

    pub fn workspaces(&self) -> Workspaces {
        Workspaces::new(&self.workspace_root)
    }
}

impl LanguageConfig {
    fn to_language(&self, id: &str) -> Result<Language, ConfigError> {
        let empty_command = |stage| ConfigError::EmptyCommand {
            language: id.to_string(),
            stage,
        };

        let run = self.run.to_command_line().ok_or_else(|| empty_command("run"))?;
        let compile = match &self.compile {
            Some(spec) => Some(spec.to_command_line().ok_or_else(|| empty_command("compile"))?),
            None => None,
        };
        if self.compile_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroLimit("compile_timeout_ms"));
        }

        Ok(Language {
            id: id.to_string(),
            source_file: self.source_file.clone(),
            compile,
            run,
            compile_timeout: self.compile_timeout_ms.map(Duration::from_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> JudgeConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");

        assert_eq!(config.workspace_root, std::env::temp_dir());
        assert_eq!(config.limits().unwrap(), Limits::default());
        assert_eq!(config.registry().unwrap().len(), 3);
    }

    #[test]
    fn test_limits_override() {
        let config = parse(
            r#"
            workspace_root = "/srv/judge"
            max_output_bytes = 4096
            default_time_limit_ms = 500
            compile_timeout_ms = 30000
            "#,
        );

        assert_eq!(config.workspaces().root(), Path::new("/srv/judge"));
        assert_eq!(
            config.limits().unwrap(),
            Limits {
                default_time_limit: Duration::from_millis(500),
                compile_timeout: Duration::from_secs(30),
                max_output_bytes: 4096,
            }
        );
    }

    #[test]
    fn test_languages_in_both_command_forms() {
        let config = parse(
            r#"
            [languages.cpp]
            source_file = "main.cpp"
            compile = ["g++", "main.cpp", "-O2", "-o", "main"]
            run = ["./main"]
            compile_timeout_ms = 20000

            [languages.py]
            source_file = "main.py"
            run = "python3  main.py"
            "#,
        );
        let registry = config.registry().unwrap();

        let cpp = registry.resolve("cpp").unwrap();
        assert_eq!(
            cpp.compile,
            Some(CommandLine::new("g++", ["main.cpp", "-O2", "-o", "main"]))
        );
        assert_eq!(cpp.run, CommandLine::new("./main", Vec::<String>::new()));
        assert_eq!(cpp.compile_timeout, Some(Duration::from_secs(20)));

        let py = registry.resolve("py").unwrap();
        assert_eq!(py.compile, None);
        assert_eq!(py.run, CommandLine::new("python3", ["main.py"]));
        assert_eq!(py.compile_timeout, None);

        assert!(registry.resolve("js").is_err());
    }

    #[test]
    fn test_empty_command_is_rejected() {
        for run in [r#""  ""#, "[]"] {
            let config = parse(&format!(
                "[languages.x]\nsource_file = \"main.x\"\nrun = {}\n",
                run
            ));

            assert!(matches!(
                config.registry(),
                Err(ConfigError::EmptyCommand { stage: "run", .. })
            ));
        }
    }

    #[test]
    fn test_source_file_outside_workspace_is_rejected() {
        let config = parse(
            r#"
            [languages.sh]
            source_file = "../escape.sh"
            run = ["sh", "../escape.sh"]
            "#,
        );

        assert!(matches!(
            config.registry(),
            Err(ConfigError::Registry(RegistryError::InvalidSourceFile { .. }))
        ));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        for content in [
            "max_output_bytes = 0",
            "default_time_limit_ms = 0",
            "compile_timeout_ms = 0",
        ] {
            assert!(matches!(
                parse(content).limits(),
                Err(ConfigError::ZeroLimit(_))
            ));
        }
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<JudgeConfig>("max_output = 10").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judge.toml");
        std::fs::write(&path, "default_time_limit_ms = 1000\n").unwrap();

        let config = JudgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.default_time_limit_ms, 1000);

        assert!(matches!(
            JudgeConfig::load(Some(&dir.path().join("missing.toml"))),
            Err(ConfigError::Read { .. })
        ));

        std::fs::write(&path, "default_time_limit_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            JudgeConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
