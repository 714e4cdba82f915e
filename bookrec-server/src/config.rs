//! Server configuration, read from `BOOKREC_*` environment variables.

use std::env;
use std::path::PathBuf;

use bookrec_core::stop_words;
use bookrec_core::{RowNorm, TfidfConfig};

use crate::error::{ServerError, ServerResult};

/// Which built-in stop word list the vectorizer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWordsChoice {
    Russian,
    English,
    None,
}

impl StopWordsChoice {
    fn parse(value: &str) -> ServerResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "russian" | "ru" => Ok(StopWordsChoice::Russian),
            "english" | "en" => Ok(StopWordsChoice::English),
            "none" | "" => Ok(StopWordsChoice::None),
            other => Err(ServerError::Config(format!("unknown stop word list '{}'", other))),
        }
    }

    pub fn tfidf_config(self) -> TfidfConfig {
        match self {
            StopWordsChoice::Russian => TfidfConfig::with_stop_words(stop_words::RUSSIAN),
            StopWordsChoice::English => TfidfConfig::with_stop_words(stop_words::ENGLISH),
            StopWordsChoice::None => TfidfConfig::with_stop_words(Vec::<String>::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the catalog file and, by default, the model file.
    pub data_path: PathBuf,
    /// Model file location; relative paths resolve against `data_path`.
    pub model_file: PathBuf,
    pub stop_words: StopWordsChoice,
    pub smooth_idf: bool,
    pub row_norm: RowNorm,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_path: PathBuf::from("./bookrec_data"),
            model_file: PathBuf::from("tfidf_model.bkrv"),
            stop_words: StopWordsChoice::Russian,
            smooth_idf: true,
            row_norm: RowNorm::L2,
        }
    }
}

impl ServerConfig {
    /// Starts from `Default` and overrides whatever `BOOKREC_*` variables are set.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let mut config = ServerConfig::default();
        if let Some(host) = lookup("BOOKREC_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("BOOKREC_PORT") {
            config.port = port
                .parse()
                .map_err(|e| ServerError::Config(format!("BOOKREC_PORT '{}' is not a port: {}", port, e)))?;
        }
        if let Some(path) = lookup("BOOKREC_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }
        if let Some(file) = lookup("BOOKREC_MODEL_FILE") {
            config.model_file = PathBuf::from(file);
        }
        if let Some(choice) = lookup("BOOKREC_STOP_WORDS") {
            config.stop_words = StopWordsChoice::parse(&choice)?;
        }
        if let Some(smooth) = lookup("BOOKREC_SMOOTH_IDF") {
            config.smooth_idf = parse_bool("BOOKREC_SMOOTH_IDF", &smooth)?;
        }
        if let Some(norm) = lookup("BOOKREC_ROW_NORM") {
            config.row_norm = match norm.trim().to_ascii_lowercase().as_str() {
                "l2" => RowNorm::L2,
                "none" => RowNorm::None,
                other => return Err(ServerError::Config(format!("BOOKREC_ROW_NORM '{}' is not l2 or none", other))),
            };
        }
        Ok(config)
    }

    /// Vectorizer settings for the recommender.
    pub fn tfidf_config(&self) -> TfidfConfig {
        let mut tfidf = self.stop_words.tfidf_config();
        tfidf.smooth_idf = self.smooth_idf;
        tfidf.norm = self.row_norm;
        tfidf
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_path.join("catalog.json")
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_path.join(&self.model_file)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(key: &str, value: &str) -> ServerResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ServerError::Config(format!("{} '{}' is not a boolean", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.stop_words, StopWordsChoice::Russian);
        assert_eq!(config.model_path(), PathBuf::from("./bookrec_data/tfidf_model.bkrv"));
        let tfidf = config.tfidf_config();
        assert!(tfidf.smooth_idf);
        assert_eq!(tfidf.norm, RowNorm::L2);
    }

    #[test]
    fn test_weighting_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BOOKREC_SMOOTH_IDF", "false"),
            ("BOOKREC_ROW_NORM", "None"),
            ("BOOKREC_STOP_WORDS", "none"),
        ]))
        .unwrap();
        let tfidf = config.tfidf_config();
        assert!(!tfidf.smooth_idf);
        assert_eq!(tfidf.norm, RowNorm::None);
        assert!(tfidf.stop_words.is_empty());
        assert!(tfidf.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BOOKREC_PORT", "8081"),
            ("BOOKREC_DATA_PATH", "/var/lib/bookrec"),
            ("BOOKREC_MODEL_FILE", "/models/m.bkrv"),
            ("BOOKREC_STOP_WORDS", "English"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.catalog_path(), PathBuf::from("/var/lib/bookrec/catalog.json"));
        // Absolute model paths are kept as-is by Path::join.
        assert_eq!(config.model_path(), PathBuf::from("/models/m.bkrv"));
        assert_eq!(config.stop_words, StopWordsChoice::English);
        assert!(config.stop_words.tfidf_config().stop_words.iter().any(|w| w == "the"));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup_from(&[("BOOKREC_PORT", "http")])),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup_from(&[("BOOKREC_STOP_WORDS", "klingon")])),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup_from(&[("BOOKREC_SMOOTH_IDF", "maybe")])),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup_from(&[("BOOKREC_ROW_NORM", "l1")])),
            Err(ServerError::Config(_))
        ));
    }
}
