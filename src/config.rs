//! Configuração do etapa carregada a partir de `etapa.toml`.
//!
//! A struct [`EtapaConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `ETAPA_API_URL` tem precedência sobre o arquivo.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EtapaError;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "etapa.toml";

/// Variável de ambiente que sobrepõe `api_base_url`.
pub const API_URL_ENV: &str = "ETAPA_API_URL";

/// Configuração de nível superior carregada de `etapa.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EtapaConfig {
    /// URL base da API do backend de avaliações.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Diretório onde o buffer local de respostas é gravado.
    #[serde(default = "default_buffer_dir")]
    pub buffer_dir: PathBuf,

    /// Timeout de conexão em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout total de cada requisição em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Intervalo de atualização do cronômetro em milissegundos. Não altera
    /// o ritmo da contagem, que segue o relógio.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

// Valor padrão para a URL do backend: servidor local.
fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

// Valor padrão para o buffer: `.etapa/buffer` no diretório atual.
fn default_buffer_dir() -> PathBuf {
    PathBuf::from(".etapa").join("buffer")
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

// Um tique por segundo.
fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for EtapaConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            buffer_dir: default_buffer_dir(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl EtapaConfig {
    /// Carrega a configuração de `etapa.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, EtapaError> {
        let config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.with_env_url(std::env::var(API_URL_ENV).ok()).validated()
    }

    /// Lê um arquivo específico; ausência do arquivo resulta nos defaults.
    pub fn load_from(path: &Path) -> Result<Self, EtapaError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<EtapaConfig>(&contents)?)
    }

    /// Aplica o valor da variável de ambiente, se presente e não vazio.
    pub fn with_env_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url
            && !url.trim().is_empty()
        {
            self.api_base_url = url;
        }
        self
    }

    /// Rejeita combinações que tornariam o motor inutilizável.
    pub fn validated(self) -> Result<Self, EtapaError> {
        if self.api_base_url.trim().is_empty() {
            return Err(EtapaError::Config("api_base_url must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(EtapaError::Config("tick_interval_ms must be positive".into()));
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = EtapaConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.buffer_dir, PathBuf::from(".etapa/buffer"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_base_url = "https://rh.example.com/api"
            tick_interval_ms = 500
        "#;
        let config: EtapaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "https://rh.example.com/api");
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EtapaConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.tick_interval_ms, 1000);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "buffer_dir = \"/tmp/etapa-buffer\"\n").unwrap();
        let config = EtapaConfig::load_from(&path).unwrap();
        assert_eq!(config.buffer_dir, PathBuf::from("/tmp/etapa-buffer"));
    }

    #[test]
    fn load_from_reports_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "tick_interval_ms = \"fast\"").unwrap();
        assert!(matches!(
            EtapaConfig::load_from(&path),
            Err(EtapaError::Toml(_))
        ));
    }

    #[test]
    fn env_url_overrides_file() {
        let config = EtapaConfig::default().with_env_url(Some("http://backend:9000".into()));
        assert_eq!(config.api_base_url, "http://backend:9000");
    }

    #[test]
    fn blank_env_url_is_ignored() {
        let config = EtapaConfig::default().with_env_url(Some("  ".into()));
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = EtapaConfig {
            tick_interval_ms: 0,
            ..EtapaConfig::default()
        };
        assert!(matches!(config.validated(), Err(EtapaError::Config(_))));
    }
}
