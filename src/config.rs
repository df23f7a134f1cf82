//! Configuração da travessia, opcionalmente carregada de `fsee.toml`.
//!
//! A struct [`TraverseConfig`] contém todos os parâmetros que o engine consome.
//! Valores não presentes no arquivo usam defaults sensíveis; flags da CLI
//! sobrescrevem o arquivo.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FseeError};

/// Parâmetros de uma travessia.
#[derive(Debug, Clone, Deserialize)]
pub struct TraverseConfig {
    /// Diretório raiz a ser percorrido.
    #[serde(default)]
    pub path: PathBuf,

    /// Nome relativo da última entrada arquivada numa execução anterior.
    #[serde(default)]
    pub marker: Option<String>,

    /// Lista explícita de nomes a reprocessar, no lugar da travessia do disco.
    #[serde(default)]
    pub names: Option<Vec<String>>,

    /// Máximo de entradas registradas; ao atingir, a descoberta para.
    #[serde(default = "default_max_done")]
    pub max_done: u64,

    /// Máximo de chamadas ao processador em andamento ao mesmo tempo.
    #[serde(default = "default_max_doing")]
    pub max_doing: usize,

    /// Máximo de entradas aguardando despacho.
    #[serde(default = "default_max_waiting")]
    pub max_waiting: usize,

    /// Máximo de falhas do processador; ao atingir, a execução é abortada.
    #[serde(default = "default_max_errors")]
    pub max_errors: u64,

    /// Retentativas por entrada antes de ignorá-la.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Oferece cada diretório antes dos seus filhos.
    #[serde(default)]
    pub directory_first: bool,
}

fn default_max_done() -> u64 {
    u64::MAX
}

// Valor padrão de concorrência: 100.
fn default_max_doing() -> usize {
    100
}

fn default_max_waiting() -> usize {
    10_000
}

fn default_max_errors() -> u64 {
    u64::MAX
}

// Valor padrão para retentativas: 3.
fn default_retry() -> u32 {
    3
}

impl Default for TraverseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            marker: None,
            names: None,
            max_done: default_max_done(),
            max_doing: default_max_doing(),
            max_waiting: default_max_waiting(),
            max_errors: default_max_errors(),
            retry: default_retry(),
            directory_first: false,
        }
    }
}

impl TraverseConfig {
    /// Configuração padrão com a raiz informada.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Carrega a configuração do arquivo indicado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: &Path) -> Result<Self, FseeError> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TraverseConfig>(&contents)?
        } else {
            Self::default()
        };
        Ok(config)
    }

    /// Rejeita combinações que impediriam a travessia de progredir.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath);
        }
        if self.max_doing == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_doing" });
        }
        if self.max_waiting == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_waiting",
            });
        }
        if let Some(marker) = &self.marker {
            validate_marker(marker)?;
        }
        Ok(())
    }
}

fn validate_marker(marker: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidMarker {
        marker: marker.to_string(),
        reason,
    };
    if marker.is_empty() {
        return Err(invalid("empty"));
    }
    if marker.starts_with('/') {
        return Err(invalid("must be relative to the traversal root"));
    }
    if marker.split('/').any(str::is_empty) {
        return Err(invalid("contains an empty segment"));
    }
    Ok(())
}
