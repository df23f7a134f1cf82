//! Interface de linha de comando do fsee baseada em clap.
//!
//! A struct [`Cli`] descreve a raiz, o processador e os limites da travessia.
//! Flags informadas aqui sobrescrevem os valores de `fsee.toml`.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::config::TraverseConfig;
use crate::processor::CommandProcessor;

/// fsee: processa cada entrada de uma árvore de diretórios, retomando de onde parou.
#[derive(Debug, Parser)]
#[command(name = "fsee", version, about)]
pub struct Cli {
    /// Diretório raiz a ser percorrido.
    #[arg(long)]
    pub path: PathBuf,

    /// Programa executado para cada entrada; argumentos extras vão após `--`.
    #[arg(long)]
    pub processor: String,

    /// Argumentos repassados ao processador (o caminho da entrada vem por último).
    #[arg(last = true)]
    pub processor_args: Vec<String>,

    /// Máximo de chamadas simultâneas ao processador.
    #[arg(long, visible_alias = "co")]
    pub concurrency: Option<usize>,

    /// Ignora o marcador salvo e recomeça do início.
    #[arg(long, conflicts_with = "fill")]
    pub start_over: bool,

    /// Reprocessa apenas as entradas ignoradas em execuções anteriores.
    #[arg(long)]
    pub fill: bool,

    /// Oferece cada diretório antes dos seus filhos.
    #[arg(long)]
    pub directory_first: bool,

    /// Para a descoberta depois de registrar N entradas.
    #[arg(long)]
    pub max_done: Option<u64>,

    /// Máximo de entradas aguardando despacho.
    #[arg(long)]
    pub max_waiting: Option<usize>,

    /// Aborta depois de N falhas do processador.
    #[arg(long)]
    pub max_errors: Option<u64>,

    /// Retentativas por entrada antes de ignorá-la.
    #[arg(long)]
    pub retry: Option<u32>,

    /// Arquivo de configuração opcional.
    #[arg(long, default_value = "fsee.toml")]
    pub config: PathBuf,

    /// Diretório onde as tarefas são guardadas (padrão: `$FSEE_HOME` ou `~/.fs-traverse`).
    #[arg(long)]
    pub home: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Aplica as flags da linha de comando sobre a configuração carregada.
    pub fn apply(&self, config: &mut TraverseConfig) {
        config.path = self.path.clone();
        if self.directory_first {
            config.directory_first = true;
        }
        if let Some(n) = self.concurrency {
            config.max_doing = n;
        }
        if let Some(n) = self.max_done {
            config.max_done = n;
        }
        if let Some(n) = self.max_waiting {
            config.max_waiting = n;
        }
        if let Some(n) = self.max_errors {
            config.max_errors = n;
        }
        if let Some(n) = self.retry {
            config.retry = n;
        }
    }

    pub fn command_processor(&self) -> CommandProcessor {
        CommandProcessor::new(
            &self.processor,
            self.processor_args.iter().map(OsString::from).collect(),
        )
    }
}
