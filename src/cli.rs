//! Interface de linha de comando do etapa baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (start, status, pending)
//! e flags globais (--api-url, --buffer-dir, --offline, --verbose). Também
//! interpreta as linhas digitadas durante uma sessão interativa ([`Input`]).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// etapa: conduz candidatos pelas etapas de um teste de avaliação.
#[derive(Debug, Parser)]
#[command(name = "etapa", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base do backend (sobrepõe etapa.toml e ETAPA_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Diretório do buffer local de respostas.
    #[arg(long, global = true)]
    pub buffer_dir: Option<PathBuf>,

    /// Começa considerando a rede indisponível.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia (ou retoma) a sessão interativa de um candidato.
    Start {
        /// Identificador do candidato.
        #[arg(long)]
        candidate: String,

        /// Etapa de entrada (UUID canônico ou referência a resolver).
        #[arg(long)]
        stage: String,
    },

    /// Mostra a posição de uma etapa no teste do candidato.
    Status {
        #[arg(long)]
        candidate: String,

        #[arg(long)]
        stage: String,
    },

    /// Lista as etapas com respostas ainda não enviadas.
    Pending {
        #[arg(long)]
        candidate: String,

        /// Reenvia as respostas pendentes ao backend.
        #[arg(long, default_value_t = false)]
        flush: bool,
    },
}

/// Uma linha digitada durante a sessão interativa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `<questão> <opção>`, ambos começando em 1.
    Answer { question: usize, option: usize },
    /// `p` ou `prosseguir`.
    Proceed,
    /// `:online` / `:offline`, o sinal de rede do terminal.
    Network(bool),
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "p" | "prosseguir" | "next" => return Input::Proceed,
            ":online" => return Input::Network(true),
            ":offline" => return Input::Network(false),
            "?" | "h" | "ajuda" => return Input::Help,
            "q" | "sair" | "quit" => return Input::Quit,
            _ => {}
        }

        let mut parts = line.split_whitespace();
        let answer = match (parts.next(), parts.next(), parts.next()) {
            (Some(q), Some(o), None) => q.parse::<usize>().ok().zip(o.parse::<usize>().ok()),
            _ => None,
        };
        match answer {
            Some((question, option)) if question > 0 && option > 0 => {
                Input::Answer { question, option }
            }
            _ => Input::Unknown(line.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_start_subcommand() {
        let cli = Cli::parse_from(["etapa", "start", "--candidate", "42", "--stage", "logica"]);
        match cli.command {
            Command::Start { candidate, stage } => {
                assert_eq!(candidate, "42");
                assert_eq!(stage, "logica");
            }
            _ => panic!("expected Start command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "etapa",
            "--api-url",
            "http://backend:9000",
            "--offline",
            "--verbose",
            "pending",
            "--candidate",
            "42",
            "--flush",
        ]);
        assert!(cli.verbose);
        assert!(cli.offline);
        assert_eq!(cli.api_url.as_deref(), Some("http://backend:9000"));
        assert!(matches!(cli.command, Command::Pending { flush: true, .. }));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn input_parses_answers() {
        assert_eq!(Input::parse("2 3"), Input::Answer { question: 2, option: 3 });
        assert_eq!(Input::parse("  1   1 "), Input::Answer { question: 1, option: 1 });
    }

    #[test]
    fn input_rejects_zero_and_extra_tokens() {
        assert!(matches!(Input::parse("0 1"), Input::Unknown(_)));
        assert!(matches!(Input::parse("1 2 3"), Input::Unknown(_)));
        assert!(matches!(Input::parse("a b"), Input::Unknown(_)));
    }

    #[test]
    fn input_parses_commands() {
        assert_eq!(Input::parse("P"), Input::Proceed);
        assert_eq!(Input::parse(":offline"), Input::Network(false));
        assert_eq!(Input::parse(":online"), Input::Network(true));
        assert_eq!(Input::parse("sair"), Input::Quit);
        assert_eq!(Input::parse("?"), Input::Help);
    }
}
