//! Tipos de erro para o cliente do backend de avaliações.
//!
//! Define [`BackendError`] com variantes para respostas HTTP de erro,
//! falhas de rede e URLs inválidas. Usa `thiserror` para derivar `Display`
//! e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao conversar com o backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// O backend respondeu com status de erro (4xx/5xx).
    /// Contém o código HTTP e o corpo da resposta.
    #[error("backend error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout) ou
    /// corpo de resposta que não pôde ser decodificado.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A URL base configurada não aceita segmentos de caminho.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// `true` para 404, usado pela consulta de resolução de etapas.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Status { status: 404, .. })
    }
}
