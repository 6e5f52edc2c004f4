//! Motor de progressão de sessões de avaliação por etapas.
//!
//! Conduz um candidato pelas etapas ordenadas de um teste: resolve
//! identificadores de etapa, calcula a navegação, guarda respostas num
//! buffer local durável, envia ao backend quando há conexão e finaliza a
//! sessão na última etapa.

pub mod backend;
pub mod buffer;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod session;
pub mod stage;
pub mod timebox;

pub use error::{ErrorClass, EtapaError, SessionError};
