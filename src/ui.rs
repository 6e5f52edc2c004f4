//! Interface de terminal do etapa: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners durante chamadas ao backend e
//! `console` para estilização com cores. O [`SessionView`] apresenta a etapa
//! atual, o cronômetro e os avisos da sessão.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use etapa::SessionError;
use etapa::backend::Question;
use etapa::buffer::AnswerSheet;
use etapa::connectivity::ConnectivityEdge;
use etapa::session::{FlushReport, Warning};
use etapa::stage::{NavigationState, StageId};

/// Spinner exibido enquanto uma chamada remota está em andamento.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}

/// Formata segundos restantes como `mm:ss` (ou `h:mm:ss`).
pub fn format_remaining(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Apresentação de uma sessão interativa no terminal.
pub struct SessionView {
    // Verde para sucesso.
    green: Style,
    // Vermelho para erros bloqueantes e tempo esgotado.
    red: Style,
    // Amarelo para avisos não bloqueantes.
    yellow: Style,
    // Ciano para cabeçalhos.
    cyan: Style,
    dim: Style,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }
}

impl SessionView {
    /// Cabeçalho com a posição da etapa e o tempo restante.
    pub fn stage(&self, stage: &StageId, nav: &NavigationState, remaining: Option<u64>) {
        println!();
        println!(
            "{}",
            self.cyan
                .apply_to(format!("─── Etapa {} de {} ───", nav.position(), nav.total_stages))
        );
        println!("{}", self.dim.apply_to(stage.to_string()));
        match remaining {
            Some(0) => println!("  {}", self.red.apply_to("⏱ tempo esgotado")),
            Some(secs) => println!("  ⏱ {}", format_remaining(secs)),
            None => {}
        }
    }

    /// Lista as questões, marcando a opção já escolhida.
    pub fn questions(&self, questions: &[Question], answers: &AnswerSheet) {
        for (qi, question) in questions.iter().enumerate() {
            let chosen = answers.get(&question.id);
            let mark = if chosen.is_some() {
                self.green.apply_to("✓").to_string()
            } else {
                " ".to_string()
            };
            println!("{mark} {}. {}", qi + 1, question.text);
            for (oi, option) in question.options.iter().enumerate() {
                let line = format!("     {}) {}", oi + 1, option.text);
                if chosen == Some(&option.id) {
                    println!("{}", self.green.apply_to(line));
                } else {
                    println!("{line}");
                }
            }
        }
    }

    pub fn prompt(&self, unanswered: usize) {
        println!(
            "{}",
            self.dim.apply_to(format!(
                "[{unanswered} sem resposta] <questão> <opção> · p prosseguir · ? ajuda"
            ))
        );
    }

    pub fn help(&self) {
        println!("  <questão> <opção>   responde (ex.: 2 3)");
        println!("  p                   valida, envia e avança");
        println!("  :offline / :online  informa mudança de rede");
        println!("  q                   sai (respostas ficam no buffer local)");
    }

    pub fn warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            println!("  {} {warning}", self.yellow.apply_to("!"));
        }
    }

    pub fn error(&self, err: &SessionError) {
        println!(
            "  {} {err} ({})",
            self.red.apply_to("✗"),
            err.class()
        );
    }

    pub fn invalid_input(&self, line: &str) {
        println!("  {} entrada não reconhecida: {line:?}", self.yellow.apply_to("?"));
    }

    pub fn connectivity(&self, edge: ConnectivityEdge) {
        let text = match edge {
            ConnectivityEdge::WentOnline => self.green.apply_to("conexão restabelecida"),
            ConnectivityEdge::WentOffline => {
                self.yellow.apply_to("sem conexão: respostas serão guardadas localmente")
            }
        };
        println!("  {text}");
    }

    pub fn expired(&self) {
        println!(
            "  {}",
            self.red
                .apply_to("⏱ O tempo do teste acabou. Conclua e envie suas respostas.")
        );
    }

    pub fn completed(&self) {
        println!("  {} Teste concluído. Obrigado!", self.green.apply_to("✓"));
    }

    pub fn saved_locally(&self) {
        println!("  Respostas em andamento guardadas no buffer local.");
    }

    pub fn navigation(&self, stage: &StageId, nav: &NavigationState) {
        let next = nav
            .next_stage
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "—".to_string());
        println!("{}", self.cyan.apply_to(format!("Etapa {stage}")));
        println!("  posição:        {} de {}", nav.position(), nav.total_stages);
        println!("  última etapa:   {}", if nav.is_last() { "sim" } else { "não" });
        println!("  próxima etapa:  {next}");
    }

    pub fn pending(&self, stages: &[StageId]) {
        if stages.is_empty() {
            println!("  {} nenhuma resposta pendente", self.green.apply_to("✓"));
            return;
        }
        for stage in stages {
            println!("  {} {stage}", self.yellow.apply_to("•"));
        }
    }

    pub fn flush_report(&self, report: &FlushReport) {
        for stage in &report.flushed {
            println!("  {} {stage} enviada", self.green.apply_to("✓"));
        }
        for (stage, reason) in &report.failed {
            println!("  {} {stage}: {reason}", self.red.apply_to("✗"));
        }
        for (stage, reason) in &report.unreadable {
            println!("  {} {stage} ilegível: {reason}", self.yellow.apply_to("!"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_remaining_minutes() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(65), "01:05");
        assert_eq!(format_remaining(3599), "59:59");
    }

    #[test]
    fn format_remaining_hours() {
        assert_eq!(format_remaining(3600), "1:00:00");
        assert_eq!(format_remaining(5430), "1:30:30");
    }
}
