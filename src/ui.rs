//! Interface de terminal do fsee: spinner com contadores e linhas coloridas.
//!
//! Usa `indicatif` para o spinner e `console` para as cores. O
//! [`RunProgress`] consome as notificações do engine e as mostra no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{RunOutcome, RunReport};
use crate::event::{Counters, Event};

/// Indicador visual de uma execução.
///
/// Entradas concluídas aparecem em verde, falhas em vermelho e retentativas
/// em amarelo; o spinner mostra os contadores e o marcador atual.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    counters: Counters,
    marker: Option<String>,
}

impl RunProgress {
    /// Inicia o spinner para a travessia de `root`.
    pub fn start(root: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("walking {root}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            counters: Counters::default(),
            marker: None,
        }
    }

    /// Mostra uma notificação e atualiza o spinner.
    pub fn event(&mut self, event: &Event) {
        match event {
            Event::Done { .. } => self.counters.done += 1,
            Event::Ignored { .. } => self.counters.ignored += 1,
            Event::Skipped { .. } => self.counters.skipped += 1,
            Event::Warning { .. } | Event::Error { .. } => self.counters.errors += 1,
            Event::MoveOn { marker } => self.marker = Some(marker.clone()),
            Event::End(counters) => self.counters = *counters,
            Event::NoUtf8Name { .. } => {}
        }
        if let Some(line) = self.line(event) {
            self.pb.println(line);
        }
        self.pb.set_message(self.summary());
    }

    /// Finaliza o spinner e exibe o resultado da execução.
    pub fn finish(&self, report: &RunReport) {
        self.pb.finish_and_clear();
        let c = &report.counters;
        let totals = format!(
            "{} done, {} ignored, {} errors of {} registered",
            c.done, c.ignored, c.errors, c.registered
        );
        match report.outcome {
            RunOutcome::Exhausted => {
                println!("  {} Finished: {totals}", self.green.apply_to("✓"));
            }
            RunOutcome::Stopped => {
                println!("  {} Stopped: {totals}", self.yellow.apply_to("■"));
            }
            RunOutcome::Aborted => {
                println!("  {} Aborted: {totals}", self.red.apply_to("✗"));
            }
        }
        if let Some(marker) = &report.marker {
            println!("  {} {marker}", self.dim.apply_to("marker:"));
        }
    }

    fn line(&self, event: &Event) -> Option<String> {
        let line = match event {
            Event::Done { name } => format!("{} {name}", self.green.apply_to("[ DONE    ]")),
            Event::Ignored { name } => format!("{} {name}", self.red.apply_to("[ IGNORED ]")),
            Event::Skipped { name } => format!("{} {name}", self.dim.apply_to("[ SKIPPED ]")),
            Event::Warning { name, error } => {
                format!("{} {name}: {error}", self.yellow.apply_to("[ RETRY   ]"))
            }
            Event::Error { name, error } => {
                format!("{} {name}: {error}", self.red.apply_to("[ ERROR   ]"))
            }
            Event::NoUtf8Name { dirname, raw } => format!(
                "{} {dirname}/{}",
                self.yellow.apply_to("[ NO-UTF8 ]"),
                String::from_utf8_lossy(raw)
            ),
            Event::MoveOn { .. } | Event::End(_) => return None,
        };
        Some(line)
    }

    fn summary(&self) -> String {
        let c = &self.counters;
        let mut msg = format!(
            "done {} · ignored {} · errors {}",
            c.done, c.ignored, c.errors
        );
        if let Some(marker) = &self.marker {
            msg.push_str(&format!(" · at {marker}"));
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ItemError, ProcessError};

    fn hidden() -> RunProgress {
        let progress = RunProgress::start("/data");
        progress.pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        progress
    }

    #[test]
    fn lines_carry_tag_and_name() {
        let progress = hidden();
        let done = progress.line(&Event::Done { name: "a/b".into() }).unwrap();
        assert!(done.contains("DONE") && done.ends_with("a/b"));

        let error = progress
            .line(&Event::Error {
                name: "c".into(),
                error: ItemError::Process {
                    attempt: 4,
                    source: ProcessError::failed("boom"),
                },
            })
            .unwrap();
        assert!(error.contains("ERROR") && error.contains("boom"));

        assert!(progress.line(&Event::MoveOn { marker: "a".into() }).is_none());
    }

    #[test]
    fn summary_tracks_events() {
        let mut progress = hidden();
        progress.event(&Event::Done { name: "a".into() });
        progress.event(&Event::Ignored { name: "b".into() });
        progress.event(&Event::MoveOn { marker: "b".into() });
        assert_eq!(progress.summary(), "done 1 · ignored 1 · errors 0 · at b");
    }
}
