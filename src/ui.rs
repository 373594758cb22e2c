//! Terminal output for cloudferry: spinners and colored job listings.
//!
//! Uses `indicatif` for progress spinners and `console` for styling.
//! [`JobProgress`] follows a handler while it runs in the terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{CompletionOutcome, DispatchOutcome, ResolveReport};
use crate::state_machine::{JobRecord, JobStatus};

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Created => Style::new().dim(),
        JobStatus::InProgress => Style::new().yellow(),
        JobStatus::Success => Style::new().green().bold(),
        JobStatus::Failed => Style::new().red().bold(),
    }
}

/// Spinner shown while a handler runs, finished with a colored verdict.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Start the spinner with `message`.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    fn ok(&self, text: String) {
        self.pb.finish_and_clear();
        println!("  {} {text}", self.green.apply_to("✓"));
    }

    fn skipped(&self, text: String) {
        self.pb.finish_and_clear();
        println!("  {} {text}", self.yellow.apply_to("•"));
    }

    fn failed(&self, text: String) {
        self.pb.finish_and_clear();
        println!("  {} {text}", self.red.apply_to("✗"));
    }

    /// Finish with the result of a dispatch. Returns whether it went through.
    pub fn dispatched(&self, job_id: &str, outcome: &DispatchOutcome) -> bool {
        match outcome {
            DispatchOutcome::Submitted { handle } => {
                self.ok(format!("{job_id} submitted as {handle}"));
                true
            }
            DispatchOutcome::TakeoutFinished { handle, status } => {
                let text = format!(
                    "{job_id} takeout {handle} finished: {}",
                    status_style(*status).apply_to(status)
                );
                if *status == JobStatus::Success {
                    self.ok(text);
                } else {
                    self.failed(text);
                }
                true
            }
            DispatchOutcome::AlreadyDispatched => {
                self.skipped(format!("{job_id} was already dispatched"));
                true
            }
            DispatchOutcome::NotFound => {
                self.failed(format!("no job {job_id}"));
                false
            }
            DispatchOutcome::Rejected(e) => {
                self.failed(format!("{job_id} not dispatched: {e}"));
                false
            }
        }
    }

    /// Finish with the result of a notification. Returns whether it was usable.
    pub fn notified(&self, outcome: &CompletionOutcome) -> bool {
        match outcome {
            CompletionOutcome::Applied {
                job_id,
                status,
                artifacts,
            } => {
                let links = artifacts.map_or_else(|| "links not published".to_string(), |n| format!("{n} links"));
                self.ok(format!(
                    "{job_id} is {} ({links})",
                    status_style(*status).apply_to(status)
                ));
                true
            }
            CompletionOutcome::Ignored => {
                self.skipped("notification is not terminal, ignored".to_string());
                true
            }
            CompletionOutcome::Unresolved { handle } => {
                self.skipped(format!("no job for {handle}, dropped"));
                true
            }
            CompletionOutcome::OutOfOrder { job_id, from, to } => {
                self.skipped(format!("{job_id} cannot move from {from} to {to}, dropped"));
                true
            }
            CompletionOutcome::Rejected(e) => {
                self.failed(format!("notification not applied: {e}"));
                false
            }
        }
    }

    pub fn resolved(&self, job_id: &str, report: &ResolveReport) {
        if report.skipped.is_empty() {
            self.ok(format!("{job_id}: {} links published", report.signed));
        } else {
            self.skipped(format!(
                "{job_id}: {} links published, {} skipped ({})",
                report.signed,
                report.skipped.len(),
                report.skipped.join(", ")
            ));
        }
    }

    pub fn error(&self, text: &str) {
        self.failed(text.to_string());
    }
}

/// Print one job in detail.
pub fn print_job(record: &JobRecord) {
    let label = Style::new().bold();
    println!("{} {}", label.apply_to("id:        "), record.id);
    println!("{} {}", label.apply_to("name:      "), record.name.as_deref().unwrap_or("-"));
    println!(
        "{} {} / {}",
        label.apply_to("kind:      "),
        record.job_type.as_deref().unwrap_or("-"),
        record.source.as_deref().unwrap_or("-")
    );
    println!(
        "{} {}",
        label.apply_to("status:    "),
        status_style(record.status).apply_to(record.status)
    );
    if let Some(handle) = &record.external_job_handle {
        println!("{} {handle}", label.apply_to("handle:    "));
    }
    if let Some(at) = record.created_at {
        println!("{} {}", label.apply_to("created:   "), at.to_rfc3339());
    }
    if let Some(at) = record.completed_at {
        println!("{} {}", label.apply_to("completed: "), at.to_rfc3339());
    }
    for detail in &record.error_details {
        println!("  {} {detail}", Style::new().red().apply_to("!"));
    }
    for link in &record.access_urls {
        println!("  {} {}", Style::new().cyan().apply_to(&link.name), link.url);
    }
}

/// Print a one-line summary per job.
pub fn print_list(records: &[JobRecord]) {
    if records.is_empty() {
        println!("{}", Style::new().dim().apply_to("no jobs"));
        return;
    }
    for record in records {
        let status = format!("{:<11}", record.status.to_string());
        println!(
            "{}  {}  {}",
            status_style(record.status).apply_to(status),
            record.id,
            record.name.as_deref().unwrap_or("-")
        );
    }
}
