use serde::Serialize;
use std::io::{self, Write};

/// Per-run accounting. A bad file is recorded and the batch keeps going;
/// the failure count decides the run result at the end.
#[derive(Default, Serialize)]
pub struct Summary {
    pub processed: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub failed: Vec<Failure>,
}

#[derive(Serialize)]
pub struct Failure {
    pub file: String,
    pub reason: String,
}

impl Summary {
    pub fn ok(&mut self) {
        self.processed += 1;
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn warn(&mut self, msg: String) {
        eprintln!("{}", msg);
        self.warnings.push(msg);
    }

    pub fn fail(&mut self, file: &str, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        eprintln!("{}: {}", file, reason);
        self.failed.push(Failure {
            file: file.to_string(),
            reason,
        });
    }

    /// Print the human-readable totals, emit the same data as one JSON line
    /// on stderr, and turn any recorded failures into the run result.
    /// Warnings alone do not fail the run.
    pub fn finish(self, what: &str) -> Result<(), Box<dyn std::error::Error>> {
        eprintln!(
            "{}: {} processed, {} skipped, {} failed",
            what,
            self.processed,
            self.skipped,
            self.failed.len()
        );
        let _ = writeln!(
            io::stderr(),
            "{}",
            serde_json::json!({"summary": &self})
        );
        let _ = io::stderr().flush();
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(format!("{} file(s) failed", self.failed.len()).into())
        }
    }
}
