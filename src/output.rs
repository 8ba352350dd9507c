//! Terminal output for the operator.
//!
//! Progress and results go to stdout; errors and warnings go to stderr.

use console::style;

use crate::container::ContainerRef;
use crate::restore::executor::RestoreProgress;
use crate::utils::format_bytes;

pub const USAGE: &str = "\
Usage:
  containerdbtool [--config <path>] [-v] restore <backup-file> [container-id] <database-name>
  containerdbtool [--config <path>] [-v] query <database_name> <sql_query> [container_id]

restore  Stage a SQL backup into a running PostgreSQL container, recreate the
         database and apply the backup. The container defaults to the
         configured default_container when omitted.
query    Run one SQL statement inside the PostgreSQL container. When several
         containers match and no container_id is given, the candidates are listed.";

pub fn usage() {
    println!("{}", USAGE);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message labelled with the stage that failed
pub fn error(stage: &str, msg: &str) {
    eprintln!(
        "{} {} {}",
        style("✗").red().bold(),
        style(format!("[{}]", stage)).red(),
        msg
    );
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a pipeline step header
pub fn step(msg: &str) {
    println!("{} {}", style("→").cyan().bold(), style(msg).bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

pub fn progress(progress: &RestoreProgress) {
    println!(
        "  {} {} elapsed, database size {}",
        style("⏳").dim(),
        format_elapsed(progress.elapsed.as_secs()),
        style(format_bytes(progress.database_size_bytes)).cyan()
    );
}

/// Numbered list of containers the operator can pick from.
pub fn candidates(candidates: &[ContainerRef]) {
    println!("Multiple matching containers are running:");
    for (i, c) in candidates.iter().enumerate() {
        println!("  {}) {}", i + 1, c);
    }
    println!("Re-run with one of the names above as container_id.");
}

fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
