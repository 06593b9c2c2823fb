use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::ledger::LedgerEntry;

/// Append-only markdown report sink. Writes happen on the blocking pool and
/// are serialized through a lock so sections never interleave.
pub struct AsyncReportAppender {
    path: Arc<Path>,
    writer_lock: Arc<Mutex<()>>,
}

impl AsyncReportAppender {
    pub fn new(file_path: &str) -> Self {
        AsyncReportAppender {
            path: Arc::from(PathBuf::from(file_path)),
            writer_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append_line(&self, line: String) -> Result<(), std::io::Error> {
        self.append_lines(vec![line]).await
    }

    pub async fn append_lines(&self, lines: Vec<String>) -> Result<(), std::io::Error> {
        let lock = Arc::clone(&self.writer_lock);
        let path = Arc::clone(&self.path);

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().expect("report writer lock poisoned");
            let mut file = File::options().create(true).append(true).open(path)?;

            for line in lines {
                writeln!(file, "{}", line)?;
            }

            Ok(())
        })
        .await
        .expect("Failed to run report write operation")
    }
}

pub fn render_report_header() -> String {
    "## PostgreSQL batch report".to_string()
}

/// One report section per statement: its literal SQL as a subheading, a
/// column-header line, then one line per row with the literal field values.
pub fn render_statement_section(sql: &str, entries: &[LedgerEntry]) -> Vec<String> {
    let mut lines = Vec::with_capacity(entries.len() + 2);
    lines.push(format!("### {}", sql));
    lines.push("- *ID* , *DESCRIPTION* , *AMOUNT*".to_string());
    for entry in entries {
        lines.push(format!("- {} , \"{}\" , {}", entry.id, entry.description, entry.amount));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<LedgerEntry> {
        vec![
            LedgerEntry { id: 1, description: "first item".to_string(), amount: 1 },
            LedgerEntry { id: 2, description: "second item".to_string(), amount: 2 },
        ]
    }

    #[test]
    fn test_section_renders_sql_header_and_rows() {
        let lines =
            render_statement_section("SELECT id, description, amount FROM ledger", &sample_entries());
        assert_eq!(
            lines,
            vec![
                "### SELECT id, description, amount FROM ledger".to_string(),
                "- *ID* , *DESCRIPTION* , *AMOUNT*".to_string(),
                "- 1 , \"first item\" , 1".to_string(),
                "- 2 , \"second item\" , 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_section_with_no_rows_keeps_headers() {
        let lines = render_statement_section("SELECT 1 WHERE FALSE", &[]);
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_appender_appends_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OUTPUT.md");
        let appender = AsyncReportAppender::new(path.to_str().unwrap());

        appender.append_line(render_report_header()).await.unwrap();
        appender
            .append_lines(render_statement_section("SELECT 1", &sample_entries()))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "## PostgreSQL batch report");
        assert_eq!(lines[1], "### SELECT 1");
        assert_eq!(lines.last().unwrap(), &"- 2 , \"second item\" , 2");
    }
}
