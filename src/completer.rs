use dataset_analyzer::commands::COMMAND_NAMES;
use reedline::{Completer, Span, Suggestion};
use std::sync::{Arc, Mutex};

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP BY", "ORDER BY", "HAVING", "LIMIT", "JOIN", "AND", "OR",
    "COUNT", "DISTINCT", "AS", "ASC", "DESC",
];

/// Completes command names at the start of a line, and table names or
/// SQL keywords anywhere else
pub struct SessionCompleter {
    tables: Arc<Mutex<Vec<String>>>,
}

impl SessionCompleter {
    pub fn new(tables: Arc<Mutex<Vec<String>>>) -> Self {
        Self { tables }
    }

    fn candidates(&self, line: &str, word: &str) -> Vec<(String, &'static str)> {
        if line.trim_start().starts_with('\\') && !line.trim_start().contains(' ') {
            return COMMAND_NAMES
                .iter()
                .filter(|name| name.starts_with(word))
                .map(|name| (name.to_string(), "command"))
                .collect();
        }
        if line.trim_start().starts_with('\\') || word.is_empty() {
            return Vec::new();
        }

        let upper = word.to_ascii_uppercase();
        let mut out: Vec<(String, &'static str)> = self
            .tables
            .lock()
            .map(|tables| {
                tables
                    .iter()
                    .filter(|t| t.to_ascii_lowercase().starts_with(&word.to_ascii_lowercase()))
                    .map(|t| (t.clone(), "table"))
                    .collect()
            })
            .unwrap_or_default();
        out.extend(
            SQL_KEYWORDS
                .iter()
                .filter(|k| k.starts_with(&upper))
                .map(|k| (k.to_string(), "keyword")),
        );
        out
    }
}

impl Completer for SessionCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let input = &line[..pos];
        let start = input
            .rfind(|c: char| c.is_whitespace() || c == ',' || c == '(')
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &input[start..];

        self.candidates(input, word)
            .into_iter()
            .map(|(value, kind)| Suggestion {
                value,
                description: Some(kind.to_string()),
                extra: None,
                span: Span { start, end: pos },
                style: None,
                append_whitespace: true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completer() -> SessionCompleter {
        SessionCompleter::new(Arc::new(Mutex::new(vec!["dataset".to_string()])))
    }

    #[test]
    fn test_command_completion() {
        let values: Vec<String> = completer()
            .complete("\\ex", 3)
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["\\export"]);
    }

    #[test]
    fn test_table_completion() {
        let line = "SELECT * FROM da";
        let suggestions = completer().complete(line, line.len());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].value, "dataset");
        assert_eq!(suggestions[0].span.start, 14);
    }
}
