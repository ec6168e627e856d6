use similar::{Algorithm, TextDiff};

/// A unified diff between two canonical texts, not yet colorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutput {
    pub from_label: String,
    pub to_label: String,
    pub unified: String,
}

impl DiffOutput {
    /// True when the two sides had no line differences.
    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }
}

/// Line-based unified diff generation (Myers shortest edit script).
#[derive(Debug, Clone)]
pub struct DiffGenerator {
    algorithm: Algorithm,
    context_lines: usize,
}

impl DiffGenerator {
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::Myers,
            context_lines: 3,
        }
    }

    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Diff `old` against `new`. Identical inputs yield an empty output with
    /// no headers.
    pub fn generate(&self, from_label: &str, old: &str, to_label: &str, new: &str) -> DiffOutput {
        let diff = TextDiff::configure()
            .algorithm(self.algorithm)
            .diff_lines(old, new);

        let unified = diff
            .unified_diff()
            .context_radius(self.context_lines)
            .header(from_label, to_label)
            .to_string();

        DiffOutput {
            from_label: from_label.to_string(),
            to_label: to_label.to_string(),
            unified,
        }
    }
}

impl Default for DiffGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unified_diff() {
        let old = "line1\nline2\nline3\n";
        let new = "line1\nmodified\nline3\n";

        let out = DiffGenerator::new().generate("old.yaml", old, "new.yaml", new);

        assert!(out.unified.starts_with("--- old.yaml\n+++ new.yaml\n"));
        assert!(out.unified.contains("@@ -1,3 +1,3 @@"));
        assert!(out.unified.contains("\n-line2\n"));
        assert!(out.unified.contains("\n+modified\n"));
        assert!(out.unified.contains("\n line1\n"));
    }

    #[test]
    fn test_identical_inputs_are_empty() {
        let text = "same content\nno changes\n";
        let out = DiffGenerator::new().generate("a", text, "b", text);

        assert!(out.is_empty());
        assert_eq!(out.unified, "");
    }

    #[test]
    fn test_diff_from_empty_baseline() {
        let out = DiffGenerator::new().generate("Pod/a/0", "", "Pod/a/1", "kind: Pod\n");

        assert!(out.unified.contains("--- Pod/a/0"));
        assert!(out.unified.contains("+kind: Pod"));
    }

    #[test]
    fn test_context_radius() {
        let old: String = (0..20).map(|i| format!("l{i}\n")).collect();
        let new = old.replace("l10\n", "changed\n");

        let narrow = DiffGenerator::new().context_lines(1).generate("a", &old, "b", &new);

        assert!(narrow.unified.contains(" l9\n"));
        assert!(!narrow.unified.contains(" l8\n"));
    }
}
