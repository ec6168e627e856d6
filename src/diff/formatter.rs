use std::io::{self, Write};

use super::generator::{DiffGenerator, DiffOutput};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Renders unified diffs for a terminal: added lines green, removed lines red.
#[derive(Debug, Clone)]
pub struct DiffRenderer {
    colored: bool,
    generator: DiffGenerator,
}

impl DiffRenderer {
    pub fn new(colored: bool) -> Self {
        Self::with_generator(colored, DiffGenerator::default())
    }

    pub fn with_generator(colored: bool, generator: DiffGenerator) -> Self {
        Self { colored, generator }
    }

    /// The generator every diff of a run is computed with.
    pub fn generator(&self) -> &DiffGenerator {
        &self.generator
    }

    /// Format a computed diff. An empty diff renders to no lines at all.
    pub fn render(&self, diff: &DiffOutput) -> Vec<String> {
        if diff.is_empty() {
            return Vec::new();
        }
        diff.unified.lines().map(|line| self.paint(line)).collect()
    }

    /// Diff two texts and format the result.
    pub fn render_texts(&self, label_base: &str, text_base: &str, label_new: &str, text_new: &str) -> Vec<String> {
        let diff = self.generator.generate(label_base, text_base, label_new, text_new);
        self.render(&diff)
    }

    /// Write rendered lines to `out`, one per line.
    pub fn write_lines<W: Write + ?Sized>(out: &mut W, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }

    fn paint(&self, line: &str) -> String {
        if !self.colored {
            return line.to_string();
        }
        if line.starts_with('+') {
            format!("{GREEN}{line}{RESET}")
        } else if line.starts_with('-') {
            format!("{RED}{line}{RESET}")
        } else {
            line.to_string()
        }
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}
