//! Warnings and errors collected over a whole compile pass.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Tag path with extension.
    pub tag: String,
    /// Field locator such as `crosshairs[0].crosshair_overlays[1]`.
    pub locator: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        tag: impl Into<String>,
        locator: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            tag: tag.into(),
            locator: locator.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locator.is_empty() {
            write!(f, "{}: {}: {}", self.severity, self.tag, self.message)
        } else {
            write!(
                f,
                "{}: {}: {}: {}",
                self.severity, self.tag, self.locator, self.message
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!("{}", diagnostic),
            Severity::Error | Severity::Fatal => tracing::error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn merge(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    /// Takes over entries that were already reported.
    pub fn append(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn warnings(&self) -> usize {
        self.count(|severity| severity == Severity::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(|severity| severity >= Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    fn count(&self, predicate: impl Fn(Severity) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| predicate(diagnostic.severity))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(Severity::Warning, "a.sound", "", "quiet"));
        assert!(!diagnostics.has_errors());
        diagnostics.merge(vec![Diagnostic::new(
            Severity::Error,
            "b.bitmap",
            "bitmap_group_sequence[2]",
            "empty",
        )]);
        assert_eq!(diagnostics.warnings(), 1);
        assert_eq!(diagnostics.errors(), 1);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn display_includes_locator() {
        let diagnostic = Diagnostic::new(Severity::Error, "ui\\hud.weapon_hud_interface", "crosshairs[0]", "bad");
        assert_eq!(
            diagnostic.to_string(),
            "error: ui\\hud.weapon_hud_interface: crosshairs[0]: bad"
        );
        let diagnostic = Diagnostic::new(Severity::Warning, "a.sound", "", "quiet");
        assert_eq!(diagnostic.to_string(), "warning: a.sound: quiet");
    }
}
