//! Regex rewrites that strip simple type syntax before execution.
//!
//! The rules are fixed and applied in order. They are a best-effort cleanup:
//! anything they miss is left for the parser, which skips type syntax itself.

use std::sync::LazyLock;

use regex::Regex;

/// Compile-time-constant patterns, so building them cannot fail at runtime.
fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid normalizer rule {pattern:?}: {err}"))
}

static RULES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        rule(r": (string|number|boolean|any)\[\]"),
        rule(r": (string|number|boolean|any|void|unknown)\b"),
        rule(r"\binterface\s+\w+\s*\{[^}]*\}"),
        rule(r"\btype\s+\w+\s*=\s*[^;]+;"),
    ]
});

/// Returns `source` with array and scalar annotations, interface declarations
/// and type aliases removed. Never fails.
#[must_use]
pub fn normalize(source: &str) -> String {
    RULES.iter().fold(source.to_string(), |text, rule| {
        rule.replace_all(&text, "").into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_array_annotations_before_scalars() {
        assert_eq!(
            normalize("let planets: string[] = [\"Mars\"];"),
            "let planets = [\"Mars\"];"
        );
    }

    #[test]
    fn strips_scalar_annotations() {
        assert_eq!(
            normalize("function f(fuel: number): void { let ok: boolean = true; }"),
            "function f(fuel) { let ok = true; }"
        );
    }

    #[test]
    fn scalar_rule_is_word_bounded() {
        assert_eq!(normalize("let n: numbers = 1;"), "let n: numbers = 1;");
    }

    #[test]
    fn removes_interfaces_and_aliases() {
        let source = "interface Planet {\n  name: string;\n  moons?: number;\n}\ntype Id = number;\nconst x = 1;";
        assert_eq!(normalize(source), "\n\nconst x = 1;");
    }

    #[test]
    fn leaves_other_text_alone() {
        let source = "console.log(\"Ready for launch!\");";
        assert_eq!(normalize(source), source);
        assert_eq!(normalize(""), "");
    }
}
