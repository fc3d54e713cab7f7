/// Whether captured output satisfies an exercise: both sides are trimmed, then
/// compared exactly. No case folding and no inner whitespace collapsing.
#[must_use]
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_outer_whitespace_only() {
        assert!(outputs_match(" X \n", "X"));
        assert!(outputs_match("Mars has 2 moons", "  Mars has 2 moons"));
        assert!(!outputs_match("x", "X"));
        assert!(!outputs_match("a  b", "a b"));
        assert!(!outputs_match("4.0", "4"));
    }
}
