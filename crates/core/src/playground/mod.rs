//! The code playground: normalize learner text, run it, compare the output.
//!
//! Snippets are never handed to a host runtime. They are parsed into a small
//! syntax tree and evaluated by [`Interpreter`], which sees nothing but the
//! snippet and a substitute `console.log`.

pub mod ast;
mod builtins;
mod compare;
mod error;
mod heap;
mod interpreter;
mod lexer;
mod normalize;
mod outcome;
mod parser;
mod token;
mod value;

pub use compare::outputs_match;
pub use error::SyntaxError;
pub use interpreter::{Interpreter, SandboxLimits};
pub use normalize::normalize;
pub use outcome::{ExecutionFailure, ExecutionOutcome, FailureKind, SUCCESS_SENTINEL};
pub use parser::parse;

/// Executes one snippet in isolation.
///
/// Implementations must not share state between calls: each execution starts
/// from a fresh global scope.
pub trait Sandbox: Send + Sync {
    fn execute(&self, source: &str) -> ExecutionOutcome;
}

/// Normalizes `source` and executes the result.
pub fn evaluate(sandbox: &dyn Sandbox, source: &str) -> ExecutionOutcome {
    sandbox.execute(&normalize(source))
}

/// Runs `source` and checks its captured output against `expected`.
///
/// A failed run never matches.
pub fn check_solution(sandbox: &dyn Sandbox, source: &str, expected: &str) -> (ExecutionOutcome, bool) {
    let outcome = evaluate(sandbox, source);
    let passed = outcome
        .captured_text()
        .is_some_and(|text| outputs_match(text, expected));
    (outcome, passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTER_VARIABLES: &str = r#"// Your code here:
let astronautName: string = "";
let fuelLevel: number = 0;
let helmetOn: boolean = false;

console.log("Astronaut:", astronautName, "Fuel:", fuelLevel, "Helmet:", helmetOn);"#;

    const INTERFACE_SOLUTION: &str = r#"interface Planet {
  name: string;
  diameter: number;
  hasLife: boolean;
  moons?: number;
}

let mars: Planet = {
  name: "Mars",
  diameter: 6779,
  hasLife: false,
  moons: 2
};

console.log(mars.name + " has " + (mars.moons || 0) + " moons");"#;

    const CLASS_SOLUTION: &str = r#"class SpaceExplorer {
  private energy: number = 100;
  public name: string;

  constructor(name: string) {
    this.name = name;
  }

  public explore(): void {
    this.energy -= 20;
    console.log(this.name + " is exploring! Energy: " + this.energy);
  }
}

let astronaut = new SpaceExplorer("Commander Nova");
astronaut.explore();"#;

    fn run(source: &str) -> ExecutionOutcome {
        evaluate(&Interpreter::default(), source)
    }

    #[test]
    fn unedited_template_runs_but_does_not_match() {
        let (outcome, passed) = check_solution(
            &Interpreter::default(),
            STARTER_VARIABLES,
            "Astronaut: Alex Fuel: 85 Helmet: true",
        );
        assert_eq!(outcome.captured_text(), Some("Astronaut:  Fuel: 0 Helmet: false"));
        assert!(!passed);
    }

    #[test]
    fn edited_template_matches() {
        let solution = STARTER_VARIABLES
            .replace("= \"\"", "= \"Alex\"")
            .replace("= 0", "= 85")
            .replace("= false", "= true");
        let (_, passed) = check_solution(
            &Interpreter::default(),
            &solution,
            "Astronaut: Alex Fuel: 85 Helmet: true",
        );
        assert!(passed);
    }

    #[test]
    fn typed_function_returns_through_log() {
        let source = r#"function checkFuelStatus(fuel: number): string {
  if (fuel > 50) {
    return "Ready for launch!";
  } else {
    return "Need more fuel!";
  }
}

console.log(checkFuelStatus(75));"#;
        assert_eq!(run(source).captured_text(), Some("Ready for launch!"));
    }

    #[test]
    fn array_exercise_logs_count() {
        let source = "let planets: string[] = [\"Mars\", \"Jupiter\", \"Saturn\"];\nplanets.push(\"Neptune\");\nconsole.log(planets.length);";
        assert_eq!(run(source).captured_text(), Some("4"));
    }

    #[test]
    fn interface_exercise() {
        assert_eq!(run(INTERFACE_SOLUTION).captured_text(), Some("Mars has 2 moons"));
    }

    #[test]
    fn class_exercise() {
        assert_eq!(
            run(CLASS_SOLUTION).captured_text(),
            Some("Commander Nova is exploring! Energy: 80")
        );
    }

    #[test]
    fn empty_function_body_logs_undefined() {
        let source = "function checkFuelStatus(fuel: number): string {\n  // Your code here\n  \n}\n\nconsole.log(checkFuelStatus(75));";
        assert_eq!(run(source).captured_text(), Some(""));
    }

    #[test]
    fn failing_snippet_reports_no_text() {
        let outcome = run("console.log(\"partial\");\nthrow new Error(\"engine failure\");");
        assert_eq!(outcome.captured_text(), None);
        assert_eq!(
            outcome.failure().map(|failure| failure.message.as_str()),
            Some("Error: engine failure")
        );
        let (_, passed) = check_solution(&Interpreter::default(), "nope(", "anything");
        assert!(!passed);
    }

    #[test]
    fn annotations_the_rewrites_miss_still_parse() {
        let source = "type Speed = number;\nconst warp = (factor: Speed): Speed => factor * 2;\nlet crew: Array<string> = [\"Ada\"];\nconsole.log(warp(3) as number, crew!.length);";
        assert_eq!(run(source).captured_text(), Some("6 1"));
    }
}
