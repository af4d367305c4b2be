//! Strategy selection and suite assembly.

use margay_model::{CFunction, CProgram, TestCase, TestCategory, TestSuite};

use crate::inputs::{InputGenerator, InputStrategy, DEFAULT_SEED};
use crate::symbolic::SymbolicEngine;

/// Strategies the generator can combine into one suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStrategy {
    Boundary,
    Edge,
    Random,
    Symbolic,
}

impl TestStrategy {
    fn category(&self) -> TestCategory {
        match self {
            TestStrategy::Boundary => TestCategory::Boundary,
            TestStrategy::Edge => TestCategory::Edge,
            TestStrategy::Random => TestCategory::Random,
            TestStrategy::Symbolic => TestCategory::Symbolic,
        }
    }

    fn input_strategy(&self) -> Option<InputStrategy> {
        match self {
            TestStrategy::Boundary => Some(InputStrategy::Boundary),
            TestStrategy::Edge => Some(InputStrategy::Edge),
            TestStrategy::Random => Some(InputStrategy::Random),
            TestStrategy::Symbolic => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TestStrategy::Boundary => "boundary",
            TestStrategy::Edge => "edge",
            TestStrategy::Random => "random",
            TestStrategy::Symbolic => "symbolic",
        }
    }
}

/// Generates test suites for programs under migration.
///
/// `main` and `static` functions are never tested: both harnesses link the
/// original source, so `main` would collide and statics are not visible.
pub struct TestGenerator {
    inputs: InputGenerator,
    symbolic: Option<SymbolicEngine>,
    symbolic_available: bool,
}

impl Default for TestGenerator {
    fn default() -> Self {
        TestGenerator::new(DEFAULT_SEED, None)
    }
}

impl TestGenerator {
    pub fn new(seed: u64, symbolic: Option<SymbolicEngine>) -> Self {
        let symbolic_available = symbolic
            .as_ref()
            .map(|engine| engine.is_available())
            .unwrap_or(false);
        if symbolic.is_some() {
            if symbolic_available {
                tracing::info!("symbolic execution enabled");
            } else {
                tracing::info!("symbolic execution unavailable, engine not found");
            }
        }
        TestGenerator {
            inputs: InputGenerator::new(seed),
            symbolic,
            symbolic_available,
        }
    }

    /// Default strategy set: symbolic plus a boundary floor when the engine
    /// is present, otherwise the three deterministic strategies.
    pub fn default_strategies(&self) -> Vec<TestStrategy> {
        if self.symbolic_available {
            vec![TestStrategy::Symbolic, TestStrategy::Boundary]
        } else {
            vec![
                TestStrategy::Boundary,
                TestStrategy::Edge,
                TestStrategy::Random,
            ]
        }
    }

    /// Generate a suite for one program, optionally restricted to a single
    /// function.
    pub fn generate_tests(
        &mut self,
        program: &CProgram,
        function_name: Option<&str>,
        strategies: Option<&[TestStrategy]>,
    ) -> TestSuite {
        let strategies = match strategies {
            Some(s) => s.to_vec(),
            None => self.default_strategies(),
        };

        let mut suite = TestSuite::new(
            program.program_id.clone(),
            function_name.map(str::to_string),
        );

        let functions: Vec<&CFunction> = match function_name {
            Some(name) => match program.function(name) {
                Some(func) => vec![func],
                None => {
                    tracing::warn!(
                        function = name,
                        program_id = %program.program_id,
                        "function not found"
                    );
                    return suite;
                }
            },
            None => program
                .functions
                .iter()
                .filter(|f| !f.is_static && f.name != "main")
                .collect(),
        };

        for func in &functions {
            tracing::debug!(function = %func.name, "generating tests");
            for strategy in &strategies {
                match strategy {
                    TestStrategy::Symbolic => {
                        self.generate_symbolic_tests(program, func, &mut suite)
                    }
                    _ => self.generate_strategy_tests(program, func, *strategy, &mut suite),
                }
            }
        }

        tracing::info!(
            program_id = %program.program_id,
            tests = suite.len(),
            functions = functions.len(),
            "test generation complete"
        );
        suite
    }

    fn generate_strategy_tests(
        &mut self,
        program: &CProgram,
        func: &CFunction,
        strategy: TestStrategy,
        suite: &mut TestSuite,
    ) {
        let Some(input_strategy) = strategy.input_strategy() else {
            return;
        };
        let combinations = self.inputs.combinations(func, input_strategy);
        for (idx, inputs) in combinations.into_iter().enumerate() {
            let name = format!("{}_{}_{}", func.name, strategy.name(), idx + 1);
            let test = TestCase::new(
                name,
                program.program_id.clone(),
                func.name.clone(),
                inputs,
                strategy.category(),
            )
            .with_description(format!("{} test for {}", strategy.name(), func.name));
            suite.add(test);
        }
    }

    fn generate_symbolic_tests(&self, program: &CProgram, func: &CFunction, suite: &mut TestSuite) {
        let Some(engine) = &self.symbolic else {
            return;
        };
        if !self.symbolic_available {
            tracing::warn!(function = %func.name, "symbolic execution not available, skipping");
            return;
        }
        match engine.generate(func, program) {
            Ok(cases) => {
                for case in cases {
                    let name = format!("{}_symbolic_{}", func.name, case.test_id);
                    let test = TestCase::new(
                        name,
                        program.program_id.clone(),
                        func.name.clone(),
                        case.inputs,
                        TestCategory::Symbolic,
                    )
                    .with_description(format!(
                        "path exploration test {} for {}",
                        case.test_id, func.name
                    ));
                    suite.add(test);
                }
            }
            Err(e) => {
                // deterministic strategies still cover the function
                tracing::error!(function = %func.name, error = %e, "symbolic generation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use margay_model::CVariable;

    fn program() -> CProgram {
        CProgram {
            program_id: "prog".to_string(),
            functions: vec![
                CFunction {
                    name: "sum".to_string(),
                    return_type: "int".to_string(),
                    parameters: vec![CVariable::new("a", "int"), CVariable::new("b", "int")],
                    ..CFunction::default()
                },
                CFunction {
                    name: "helper".to_string(),
                    return_type: "int".to_string(),
                    is_static: true,
                    ..CFunction::default()
                },
                CFunction {
                    name: "main".to_string(),
                    return_type: "int".to_string(),
                    ..CFunction::default()
                },
            ],
            ..CProgram::default()
        }
    }

    #[test]
    fn main_and_static_functions_are_excluded() {
        let mut generator = TestGenerator::default();
        let suite = generator.generate_tests(&program(), None, Some(&[TestStrategy::Boundary]));
        assert!(!suite.is_empty());
        assert!(suite.test_cases.iter().all(|t| t.function_name == "sum"));
    }

    #[test]
    fn default_strategies_without_engine() {
        let generator = TestGenerator::default();
        assert_eq!(
            generator.default_strategies(),
            vec![
                TestStrategy::Boundary,
                TestStrategy::Edge,
                TestStrategy::Random
            ]
        );
    }

    #[test]
    fn test_names_carry_function_strategy_and_index() {
        let mut generator = TestGenerator::default();
        let suite = generator.generate_tests(&program(), None, Some(&[TestStrategy::Boundary]));
        assert_eq!(suite.test_cases[0].name, "sum_boundary_1");
        assert_eq!(suite.test_cases[1].name, "sum_boundary_2");
        assert_eq!(suite.test_cases[0].category, TestCategory::Boundary);
    }

    #[test]
    fn boundary_suite_contains_min_zero_max_rows_per_parameter() {
        let mut generator = TestGenerator::default();
        let suite = generator.generate_tests(&program(), None, Some(&[TestStrategy::Boundary]));
        let int_min = margay_model::CValue::Int(i64::from(i32::MIN));
        let int_max = margay_model::CValue::Int(i64::from(i32::MAX));
        let zero = margay_model::CValue::Int(0);

        let has = |a: &margay_model::CValue, b: &margay_model::CValue| {
            suite
                .test_cases
                .iter()
                .any(|t| t.inputs.get("a") == Some(a) && t.inputs.get("b") == Some(b))
        };
        assert!(has(&int_min, &zero));
        assert!(has(&zero, &zero));
        assert!(has(&int_max, &zero));
        assert!(has(&zero, &int_min));
        assert!(has(&zero, &int_max));
        assert!(has(&int_min, &int_min));
        assert!(has(&int_max, &int_max));
    }

    #[test]
    fn unknown_function_yields_empty_suite() {
        let mut generator = TestGenerator::default();
        let suite = generator.generate_tests(&program(), Some("ghost"), None);
        assert!(suite.is_empty());
    }

    #[test]
    fn single_function_restriction() {
        let mut generator = TestGenerator::default();
        let suite = generator.generate_tests(&program(), Some("sum"), Some(&[TestStrategy::Edge]));
        assert!(suite.test_cases.iter().all(|t| t.function_name == "sum"));
        assert_eq!(suite.function_name.as_deref(), Some("sum"));
    }

    #[test]
    fn combining_strategies_accumulates_cases() {
        let mut generator = TestGenerator::default();
        let boundary_only =
            generator.generate_tests(&program(), None, Some(&[TestStrategy::Boundary]));
        let mut generator = TestGenerator::default();
        let both = generator.generate_tests(
            &program(),
            None,
            Some(&[TestStrategy::Boundary, TestStrategy::Edge]),
        );
        assert!(both.len() > boundary_only.len());
    }
}
