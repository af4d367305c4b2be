//! Per-parameter input synthesis and the linear combination policy.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use margay_model::{CFunction, CValue, CVariable};

pub const DEFAULT_SEED: u64 = 42;

/// Non-symbolic input strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStrategy {
    Boundary,
    Edge,
    Random,
    /// Boundary + edge + a short random tail.
    All,
}

/// Coarse classification of a C scalar type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeClass {
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Other,
}

fn classify(data_type: &str) -> (TypeClass, bool) {
    let lower = data_type.to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");
    // floating types first so `long double` is not taken for a long
    let class = if lower.contains("double") {
        TypeClass::Double
    } else if lower.contains("float") {
        TypeClass::Float
    } else if lower.contains("char") {
        TypeClass::Char
    } else if lower.contains("short") {
        TypeClass::Short
    } else if lower.contains("long") {
        TypeClass::Long
    } else if lower.contains("int") || lower == "unsigned" || lower == "signed" {
        TypeClass::Int
    } else {
        TypeClass::Other
    };
    (class, unsigned)
}

/// Seeded generator for boundary, edge, and random input vectors.
///
/// Random generation is fully deterministic for a fixed seed.
pub struct InputGenerator {
    rng: StdRng,
    pub seed: u64,
}

impl Default for InputGenerator {
    fn default() -> Self {
        InputGenerator::new(DEFAULT_SEED)
    }
}

impl InputGenerator {
    pub fn new(seed: u64) -> Self {
        InputGenerator {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Type extremes plus domain-aware picks; first value is the type
    /// minimum and last the maximum, which the all-min/all-max tests rely on.
    pub fn boundary_values(&self, param: &CVariable) -> Vec<CValue> {
        if param.is_pointer() {
            return vec![CValue::Null];
        }
        let (class, unsigned) = classify(&param.data_type);
        match (class, unsigned) {
            (TypeClass::Int, false) => [i64::from(i32::MIN), -1000, -1, 0, 1, 1000, i64::from(i32::MAX)]
                .iter()
                .map(|&n| CValue::Int(n))
                .collect(),
            (TypeClass::Int, true) => [0u64, 1, 100, 1000, u64::from(u32::MAX)]
                .iter()
                .map(|&n| CValue::UInt(n))
                .collect(),
            (TypeClass::Short, false) => [i64::from(i16::MIN), -100, -1, 0, 1, 100, i64::from(i16::MAX)]
                .iter()
                .map(|&n| CValue::Int(n))
                .collect(),
            (TypeClass::Short, true) => [0u64, 1, 100, u64::from(u16::MAX)]
                .iter()
                .map(|&n| CValue::UInt(n))
                .collect(),
            (TypeClass::Long, false) => [i64::MIN, -1000, -1, 0, 1, 1000, i64::MAX]
                .iter()
                .map(|&n| CValue::Int(n))
                .collect(),
            (TypeClass::Long, true) => [0u64, 1, 1000, u64::MAX]
                .iter()
                .map(|&n| CValue::UInt(n))
                .collect(),
            // ASCII anchors: space, A, Z, a, z
            (TypeClass::Char, false) => [-128i64, 0, 32, 65, 90, 97, 122, 127]
                .iter()
                .map(|&n| CValue::Int(n))
                .collect(),
            (TypeClass::Char, true) => [0u64, 1, 65, 90, 97, 122, 255]
                .iter()
                .map(|&n| CValue::UInt(n))
                .collect(),
            (TypeClass::Float, _) => [-1e38, -1000.5, -1.0, -0.1, 0.0, 0.1, 1.0, 1000.5, 1e38]
                .iter()
                .map(|&f| CValue::Float(f))
                .collect(),
            (TypeClass::Double, _) => [-1e308, -1000.5, -1.0, -0.1, 0.0, 0.1, 1.0, 1000.5, 1e308]
                .iter()
                .map(|&f| CValue::Float(f))
                .collect(),
            (TypeClass::Other, _) => vec![CValue::Int(0), CValue::Int(1), CValue::Int(100)],
        }
    }

    /// Overflow triggers, signed zeroes and infinities, null pointers.
    ///
    /// Signed sub-int types have no overflow literal representable in the
    /// declared type, so they contribute nothing.
    pub fn edge_values(&self, param: &CVariable) -> Vec<CValue> {
        if param.is_pointer() {
            return vec![CValue::Null];
        }
        let (class, unsigned) = classify(&param.data_type);
        match (class, unsigned) {
            (TypeClass::Float | TypeClass::Double, _) => vec![
                CValue::Float(0.0),
                CValue::Float(-0.0),
                CValue::Float(f64::INFINITY),
                CValue::Float(f64::NEG_INFINITY),
            ],
            (TypeClass::Int, false) => vec![
                CValue::Int(i64::from(i32::MIN) - 1),
                CValue::Int(i64::from(i32::MIN)),
                CValue::Int(i64::from(i32::MAX)),
                CValue::Int(i64::from(i32::MAX) + 1),
            ],
            (TypeClass::Int, true) => vec![
                CValue::UInt(0),
                CValue::UInt(u64::from(u32::MAX)),
                CValue::UInt(u64::from(u32::MAX) + 1),
            ],
            (_, true) => vec![CValue::UInt(0), CValue::Int(-1)],
            _ => Vec::new(),
        }
    }

    /// Uniform samples across the representable range of the type.
    pub fn random_values(&mut self, param: &CVariable, count: usize) -> Vec<CValue> {
        if param.is_pointer() {
            return vec![CValue::Null; count.min(1)];
        }
        let (class, unsigned) = classify(&param.data_type);
        (0..count)
            .map(|_| match (class, unsigned) {
                (TypeClass::Int, false) => {
                    CValue::Int(i64::from(self.rng.gen_range(i32::MIN..=i32::MAX)))
                }
                (TypeClass::Int, true) => {
                    CValue::UInt(u64::from(self.rng.gen_range(0..=u32::MAX)))
                }
                (TypeClass::Short, false) => {
                    CValue::Int(i64::from(self.rng.gen_range(i16::MIN..=i16::MAX)))
                }
                (TypeClass::Short, true) => {
                    CValue::UInt(u64::from(self.rng.gen_range(0..=u16::MAX)))
                }
                (TypeClass::Long, false) => CValue::Int(self.rng.gen_range(i64::MIN..=i64::MAX)),
                (TypeClass::Long, true) => CValue::UInt(self.rng.gen_range(0..=u64::MAX)),
                (TypeClass::Char, false) => {
                    CValue::Int(i64::from(self.rng.gen_range(-128i32..=127)))
                }
                (TypeClass::Char, true) => CValue::UInt(u64::from(self.rng.gen_range(0u32..=255))),
                (TypeClass::Float, _) => CValue::Float(self.rng.gen_range(-1000.0..=1000.0)),
                (TypeClass::Double, _) => CValue::Float(self.rng.gen_range(-10000.0..=10000.0)),
                (TypeClass::Other, _) => CValue::Int(self.rng.gen_range(0..=100)),
            })
            .collect()
    }

    /// The zero of the type, used to hold non-stressed parameters steady.
    pub fn default_value(&self, param: &CVariable) -> CValue {
        if param.is_pointer() {
            return CValue::Null;
        }
        let (class, unsigned) = classify(&param.data_type);
        match (class, unsigned) {
            (TypeClass::Float | TypeClass::Double, _) => CValue::Float(0.0),
            (_, true) => CValue::UInt(0),
            _ => CValue::Int(0),
        }
    }

    /// Linear combination policy: one test per strategy value with the other
    /// parameters at their defaults, plus an all-minimums and an
    /// all-maximums test for the boundary strategies. O(sum of vector
    /// lengths + 2), never cartesian.
    pub fn combinations(
        &mut self,
        function: &CFunction,
        strategy: InputStrategy,
    ) -> Vec<IndexMap<String, CValue>> {
        if function.parameters.is_empty() {
            return vec![IndexMap::new()];
        }

        let mut per_param: Vec<(String, Vec<CValue>)> = Vec::new();
        for param in &function.parameters {
            let values = match strategy {
                InputStrategy::Boundary => self.boundary_values(param),
                InputStrategy::Edge => self.edge_values(param),
                InputStrategy::Random => self.random_values(param, 5),
                InputStrategy::All => {
                    let mut v = self.boundary_values(param);
                    v.extend(self.edge_values(param));
                    v.extend(self.random_values(param, 3));
                    v
                }
            };
            per_param.push((param.name.clone(), values));
        }

        let mut combinations = Vec::new();
        for (name, values) in &per_param {
            for value in values {
                let mut inputs = IndexMap::new();
                for param in &function.parameters {
                    if &param.name == name {
                        inputs.insert(param.name.clone(), value.clone());
                    } else {
                        inputs.insert(param.name.clone(), self.default_value(param));
                    }
                }
                combinations.push(inputs);
            }
        }

        if matches!(strategy, InputStrategy::Boundary | InputStrategy::All) {
            let mut all_min = IndexMap::new();
            let mut all_max = IndexMap::new();
            for (name, values) in &per_param {
                if let (Some(first), Some(last)) = (values.first(), values.last()) {
                    all_min.insert(name.clone(), first.clone());
                    all_max.insert(name.clone(), last.clone());
                }
            }
            combinations.push(all_min);
            combinations.push(all_max);
        }

        combinations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(data_type: &str) -> CVariable {
        CVariable::new("x", data_type)
    }

    fn pointer_param() -> CVariable {
        CVariable::new("p", "int").with_pointer_level(1)
    }

    fn two_int_function() -> CFunction {
        CFunction {
            name: "sum".to_string(),
            return_type: "int".to_string(),
            parameters: vec![CVariable::new("a", "int"), CVariable::new("b", "int")],
            ..CFunction::default()
        }
    }

    // ---------------------------------------------------------------
    // Boundary vectors
    // ---------------------------------------------------------------

    #[test]
    fn int_boundary_spans_the_type() {
        let generator = InputGenerator::default();
        let values = generator.boundary_values(&param("int"));
        assert_eq!(values.first(), Some(&CValue::Int(i64::from(i32::MIN))));
        assert_eq!(values.last(), Some(&CValue::Int(i64::from(i32::MAX))));
        assert!(values.contains(&CValue::Int(0)));
        assert!(values.contains(&CValue::Int(-1)));
        assert!(values.contains(&CValue::Int(1)));
    }

    #[test]
    fn unsigned_boundary_starts_at_zero() {
        let generator = InputGenerator::default();
        let values = generator.boundary_values(&param("unsigned int"));
        assert_eq!(values.first(), Some(&CValue::UInt(0)));
        assert_eq!(values.last(), Some(&CValue::UInt(u64::from(u32::MAX))));
    }

    #[test]
    fn char_boundary_includes_ascii_letters() {
        let generator = InputGenerator::default();
        let values = generator.boundary_values(&param("char"));
        assert!(values.contains(&CValue::Int(65)));
        assert!(values.contains(&CValue::Int(122)));
    }

    #[test]
    fn long_double_classifies_as_floating() {
        let generator = InputGenerator::default();
        let values = generator.boundary_values(&param("long double"));
        assert!(matches!(values[0], CValue::Float(_)));
    }

    #[test]
    fn pointer_boundary_is_null() {
        let generator = InputGenerator::default();
        assert_eq!(generator.boundary_values(&pointer_param()), vec![CValue::Null]);
    }

    // ---------------------------------------------------------------
    // Edge vectors
    // ---------------------------------------------------------------

    #[test]
    fn float_edges_carry_signed_zero_and_infinities() {
        let generator = InputGenerator::default();
        let values = generator.edge_values(&param("double"));
        assert!(values.contains(&CValue::Float(f64::INFINITY)));
        assert!(values.contains(&CValue::Float(f64::NEG_INFINITY)));
        assert!(values.iter().any(|v| matches!(v, CValue::Float(f) if *f == 0.0)));
    }

    #[test]
    fn signed_int_edges_trigger_overflow() {
        let generator = InputGenerator::default();
        let values = generator.edge_values(&param("int"));
        assert!(values.contains(&CValue::Int(i64::from(i32::MAX) + 1)));
        assert!(values.contains(&CValue::Int(i64::from(i32::MIN) - 1)));
    }

    #[test]
    fn signed_short_has_no_edge_literals() {
        let generator = InputGenerator::default();
        assert!(generator.edge_values(&param("short")).is_empty());
    }

    // ---------------------------------------------------------------
    // Random determinism
    // ---------------------------------------------------------------

    #[test]
    fn same_seed_same_samples() {
        let mut a = InputGenerator::new(42);
        let mut b = InputGenerator::new(42);
        assert_eq!(
            a.random_values(&param("int"), 5),
            b.random_values(&param("int"), 5)
        );
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = InputGenerator::new(42);
        let mut b = InputGenerator::new(43);
        assert_ne!(
            a.random_values(&param("long"), 5),
            b.random_values(&param("long"), 5)
        );
    }

    // ---------------------------------------------------------------
    // Combination policy
    // ---------------------------------------------------------------

    #[test]
    fn combination_count_is_linear_plus_two() {
        let mut generator = InputGenerator::default();
        let function = two_int_function();
        let per_param = generator.boundary_values(&param("int")).len();
        let combos = generator.combinations(&function, InputStrategy::Boundary);
        assert_eq!(combos.len(), 2 * per_param + 2);
    }

    #[test]
    fn every_combination_binds_every_parameter() {
        let mut generator = InputGenerator::default();
        let function = two_int_function();
        for combo in generator.combinations(&function, InputStrategy::Boundary) {
            assert!(combo.contains_key("a"));
            assert!(combo.contains_key("b"));
        }
    }

    #[test]
    fn all_min_and_all_max_rows_are_appended() {
        let mut generator = InputGenerator::default();
        let function = two_int_function();
        let combos = generator.combinations(&function, InputStrategy::Boundary);
        let all_min = &combos[combos.len() - 2];
        let all_max = &combos[combos.len() - 1];
        assert_eq!(all_min["a"], CValue::Int(i64::from(i32::MIN)));
        assert_eq!(all_min["b"], CValue::Int(i64::from(i32::MIN)));
        assert_eq!(all_max["a"], CValue::Int(i64::from(i32::MAX)));
        assert_eq!(all_max["b"], CValue::Int(i64::from(i32::MAX)));
    }

    #[test]
    fn edge_strategy_skips_min_max_rows() {
        let mut generator = InputGenerator::default();
        let function = two_int_function();
        let per_param = generator.edge_values(&param("int")).len();
        let combos = generator.combinations(&function, InputStrategy::Edge);
        assert_eq!(combos.len(), 2 * per_param);
    }

    #[test]
    fn parameterless_function_gets_one_empty_test() {
        let mut generator = InputGenerator::default();
        let function = CFunction {
            name: "tick".to_string(),
            return_type: "void".to_string(),
            ..CFunction::default()
        };
        let combos = generator.combinations(&function, InputStrategy::Boundary);
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn unstressed_parameters_sit_at_their_default() {
        let mut generator = InputGenerator::default();
        let function = CFunction {
            name: "mix".to_string(),
            return_type: "double".to_string(),
            parameters: vec![CVariable::new("n", "int"), CVariable::new("f", "double")],
            ..CFunction::default()
        };
        let combos = generator.combinations(&function, InputStrategy::Edge);
        // rows stressing `n` hold `f` at 0.0
        let stressing_n = combos
            .iter()
            .filter(|c| c["f"] == CValue::Float(0.0))
            .count();
        assert!(stressing_n >= generator.edge_values(&param("int")).len());
    }
}
