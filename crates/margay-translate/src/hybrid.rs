//! Composite translator: LLM first, rules on failure, stub as last resort.

use margay_model::CProgram;

use crate::gemini::{GeminiConfig, GeminiTranslator};
use crate::rules::{RuleTranslator, TypeMapper};
use crate::{TranslateError, Translator};

/// Minimum structural shape required of LLM output before it is trusted.
pub fn validate_output(code: &str) -> Result<(), TranslateError> {
    let meaningful: usize = code.lines().map(|l| l.trim().len()).sum();
    if meaningful < 50 {
        return Err(TranslateError::Validation("output too short".to_string()));
    }
    for required in ["using System", "public class", "}"] {
        if !code.contains(required) {
            return Err(TranslateError::Validation(format!(
                "missing `{required}`"
            )));
        }
    }
    Ok(())
}

/// Stub of last resort: every function throws.
pub fn emergency_stub(program: &CProgram) -> String {
    let mut lines = vec![
        "using System;".to_string(),
        String::new(),
        "public class ConvertedCode".to_string(),
        "{".to_string(),
        "    // emergency conversion, manual review required".to_string(),
        String::new(),
    ];
    for func in &program.functions {
        if func.name == "main" {
            continue;
        }
        let params = func
            .parameters
            .iter()
            .map(|p| {
                format!(
                    "{} {}",
                    TypeMapper::map_type(&p.data_type, p.pointer_level),
                    p.name
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let return_type = TypeMapper::map_type(&func.return_type, 0);
        lines.push(format!(
            "    public static {return_type} {}({params})",
            func.name
        ));
        lines.push("    {".to_string());
        lines.push("        throw new NotImplementedException();".to_string());
        lines.push("    }".to_string());
        lines.push(String::new());
    }
    lines.push("}".to_string());
    lines.join("\n")
}

/// Tries the LLM, then the rule-based converter, then the stub.
pub struct HybridTranslator {
    llm: Option<GeminiTranslator>,
    rules: RuleTranslator,
    fallback_to_rules: bool,
}

impl HybridTranslator {
    pub fn new(llm: Option<GeminiTranslator>, fallback_to_rules: bool) -> Self {
        HybridTranslator {
            llm,
            rules: RuleTranslator::new(),
            fallback_to_rules,
        }
    }

    pub fn llm(&self) -> Option<&GeminiTranslator> {
        self.llm.as_ref()
    }
}

impl Translator for HybridTranslator {
    fn convert_with_context(
        &self,
        program: &CProgram,
        context: &[String],
    ) -> Result<String, TranslateError> {
        if let Some(llm) = &self.llm {
            if llm.available() {
                match llm.convert_with_context(program, context) {
                    Ok(code) => match validate_output(&code) {
                        Ok(()) => {
                            tracing::info!(program_id = %program.program_id, "LLM conversion accepted");
                            return Ok(code);
                        }
                        Err(e) => {
                            tracing::warn!(
                                program_id = %program.program_id,
                                error = %e,
                                "LLM output rejected"
                            );
                        }
                    },
                    Err(e) => {
                        tracing::warn!(
                            program_id = %program.program_id,
                            error = %e,
                            "LLM conversion failed"
                        );
                    }
                }
            }
        }

        if self.fallback_to_rules {
            tracing::info!(program_id = %program.program_id, "falling back to rule-based conversion");
            if let Ok(code) = self.rules.convert(program) {
                return Ok(code);
            }
        }

        tracing::warn!(program_id = %program.program_id, "using emergency stub conversion");
        Ok(emergency_stub(program))
    }

    fn available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

/// Build the translator stack from converter configuration.
pub fn create_translator(
    gemini: Option<GeminiConfig>,
    fallback_to_rules: bool,
) -> HybridTranslator {
    let llm = gemini.map(GeminiTranslator::new);
    let llm = match llm {
        Some(t) if t.available() => Some(t),
        Some(_) => {
            tracing::warn!("LLM translator disabled: no API key");
            None
        }
        None => None,
    };
    HybridTranslator::new(llm, fallback_to_rules)
}
