//! Transformer script validation and error types.

use rhai::{Engine, AST};
use thiserror::Error;

/// Function every transformer script must define.
pub const TRANSFORM_FN: &str = "transform";

/// Parameters `transform` is called with.
pub const TRANSFORM_PARAMS: usize = 3;

/// A transformer script could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Missing required function: fn transform(request, response, parameters)")]
    MissingFunction,
}

/// A compiled transformer failed while running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("Script execution error: {0}")]
    Runtime(String),

    #[error("Transformer returned an invalid response: {0}")]
    InvalidResult(String),
}

/// Compile `script` and check that it defines `transform` with three parameters.
pub fn validate_transformer(engine: &Engine, script: &str) -> Result<AST, CompileError> {
    let ast = engine
        .compile(script)
        .map_err(|e| CompileError::Syntax(e.to_string()))?;

    let defines_transform = ast
        .iter_functions()
        .any(|f| f.name == TRANSFORM_FN && f.params.len() == TRANSFORM_PARAMS);
    if !defines_transform {
        return Err(CompileError::MissingFunction);
    }

    Ok(ast)
}

/// Validate several scripts, keeping each result next to its id.
pub fn validate_batch<'a>(
    engine: &Engine,
    scripts: &[(&'a str, &str)],
) -> Vec<(&'a str, Result<(), CompileError>)> {
    scripts
        .iter()
        .map(|(id, script)| (*id, validate_transformer(engine, script).map(|_| ())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script() {
        let script = r#"
            fn transform(request, response, parameters) {
                response
            }
        "#;
        assert!(validate_transformer(&Engine::new(), script).is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let script = r#"
            fn transform(request, response, parameters) {
                #{ status: 200
            }
        "#;
        let result = validate_transformer(&Engine::new(), script);
        assert!(matches!(result, Err(CompileError::Syntax(_))));
    }

    #[test]
    fn test_missing_function() {
        let script = r#"fn transfrom(request, response, parameters) { response }"#;
        assert_eq!(
            validate_transformer(&Engine::new(), script).unwrap_err(),
            CompileError::MissingFunction
        );
    }

    #[test]
    fn test_wrong_arity_is_missing_function() {
        // Mentioning the name is not enough; the signature must match.
        let script = r#"
            // transform(request, response, parameters)
            fn transform(response) { response }
        "#;
        assert_eq!(
            validate_transformer(&Engine::new(), script).unwrap_err(),
            CompileError::MissingFunction
        );
    }

    #[test]
    fn test_batch_validation() {
        let engine = Engine::new();
        let scripts = vec![
            ("ok", "fn transform(a, b, c) { b }"),
            ("missing", "fn other() { 1 }"),
            ("broken", "fn transform(a, b, c) {"),
        ];

        let results = validate_batch(&engine, &scripts);

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1, Err(CompileError::MissingFunction));
        assert!(matches!(results[2].1, Err(CompileError::Syntax(_))));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CompileError::Syntax("unexpected token".into()).to_string(),
            "Syntax error: unexpected token"
        );
        assert_eq!(
            InvokeError::InvalidResult("status must be an integer".into()).to_string(),
            "Transformer returned an invalid response: status must be an integer"
        );
    }
}
