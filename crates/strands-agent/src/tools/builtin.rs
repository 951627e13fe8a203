//! Built-in tools exposed to the model.

use crate::error::RegistryError;

use super::calculator::Calculator;
use super::current_time::CurrentTime;
use super::registry::ToolRegistry;
use super::ToolSpec;

/// Names of every built-in tool, in registration order.
pub fn builtin_names() -> &'static [&'static str] {
    &["calculator", "current_time"]
}

fn builtin_spec(name: &str) -> Option<ToolSpec> {
    match name {
        "calculator" => Some(Calculator::spec()),
        "current_time" => Some(CurrentTime::spec()),
        _ => None,
    }
}

/// Register the named built-ins. An unknown name is a configuration error.
pub fn register_builtins<S: AsRef<str>>(
    registry: &mut ToolRegistry,
    names: &[S],
) -> Result<(), RegistryError> {
    for name in names {
        let name = name.as_ref();
        let spec =
            builtin_spec(name).ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        registry.register(spec)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtins() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, builtin_names()).unwrap();
        assert_eq!(registry.names(), builtin_names());
    }

    #[test]
    fn unknown_builtin_fails() {
        let mut registry = ToolRegistry::new();
        let err = register_builtins(&mut registry, &["calculator", "generate_image"]).unwrap_err();
        assert_eq!(err, RegistryError::UnknownTool("generate_image".into()));
    }

    #[test]
    fn builtin_registered_twice_is_duplicate() {
        let mut registry = ToolRegistry::new();
        let err = register_builtins(&mut registry, &["calculator", "calculator"]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("calculator".into()));
    }
}
