//! Host namespace: constants, module functions and exception classes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ExceptionClass, Result};
use crate::value::Value;

/// A function callable as `Module.name(args)` from the host.
pub type ModuleFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A host module namespace such as `OpenSSL`.
pub struct Module {
    name: String,
    constants: Vec<(String, Value)>,
    functions: BTreeMap<String, ModuleFunction>,
    classes: Vec<ExceptionClass>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constants: Vec::new(),
            functions: BTreeMap::new(),
            classes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define or redefine a constant.
    pub fn define_const(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.constants.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                tracing::warn!(module = %self.name, constant = name, "already initialized constant");
                slot.1 = value;
            }
            None => self.constants.push((name.to_string(), value)),
        }
    }

    pub fn const_get(&self, name: &str) -> Option<&Value> {
        self.constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Constant names in definition order.
    pub fn constants(&self) -> impl Iterator<Item = &str> {
        self.constants.iter().map(|(n, _)| n.as_str())
    }

    pub fn define_module_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(f));
    }

    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Call a module function by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.functions.get(name) {
            Some(f) => f(args),
            None => Err(Error::raised(
                &no_method_error(),
                format!("undefined method `{}' for {}:Module", name, self.name),
            )),
        }
    }

    /// Define `Module::name` as a subclass of `parent`.
    ///
    /// `name` may itself be nested, e.g. `PKey::PKeyError`.
    pub fn define_class_under(&mut self, name: &str, parent: &ExceptionClass) -> ExceptionClass {
        let class = ExceptionClass::new(format!("{}::{}", self.name, name), Some(parent));
        self.classes.retain(|c| c.name() != class.name());
        self.classes.push(class.clone());
        tracing::debug!(class = ?class, "defined exception class");
        class
    }

    /// Look a class up by its name relative to the module or fully qualified.
    pub fn class(&self, name: &str) -> Option<&ExceptionClass> {
        let qualified = format!("{}::{}", self.name, name);
        self.classes
            .iter()
            .find(|c| c.name() == name || c.name() == qualified)
    }

    /// Classes in definition order.
    pub fn classes(&self) -> &[ExceptionClass] {
        &self.classes
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("constants", &self.constants)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("classes", &self.classes)
            .finish()
    }
}

fn no_method_error() -> ExceptionClass {
    let name_error = ExceptionClass::new("NameError", Some(&ExceptionClass::standard_error()));
    ExceptionClass::new("NoMethodError", Some(&name_error))
}

/// Fail with `ArgumentError` unless exactly `expected` arguments were given.
pub fn check_arity(args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        return Ok(());
    }
    Err(Error::raised(
        &ExceptionClass::argument_error(),
        format!(
            "wrong number of arguments (given {}, expected {})",
            args.len(),
            expected
        ),
    ))
}
