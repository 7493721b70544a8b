use crate::operator::UndistortFunction;
use crate::{RecmathError, SharedRecording};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Inputs handed to a math function by the caller.
#[derive(Clone, Debug)]
pub struct MathInputs {
    pub image: SharedRecording,
    pub calibration: SharedRecording,
    pub crop: bool,
    /// Path of the recording the function creates.
    pub result_path: String,
}

impl MathInputs {
    pub fn new(image: SharedRecording, calibration: SharedRecording, crop: bool) -> Self {
        let result_path = format!("{}/result", image.path());
        Self {
            image,
            calibration,
            crop,
            result_path,
        }
    }

    pub fn with_result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = path.into();
        self
    }
}

/// A named operator producing one new recording per invocation.
pub trait MathFunction: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, inputs: &MathInputs) -> Result<SharedRecording, RecmathError>;
}

/// Name -> function lookup.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn MathFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding both undistortion variants.
    pub fn with_builtins() -> Self {
        let functions = [UndistortFunction::fixed_u8(), UndistortFunction::generic()]
            .into_iter()
            .map(|f| (f.name().to_string(), Arc::new(f) as Arc<dyn MathFunction>))
            .collect();
        Self { functions }
    }

    pub fn register(&mut self, function: Arc<dyn MathFunction>) -> Result<(), RecmathError> {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(RecmathError::DuplicateFunction(name));
        }
        log::debug!("registered math function {name}");
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MathFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn execute(
        &self,
        name: &str,
        inputs: &MathInputs,
    ) -> Result<SharedRecording, RecmathError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| RecmathError::UnknownFunction(name.to_string()))?;
        function.execute(inputs)
    }
}

/// Process-wide registry with the built-in functions, created on first use.
pub fn default_registry() -> &'static FunctionRegistry {
    static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FunctionRegistry::with_builtins)
}
