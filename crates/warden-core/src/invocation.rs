//! Method invocations as authorization targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a callable: the type that declares it plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    /// The type (class or interface) that declares the method.
    pub declaring_type: String,
    /// The method name.
    pub name: String,
}

impl MethodRef {
    /// Create a method reference.
    #[must_use]
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// A call to a method, captured at call time.
///
/// `target_type` is the runtime type the call is dispatched on. When the
/// method is reached through an interface or proxy this differs from
/// [`MethodRef::declaring_type`], and policy resolution scans from the
/// runtime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocation {
    /// The invoked method.
    pub method: MethodRef,
    /// The runtime type of the receiver, if known.
    pub target_type: Option<String>,
    /// Named arguments.
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl MethodInvocation {
    /// Create an invocation with no arguments and no runtime target.
    #[must_use]
    pub fn new(method: MethodRef) -> Self {
        Self {
            method,
            target_type: None,
            arguments: serde_json::Map::new(),
        }
    }

    /// Set the runtime target type.
    #[must_use]
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Append a named argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// The type policy resolution starts from.
    #[must_use]
    pub fn effective_target(&self) -> &str {
        self.target_type
            .as_deref()
            .unwrap_or(&self.method.declaring_type)
    }
}

/// A completed method invocation together with its return value.
///
/// Post-invocation policies are evaluated against this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocationResult {
    /// The invocation that produced the value.
    pub invocation: MethodInvocation,
    /// The value returned by the method.
    pub result: serde_json::Value,
}

impl MethodInvocationResult {
    /// Pair an invocation with its result.
    #[must_use]
    pub fn new(invocation: MethodInvocation, result: serde_json::Value) -> Self {
        Self { invocation, result }
    }

    /// Split back into the invocation and the result.
    #[must_use]
    pub fn into_parts(self) -> (MethodInvocation, serde_json::Value) {
        (self.invocation, self.result)
    }
}

/// Anything that identifies a method call for policy resolution.
pub trait MethodTarget {
    /// The invocation being authorized.
    fn invocation(&self) -> &MethodInvocation;
}

impl MethodTarget for MethodInvocation {
    fn invocation(&self) -> &MethodInvocation {
        self
    }
}

impl MethodTarget for MethodInvocationResult {
    fn invocation(&self) -> &MethodInvocation {
        &self.invocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_ref_display() {
        let method = MethodRef::new("DocumentService", "read");
        assert_eq!(method.to_string(), "DocumentService.read");
    }

    #[test]
    fn test_effective_target_defaults_to_declaring_type() {
        let invocation = MethodInvocation::new(MethodRef::new("DocumentApi", "read"));
        assert_eq!(invocation.effective_target(), "DocumentApi");

        let invocation = invocation.with_target_type("DocumentServiceImpl");
        assert_eq!(invocation.effective_target(), "DocumentServiceImpl");
    }

    #[test]
    fn test_result_round_trip_parts() {
        let invocation = MethodInvocation::new(MethodRef::new("Svc", "m"));
        let result = MethodInvocationResult::new(invocation.clone(), json!({"owner": "alice"}));
        assert_eq!(result.invocation().method.name, "m");
        let (inv, value) = result.into_parts();
        assert_eq!(inv, invocation);
        assert_eq!(value["owner"], "alice");
    }
}
