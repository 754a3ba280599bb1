//! Descriptor construction errors.

use thiserror::Error;

/// Errors found while checking endpoint descriptors.
///
/// These indicate a mismatch between a path template and its input schema,
/// or an inconsistent group definition. They are programmer errors and are
/// expected to surface once, at module load or in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The path template has an unclosed or stray brace.
    #[error("Unbalanced braces in path template: {template}")]
    UnbalancedBraces {
        /// The offending template.
        template: String,
    },

    /// A `{param}` token is empty (`{}`).
    #[error("Empty parameter token in path template: {template}")]
    EmptyParam {
        /// The offending template.
        template: String,
    },

    /// A template token has no matching field in the input schema.
    #[error("Path parameter `{param}` of `{function_name}` is not a field of its input schema")]
    UnknownPathParam {
        /// The endpoint's function name.
        function_name: String,
        /// The template token without a matching input field.
        param: String,
    },

    /// A template token maps to an optional input field.
    #[error("Path parameter `{param}` of `{function_name}` must not be optional")]
    OptionalPathParam {
        /// The endpoint's function name.
        function_name: String,
        /// The template token.
        param: String,
    },

    /// The function name is empty or not a valid identifier.
    #[error("Invalid function name: {name:?}")]
    InvalidFunctionName {
        /// The rejected name.
        name: String,
    },

    /// Two endpoints in the same group share a function name.
    #[error("Duplicate function name in group `{group}`: {name}")]
    DuplicateFunction {
        /// The group name.
        group: String,
        /// The duplicated function name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_param_display() {
        let err = DescriptorError::UnknownPathParam {
            function_name: "vesselBasicsByVesselId".to_string(),
            param: "VesselId".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Path parameter `VesselId` of `vesselBasicsByVesselId` is not a field of its input schema"
        );
    }

    #[test]
    fn duplicate_function_display() {
        let err = DescriptorError::DuplicateFunction {
            group: "vesselBasics".to_string(),
            name: "vesselBasics".to_string(),
        };
        assert!(err.to_string().contains("vesselBasics"));
    }
}
