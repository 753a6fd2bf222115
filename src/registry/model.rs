use crate::constraints::Constraint;
use crate::error::Result;
use crate::types::{Capability, Param, ParamValue, Provider};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable model descriptor.
///
/// The supported parameters are exactly the keys of `parameter_constraints`.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: String,
    pub provider: Provider,
    pub display_name: String,
    pub capabilities: BTreeSet<Capability>,
    pub parameter_constraints: BTreeMap<Param, Constraint>,
    pub streaming: bool,
}

impl Model {
    pub fn new(id: impl Into<String>, provider: Provider, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            display_name: display_name.into(),
            capabilities: BTreeSet::new(),
            parameter_constraints: BTreeMap::new(),
            streaming: false,
        }
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn constraint(mut self, param: Param, constraint: Constraint) -> Self {
        self.parameter_constraints.insert(param, constraint);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn supported_parameters(&self) -> BTreeSet<Param> {
        self.parameter_constraints.keys().copied().collect()
    }

    pub fn supports(&self, param: Param) -> bool {
        self.parameter_constraints.contains_key(&param)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Validate a value with this model's constraint for `param`.
    ///
    /// Values pass through unchanged when no constraint is declared.
    pub fn validate(&self, param: Param, value: &ParamValue) -> Result<ParamValue> {
        match self.parameter_constraints.get(&param) {
            Some(constraint) => constraint.validate(value),
            None => Ok(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_parameters_are_constraint_keys() {
        let m = Model::new("m", Provider::OpenAI, "M")
            .capability(Capability::TextGeneration)
            .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
            .constraint(Param::MaxTokens, Constraint::Int);
        assert_eq!(
            m.supported_parameters().into_iter().collect::<Vec<_>>(),
            vec![Param::Temperature, Param::MaxTokens]
        );
        assert!(m.validate(Param::Temperature, &ParamValue::Float(3.0)).is_err());
        assert_eq!(
            m.validate(Param::Seed, &ParamValue::Int(1)).unwrap(),
            ParamValue::Int(1)
        );
    }
}
