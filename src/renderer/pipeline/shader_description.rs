//! Per-stage shader source plus its declared inter-stage interface.
//!
//! A producing stage records every output it promises with
//! [`ShaderDescription::output_declaration`]; a consuming stage derives its
//! input declaration from that record with
//! [`ShaderDescription::input_declaration`]. Locations are assigned in
//! declaration order by the producer and reused verbatim by the consumer, so
//! the two sides cannot drift apart.

use std::fmt;

use super::shader_template::{ShaderTemplate, SubstitutePolicy, substitute};
use crate::errors::{RenderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// One declared inter-stage variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceVariable {
    pub name: String,
    pub ty: String,
    pub location: u32,
}

impl InterfaceVariable {
    fn declaration(&self) -> String {
        format!("@location({}) {}: {},", self.location, self.name, self.ty)
    }
}

#[derive(Debug, Clone)]
pub struct ShaderDescription {
    stage: ShaderStage,
    label: String,
    code: String,
    outputs: Vec<InterfaceVariable>,
}

impl ShaderDescription {
    #[must_use]
    pub fn new(stage: ShaderStage, label: &str, template: ShaderTemplate) -> Self {
        Self {
            stage,
            label: label.to_string(),
            code: template.into_source(),
            outputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: String) {
        self.code = code;
    }

    #[must_use]
    pub fn into_code(self) -> String {
        self.code
    }

    /// Substitutes the first occurrence of `marker`. Returns whether it was found.
    pub fn replace<S: AsRef<str>>(&mut self, marker: &str, lines: &[S]) -> bool {
        let out = substitute(&self.code, marker, lines, SubstitutePolicy::First);
        if out.success {
            self.code = out.result;
        }
        out.success
    }

    /// Records an output and returns its struct member declaration.
    ///
    /// Declaring the same name twice with the same type is idempotent.
    pub fn output_declaration(&mut self, ty: &str, name: &str) -> Result<String> {
        if let Some(existing) = self.outputs.iter().find(|o| o.name == name) {
            if existing.ty != ty {
                return Err(RenderError::ConflictingOutput {
                    stage: self.stage.to_string(),
                    name: name.to_string(),
                    existing: existing.ty.clone(),
                    requested: ty.to_string(),
                });
            }
            return Ok(existing.declaration());
        }
        let variable = InterfaceVariable {
            name: name.to_string(),
            ty: ty.to_string(),
            location: self.outputs.len() as u32,
        };
        let declaration = variable.declaration();
        self.outputs.push(variable);
        Ok(declaration)
    }

    /// Input declaration matching `from`'s output `name`.
    pub fn input_declaration(&self, from: &ShaderDescription, name: &str) -> Result<String> {
        from.output(name)
            .map(InterfaceVariable::declaration)
            .ok_or_else(|| RenderError::UndeclaredInput {
                stage: self.stage.to_string(),
                producer: from.stage.to_string(),
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&InterfaceVariable> {
        self.outputs.iter().find(|o| o.name == name)
    }

    #[must_use]
    pub fn outputs(&self) -> &[InterfaceVariable] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(stage: ShaderStage, src: &str) -> ShaderDescription {
        ShaderDescription::new(stage, "test", ShaderTemplate::parse("test", src).unwrap())
    }

    #[test]
    fn input_reuses_producer_location_and_type() {
        let mut vs = desc(ShaderStage::Vertex, "");
        let fs = desc(ShaderStage::Fragment, "");
        assert_eq!(vs.output_declaration("vec4<f32>", "color").unwrap(), "@location(0) color: vec4<f32>,");
        assert_eq!(vs.output_declaration("vec3<f32>", "normalVC").unwrap(), "@location(1) normalVC: vec3<f32>,");
        assert_eq!(fs.input_declaration(&vs, "normalVC").unwrap(), "@location(1) normalVC: vec3<f32>,");
    }

    #[test]
    fn undeclared_input_is_a_composition_error() {
        let vs = desc(ShaderStage::Vertex, "");
        let fs = desc(ShaderStage::Fragment, "");
        let err = fs.input_declaration(&vs, "normalVC").unwrap_err();
        assert!(matches!(err, RenderError::UndeclaredInput { ref name, .. } if name == "normalVC"));
    }

    #[test]
    fn conflicting_output_type_is_rejected() {
        let mut vs = desc(ShaderStage::Vertex, "");
        vs.output_declaration("vec2<f32>", "tcoordVS").unwrap();
        assert!(vs.output_declaration("vec2<f32>", "tcoordVS").is_ok());
        assert!(vs.output_declaration("vec4<f32>", "tcoordVS").is_err());
        assert_eq!(vs.outputs().len(), 1);
    }

    #[test]
    fn replace_reports_presence() {
        let mut fs = desc(ShaderStage::Fragment, "a\n//Color::Impl\nb");
        assert!(fs.replace("//Color::Impl", &["c"]));
        assert!(!fs.replace("//Color::Impl", &["c"]));
        assert_eq!(fs.code(), "a\nc\nb");
    }
}
