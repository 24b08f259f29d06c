//! Parameter definitions, forms, and run-time snapshots.
//!
//! A [`ParamForm`] models the input controls of one operation dialog. At
//! start time the controller captures the form into an immutable
//! [`ParameterSnapshot`], insulating the running worker from concurrent
//! edits. Snapshots can be written back into a form (`restore`) to reload a
//! previously saved parameter set.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Where a parameter appears in the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamGroup {
    /// Always-visible inputs.
    Main,
    /// Collapsed "advanced" section.
    Advanced,
    /// Inputs specific to one operation variant.
    Variant,
}

/// Type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Reference to a single project layer by name.
    Layer,
    /// Ordered `(layer, category)` pairs.
    LayerCategories,
    /// Ordered `(layer, enabled)` pairs.
    LayerFlags,
    /// Candidate output file path.
    OutputPath,
    /// Numeric input.
    Number,
    /// Checkbox.
    Bool,
    /// Free-text elevation formula.
    Formula,
}

impl ParamKind {
    /// Human-readable tag name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Layer => "a layer reference",
            ParamKind::LayerCategories => "a list of (layer, category) pairs",
            ParamKind::LayerFlags => "a list of (layer, flag) pairs",
            ParamKind::OutputPath => "an output path",
            ParamKind::Number => "a number",
            ParamKind::Bool => "a boolean",
            ParamKind::Formula => "a formula",
        }
    }
}

/// A captured parameter value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    /// Single layer reference.
    Layer(String),
    /// `(layer, category)` pairs.
    LayerCategories(Vec<(String, String)>),
    /// `(layer, enabled)` pairs.
    LayerFlags(Vec<(String, bool)>),
    /// Output file path.
    OutputPath(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Formula text.
    Formula(String),
}

impl ParamValue {
    /// The type tag of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Layer(_) => ParamKind::Layer,
            ParamValue::LayerCategories(_) => ParamKind::LayerCategories,
            ParamValue::LayerFlags(_) => ParamKind::LayerFlags,
            ParamValue::OutputPath(_) => ParamKind::OutputPath,
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Formula(_) => ParamKind::Formula,
        }
    }

    /// Layer names referenced by this value, if any.
    fn layer_names(&self) -> Vec<&str> {
        match self {
            ParamValue::Layer(name) => vec![name.as_str()],
            ParamValue::LayerCategories(pairs) => {
                pairs.iter().map(|(name, _)| name.as_str()).collect()
            }
            ParamValue::LayerFlags(pairs) => pairs.iter().map(|(name, _)| name.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Declaration of one input control.
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Name, unique within the operation.
    pub name: &'static str,
    /// Dialog section.
    pub group: ParamGroup,
    /// Type tag every value must carry.
    pub kind: ParamKind,
    /// Whether capture fails when no value is set.
    pub mandatory: bool,
}

impl ParamDef {
    /// A mandatory parameter in the main group.
    pub fn mandatory(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            group: ParamGroup::Main,
            kind,
            mandatory: true,
        }
    }

    /// An optional parameter in the main group.
    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            group: ParamGroup::Main,
            kind,
            mandatory: false,
        }
    }

    /// Moves the parameter to another dialog group.
    pub fn in_group(mut self, group: ParamGroup) -> Self {
        self.group = group;
        self
    }
}

/// Resolver for layer names against the host project.
pub trait LayerResolver {
    /// True when `name` currently resolves to a project layer.
    fn resolves(&self, name: &str) -> bool;
}

/// A resolver that accepts every name; useful when restoring into a form
/// detached from any project.
pub struct AcceptAllLayers;

impl LayerResolver for AcceptAllLayers {
    fn resolves(&self, _name: &str) -> bool {
        true
    }
}

/// The live state of an operation's input controls.
#[derive(Debug, Clone, Default)]
pub struct ParamForm {
    defs: Vec<ParamDef>,
    values: BTreeMap<String, ParamValue>,
}

impl ParamForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an input control. Fails on duplicate names.
    pub fn register(&mut self, def: ParamDef) -> Result<(), ParameterError> {
        if self.defs.iter().any(|d| d.name == def.name) {
            return Err(ParameterError::Duplicate {
                name: def.name.to_string(),
            });
        }
        self.defs.push(def);
        Ok(())
    }

    /// Registered definitions, in registration order.
    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    /// Sets a value, checking the registered type tag.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        let def = self.def(name)?;
        if def.kind != value.kind() {
            return Err(ParameterError::TypeMismatch {
                name: name.to_string(),
                expected: def.kind.name(),
                found: value.kind().name(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Clears a value.
    pub fn clear(&mut self, name: &str) -> Result<(), ParameterError> {
        self.def(name)?;
        self.values.remove(name);
        Ok(())
    }

    /// Current value of a control, if set.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Captures the form into an immutable snapshot.
    ///
    /// Reads every registered control exactly once. Fails with
    /// [`ParameterError::Missing`] on the first mandatory control without a
    /// value.
    pub fn capture(&self) -> Result<ParameterSnapshot, ParameterError> {
        let mut values = BTreeMap::new();
        for def in &self.defs {
            match self.values.get(def.name) {
                Some(value) => {
                    values.insert(def.name.to_string(), value.clone());
                }
                None if def.mandatory => {
                    return Err(ParameterError::Missing {
                        name: def.name.to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(ParameterSnapshot { values })
    }

    /// Writes a snapshot back into the form.
    ///
    /// Validates every entry first (registered name, matching type tag,
    /// resolvable layer references) and only then applies, so a failed
    /// restore leaves the form unchanged.
    pub fn restore(
        &mut self,
        snapshot: &ParameterSnapshot,
        resolver: &dyn LayerResolver,
    ) -> Result<(), ParameterError> {
        for (name, value) in &snapshot.values {
            let def = self.def(name)?;
            if def.kind != value.kind() {
                return Err(ParameterError::TypeMismatch {
                    name: name.clone(),
                    expected: def.kind.name(),
                    found: value.kind().name(),
                });
            }
            for layer in value.layer_names() {
                if !resolver.resolves(layer) {
                    return Err(ParameterError::LayerNotFound {
                        layer: layer.to_string(),
                    });
                }
            }
        }
        for (name, value) in &snapshot.values {
            self.values.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn def(&self, name: &str) -> Result<&ParamDef, ParameterError> {
        self.defs
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ParameterError::Unknown {
                name: name.to_string(),
            })
    }
}

/// Immutable capture of user-chosen inputs for one run.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterSnapshot {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSnapshot {
    /// Raw value lookup.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Number of captured values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Layer reference, by name.
    pub fn layer(&self, name: &str) -> Result<&str, ParameterError> {
        match self.require(name)? {
            ParamValue::Layer(layer) => Ok(layer),
            other => Err(mismatch(name, ParamKind::Layer, other)),
        }
    }

    /// `(layer, category)` pairs, by name.
    pub fn layer_categories(&self, name: &str) -> Result<&[(String, String)], ParameterError> {
        match self.require(name)? {
            ParamValue::LayerCategories(pairs) => Ok(pairs),
            other => Err(mismatch(name, ParamKind::LayerCategories, other)),
        }
    }

    /// `(layer, enabled)` pairs, by name.
    pub fn layer_flags(&self, name: &str) -> Result<&[(String, bool)], ParameterError> {
        match self.require(name)? {
            ParamValue::LayerFlags(pairs) => Ok(pairs),
            other => Err(mismatch(name, ParamKind::LayerFlags, other)),
        }
    }

    /// Output path, by name.
    pub fn output_path(&self, name: &str) -> Result<&str, ParameterError> {
        match self.require(name)? {
            ParamValue::OutputPath(path) => Ok(path),
            other => Err(mismatch(name, ParamKind::OutputPath, other)),
        }
    }

    /// Numeric value, by name.
    pub fn number(&self, name: &str) -> Result<f64, ParameterError> {
        match self.require(name)? {
            ParamValue::Number(value) => Ok(*value),
            other => Err(mismatch(name, ParamKind::Number, other)),
        }
    }

    /// Numeric value with a default when the parameter was not captured.
    pub fn number_or(&self, name: &str, default: f64) -> Result<f64, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Number(value)) => Ok(*value),
            Some(other) => Err(mismatch(name, ParamKind::Number, other)),
        }
    }

    /// Boolean value with a default when the parameter was not captured.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(value)) => Ok(*value),
            Some(other) => Err(mismatch(name, ParamKind::Bool, other)),
        }
    }

    /// Formula text, by name.
    pub fn formula(&self, name: &str) -> Result<&str, ParameterError> {
        match self.require(name)? {
            ParamValue::Formula(text) => Ok(text),
            other => Err(mismatch(name, ParamKind::Formula, other)),
        }
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ParameterError> {
        self.values
            .get(name)
            .ok_or_else(|| ParameterError::Missing {
                name: name.to_string(),
            })
    }
}

fn mismatch(name: &str, expected: ParamKind, found: &ParamValue) -> ParameterError {
    ParameterError::TypeMismatch {
        name: name.to_string(),
        expected: expected.name(),
        found: found.kind().name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_form() -> ParamForm {
        let mut form = ParamForm::new();
        form.register(ParamDef::mandatory("base", ParamKind::Layer))
            .unwrap();
        form.register(ParamDef::mandatory("output", ParamKind::OutputPath))
            .unwrap();
        form.register(
            ParamDef::optional("sea_level", ParamKind::Number).in_group(ParamGroup::Advanced),
        )
        .unwrap();
        form.set("base", ParamValue::Layer("topo".into())).unwrap();
        form.set("output", ParamValue::OutputPath("/tmp/out.pgg".into()))
            .unwrap();
        form
    }

    #[test]
    fn test_capture_missing_mandatory() {
        let mut form = sample_form();
        form.clear("base").unwrap();
        let err = form.capture().unwrap_err();
        assert_eq!(
            err,
            ParameterError::Missing {
                name: "base".into()
            }
        );
    }

    #[test]
    fn test_capture_restore_idempotent() {
        let mut form = sample_form();
        form.set("sea_level", ParamValue::Number(-120.0)).unwrap();
        let snapshot = form.capture().unwrap();

        form.restore(&snapshot, &AcceptAllLayers).unwrap();
        let again = form.capture().unwrap();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut form = sample_form();
        let err = form.set("base", ParamValue::Number(3.0)).unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { .. }));
    }

    #[test]
    fn test_restore_type_mismatch_leaves_form_unchanged() {
        let mut form = sample_form();
        let before = form.value("base").cloned();

        // Build a snapshot whose stored tag no longer matches the live kind.
        let mut other = ParamForm::new();
        other
            .register(ParamDef::mandatory("base", ParamKind::Formula))
            .unwrap();
        other
            .set("base", ParamValue::Formula("H*0.5".into()))
            .unwrap();
        let snapshot = other.capture().unwrap();

        let err = form.restore(&snapshot, &AcceptAllLayers).unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { .. }));
        assert_eq!(form.value("base").cloned(), before);
    }

    #[test]
    fn test_restore_unresolvable_layer() {
        struct NoLayers;
        impl LayerResolver for NoLayers {
            fn resolves(&self, _name: &str) -> bool {
                false
            }
        }

        let mut form = sample_form();
        let snapshot = form.capture().unwrap();
        let err = form.restore(&snapshot, &NoLayers).unwrap_err();
        assert_eq!(
            err,
            ParameterError::LayerNotFound {
                layer: "topo".into()
            }
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let mut form = sample_form();
        let err = form
            .register(ParamDef::optional("base", ParamKind::Bool))
            .unwrap_err();
        assert!(matches!(err, ParameterError::Duplicate { .. }));
    }
}
