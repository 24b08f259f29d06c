//! Operation plans: an identified unit of work as an ordered step list.

use std::path::PathBuf;

use paleogeo_core::{CancelToken, FeedbackChannel};

use crate::error::Result;

/// The editing operations offered by the menu.
///
/// Each variant carries its display name, help resource key, and default
/// output file name as data; nothing dispatches on type names or strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Compile several rasters into one elevation grid.
    CompileTopoBathy,
    /// Modify topography/bathymetry inside mask polygons.
    ModifyTopoBathy,
    /// Create a geological feature (sea, mountain range) from a mask.
    CreateTopoBathy,
    /// Remove artefacts by voiding and re-interpolating cells.
    RemoveArtefacts,
    /// Force elevations to agree with paleoshoreline polygons.
    SetPaleoshorelines,
    /// Standard raster processing (smoothing, gap filling, copy-paste).
    StandardProcessing,
}

impl OperationKind {
    /// Every operation kind, in menu order.
    pub const ALL: &[OperationKind] = &[
        OperationKind::CompileTopoBathy,
        OperationKind::ModifyTopoBathy,
        OperationKind::CreateTopoBathy,
        OperationKind::RemoveArtefacts,
        OperationKind::SetPaleoshorelines,
        OperationKind::StandardProcessing,
    ];

    /// Name shown in the menu and in feedback lines.
    pub fn display_name(self) -> &'static str {
        match self {
            OperationKind::CompileTopoBathy => "Compile Topo/Bathymetry",
            OperationKind::ModifyTopoBathy => "Modify Topo/Bathymetry",
            OperationKind::CreateTopoBathy => "Create Topo/Bathymetry",
            OperationKind::RemoveArtefacts => "Remove Artefacts",
            OperationKind::SetPaleoshorelines => "Set Paleoshorelines",
            OperationKind::StandardProcessing => "Standard Raster Processing",
        }
    }

    /// Key of the help resource for the parameter dialog.
    pub fn help_key(self) -> &'static str {
        match self {
            OperationKind::CompileTopoBathy => "compile_tb",
            OperationKind::ModifyTopoBathy => "modify_tb",
            OperationKind::CreateTopoBathy => "create_tb",
            OperationKind::RemoveArtefacts => "remove_arts",
            OperationKind::SetPaleoshorelines => "paleoshorelines",
            OperationKind::StandardProcessing => "std_processing",
        }
    }

    /// File name used when the user leaves the output path empty.
    pub fn default_output_name(self) -> &'static str {
        match self {
            OperationKind::CompileTopoBathy => "compiled_tb.pgg",
            OperationKind::ModifyTopoBathy => "modified_tb.pgg",
            OperationKind::CreateTopoBathy => "created_tb.pgg",
            OperationKind::RemoveArtefacts => "tb_no_artefacts.pgg",
            OperationKind::SetPaleoshorelines => "tb_shorelines.pgg",
            OperationKind::StandardProcessing => "processed_tb.pgg",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What a step body sees while running.
pub struct StepCtx<'a> {
    /// Feedback channel for the current run.
    pub feedback: &'a FeedbackChannel,
    /// Cancellation token; bodies with inner loops should poll it per
    /// feature or per tile so cancellation latency stays small.
    pub cancel: &'a CancelToken,
}

impl StepCtx<'_> {
    /// Convenience poll for inner loops.
    pub fn canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

type StepBody = Box<dyn FnMut(&StepCtx<'_>) -> Result<()> + Send>;

/// One processing step of an operation.
pub struct ProcessingStep {
    /// Short label used in step-level feedback.
    pub label: &'static str,
    /// Progress units this step contributes; a plan's weights sum to 100.
    pub weight: u8,
    /// Essential steps abort the run on error; non-essential ones degrade
    /// to a warning and let the sequence continue.
    pub essential: bool,
    pub(crate) body: StepBody,
}

impl ProcessingStep {
    /// An essential step.
    pub fn essential(
        label: &'static str,
        weight: u8,
        body: impl FnMut(&StepCtx<'_>) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            weight,
            essential: true,
            body: Box::new(body),
        }
    }

    /// A step whose failure is reported as a warning only.
    pub fn best_effort(
        label: &'static str,
        weight: u8,
        body: impl FnMut(&StepCtx<'_>) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            weight,
            essential: false,
            body: Box::new(body),
        }
    }
}

impl std::fmt::Debug for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingStep")
            .field("label", &self.label)
            .field("weight", &self.weight)
            .field("essential", &self.essential)
            .finish_non_exhaustive()
    }
}

/// An identified unit of work: ordered steps plus the artifact they promise.
#[derive(Debug)]
pub struct OperationPlan {
    /// Which operation this plan realizes.
    pub kind: OperationKind,
    /// The artifact path a successful run will hand to the result consumer,
    /// or `None` for no-artifact operations.
    pub artifact: Option<PathBuf>,
    steps: Vec<ProcessingStep>,
}

impl OperationPlan {
    /// Creates an empty plan.
    pub fn new(kind: OperationKind, artifact: Option<PathBuf>) -> Self {
        Self {
            kind,
            artifact,
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    pub fn push(&mut self, step: ProcessingStep) {
        self.steps.push(step);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of step weights. A well-formed plan budgets exactly 100.
    pub fn total_weight(&self) -> u32 {
        self.steps.iter().map(|s| u32::from(s.weight)).sum()
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [ProcessingStep] {
        &mut self.steps
    }
}
