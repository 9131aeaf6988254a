pub mod catalog;
pub mod definition;
pub mod selection;

pub use definition::{PipelineDefinition, StageDescriptor, StageScope};
pub use selection::{SelectedStage, StageRole, classify_stages, select_stages};

use std::{fmt, str::FromStr};

use crate::error::PipegenError;

/// The closed set of workflows the catalog knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    DnaWgsVarFastq,
    DnaWgsVarBam,
    DnaAmpliconVarFastq,
    DnaAmpliconVarBam,
    DnaCaptureVarFastq,
    DnaCaptureVarBam,
    ScRnaExpressionFastq,
    RnaExpressionFastq,
    RnaExpressionBam,
    RnaCaptureVarFastq,
    ScRnaExpressionCellRangerFastq,
    ScImmuneProfileCellRangerFastq,
    RnaFusionFastq,
    Bam2Fastq,
    TcrRepertoireFastq,
    HlaTypingFastq,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 16] = [
        WorkflowKind::DnaWgsVarFastq,
        WorkflowKind::DnaWgsVarBam,
        WorkflowKind::DnaAmpliconVarFastq,
        WorkflowKind::DnaAmpliconVarBam,
        WorkflowKind::DnaCaptureVarFastq,
        WorkflowKind::DnaCaptureVarBam,
        WorkflowKind::ScRnaExpressionFastq,
        WorkflowKind::RnaExpressionFastq,
        WorkflowKind::RnaExpressionBam,
        WorkflowKind::RnaCaptureVarFastq,
        WorkflowKind::ScRnaExpressionCellRangerFastq,
        WorkflowKind::ScImmuneProfileCellRangerFastq,
        WorkflowKind::RnaFusionFastq,
        WorkflowKind::Bam2Fastq,
        WorkflowKind::TcrRepertoireFastq,
        WorkflowKind::HlaTypingFastq,
    ];

    /// Identifier used in configuration files and generated file names.
    pub fn name(self) -> &'static str {
        match self {
            WorkflowKind::DnaWgsVarFastq => "DnaWgsVar_Fastq",
            WorkflowKind::DnaWgsVarBam => "DnaWgsVar_Bam",
            WorkflowKind::DnaAmpliconVarFastq => "DnaAmpliconVar_Fastq",
            WorkflowKind::DnaAmpliconVarBam => "DnaAmpliconVar_Bam",
            WorkflowKind::DnaCaptureVarFastq => "DnaCaptureVar_Fastq",
            WorkflowKind::DnaCaptureVarBam => "DnaCaptureVar_Bam",
            WorkflowKind::ScRnaExpressionFastq => "scRnaExpression_Fastq",
            WorkflowKind::RnaExpressionFastq => "RnaExpression_Fastq",
            WorkflowKind::RnaExpressionBam => "RnaExpression_Bam",
            WorkflowKind::RnaCaptureVarFastq => "RnaCaptureVar_Fastq",
            WorkflowKind::ScRnaExpressionCellRangerFastq => "scRnaExpression_CellRanger_Fastq",
            WorkflowKind::ScImmuneProfileCellRangerFastq => "scImmuneProfile_CellRanger_Fastq",
            WorkflowKind::RnaFusionFastq => "RnaFusion_Fastq",
            WorkflowKind::Bam2Fastq => "Bam2Fastq",
            WorkflowKind::TcrRepertoireFastq => "TcrRepertoire_Fastq",
            WorkflowKind::HlaTypingFastq => "HlaTyping_Fastq",
        }
    }

    pub fn definition(self) -> &'static PipelineDefinition {
        catalog::definition(self)
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkflowKind {
    type Err = PipegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        WorkflowKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| PipegenError::UnknownWorkflow(name.to_string()))
    }
}
