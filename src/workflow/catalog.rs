use std::{collections::HashMap, sync::OnceLock};

use super::{PipelineDefinition, StageDescriptor, WorkflowKind};

const DNA_CALLERS: [&str; 11] = [
    "vardict",
    "mutect1",
    "mutect2",
    "lofreq",
    "gatkHaplotypeCaller",
    "strelka2",
    "scalpel",
    "freebayes",
    "contEst",
    "sequenza",
    "exomecnv",
];

static CATALOG: OnceLock<HashMap<WorkflowKind, PipelineDefinition>> = OnceLock::new();

pub fn definition(kind: WorkflowKind) -> &'static PipelineDefinition {
    let catalog = CATALOG.get_or_init(|| {
        WorkflowKind::ALL
            .into_iter()
            .map(|kind| (kind, PipelineDefinition::builtin(kind.name(), stages_for(kind))))
            .collect()
    });
    &catalog[&kind]
}

fn stages_for(kind: WorkflowKind) -> Vec<StageDescriptor> {
    match kind {
        WorkflowKind::RnaExpressionFastq | WorkflowKind::ScRnaExpressionFastq => {
            rna_expression_fastq()
        }
        WorkflowKind::RnaExpressionBam => rna_expression_bam(),
        WorkflowKind::RnaCaptureVarFastq => rna_capture_var_fastq(),
        WorkflowKind::RnaFusionFastq => rna_fusion_fastq(),
        WorkflowKind::DnaWgsVarFastq
        | WorkflowKind::DnaAmpliconVarFastq
        | WorkflowKind::DnaCaptureVarFastq => dna_var_fastq(),
        WorkflowKind::DnaWgsVarBam
        | WorkflowKind::DnaAmpliconVarBam
        | WorkflowKind::DnaCaptureVarBam => dna_var_bam(),
        WorkflowKind::ScRnaExpressionCellRangerFastq => sc_rna_expression_cellranger(),
        WorkflowKind::ScImmuneProfileCellRangerFastq => sc_immune_profile_cellranger(),
        WorkflowKind::Bam2Fastq => bam2fastq(),
        WorkflowKind::TcrRepertoireFastq => single_tool_fastq("mixcr", "MiXCR repertoire analysis"),
        WorkflowKind::HlaTypingFastq => single_tool_fastq("optitype", "OptiType HLA typing"),
    }
}

fn pre_alignment(aligners: &[&str]) -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::sample("seqpurge", "Seqpurge trimming").produces_for(aligners),
        StageDescriptor::sample("trimmomatic", "Trimmomatic trimming").produces_for(aligners),
        StageDescriptor::sample("xenome", "Xenome classification").produces_for(aligners),
    ]
}

fn rna_expression_fastq() -> Vec<StageDescriptor> {
    let mut stages = pre_alignment(&["star", "hisat2", "salmon"]);
    stages.extend([
        StageDescriptor::sample("star", "STAR alignment").produces_for(&[
            "rmdup",
            "qc",
            "featureCount",
            "rsem",
            "cufflinks",
            "stringtie",
        ]),
        StageDescriptor::sample("hisat2", "HISAT2 alignment")
            .produces_for(&["rmdup", "qc", "featureCount", "cufflinks", "stringtie"])
            .conflicts_with(&["rsem"]),
        StageDescriptor::sample("salmon", "Salmon quantification"),
        StageDescriptor::sample("rmdup", "Remove duplicates")
            .produces_for(&["qc", "featureCount", "cufflinks", "stringtie"]),
        StageDescriptor::sample("qc", "RNA QC metrics"),
        StageDescriptor::sample("featureCount", "featureCount quantification"),
        StageDescriptor::sample("rsem", "RSEM quantification"),
        StageDescriptor::sample("cufflinks", "Cufflinks quantification"),
        StageDescriptor::sample("stringtie", "Stringtie quantification"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeExpression", "Merge gene expression"),
    ]);
    stages
}

fn rna_expression_bam() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::sample("featureCount", "featureCount quantification"),
        StageDescriptor::sample("rsem", "RSEM quantification"),
        StageDescriptor::sample("cufflinks", "Cufflinks quantification"),
        StageDescriptor::sample("stringtie", "Stringtie quantification"),
        StageDescriptor::sample("qc", "RNA QC metrics"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeExpression", "Merge gene expression"),
    ]
}

fn rna_capture_var_fastq() -> Vec<StageDescriptor> {
    let mut stages = pre_alignment(&["star", "hisat2"]);
    stages.extend([
        StageDescriptor::sample("star", "STAR alignment")
            .produces_for(&["rmdup", "qc", "gatkHaplotypeCaller"]),
        StageDescriptor::sample("hisat2", "HISAT2 alignment")
            .produces_for(&["rmdup", "qc", "gatkHaplotypeCaller"]),
        StageDescriptor::sample("rmdup", "Remove duplicates")
            .produces_for(&["qc", "gatkHaplotypeCaller"]),
        StageDescriptor::sample("qc", "RNA QC metrics"),
        StageDescriptor::sample("gatkHaplotypeCaller", "GATK haplotypecaller detection"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeMutation", "Merge mutation annotation"),
    ]);
    stages
}

fn rna_fusion_fastq() -> Vec<StageDescriptor> {
    let mut stages = pre_alignment(&["starFusion", "fusionCatcher"]);
    stages.extend([
        StageDescriptor::sample("starFusion", "STAR-Fusion detection"),
        StageDescriptor::sample("fusionCatcher", "FusionCatcher detection"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
    ]);
    stages
}

fn dna_callers() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::sample("vardict", "Vardict detection"),
        StageDescriptor::sample("mutect1", "Mutect1 detection"),
        StageDescriptor::sample("mutect2", "Mutect2 detection"),
        StageDescriptor::sample("lofreq", "Lofreq detection"),
        StageDescriptor::sample("gatkHaplotypeCaller", "GATK haplotypecaller detection"),
        StageDescriptor::sample("strelka2", "Strelka2 detection"),
        StageDescriptor::sample("scalpel", "Scalpel detection"),
        StageDescriptor::sample("freebayes", "Freebayes detection"),
        StageDescriptor::sample("contEst", "ContEst contamination estimation"),
        StageDescriptor::sample("sequenza", "Sequenza detection"),
        StageDescriptor::sample("exomecnv", "ExomeCNV detection"),
    ]
}

fn dna_var_fastq() -> Vec<StageDescriptor> {
    let post_alignment = ["rmdup", "abra_realign", "gatk_realign", "qc"];
    let downstream: Vec<&str> = post_alignment.iter().chain(DNA_CALLERS.iter()).copied().collect();

    let mut stages = pre_alignment(&["bwa", "novoalign"]);
    stages.extend([
        StageDescriptor::sample("bwa", "BWA alignment").produces_for(&downstream),
        StageDescriptor::sample("novoalign", "Novoalign alignment").produces_for(&downstream),
        StageDescriptor::sample("rmdup", "Remove duplicates").produces_for(&downstream[1..]),
        StageDescriptor::sample("abra_realign", "ABRA realignment").produces_for(&downstream[2..]),
        StageDescriptor::sample("gatk_realign", "GATK realignment").produces_for(&downstream[3..]),
        StageDescriptor::sample("qc", "DNA QC metrics"),
    ]);
    stages.extend(dna_callers());
    stages.extend([
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeMutation", "Merge mutation annotation"),
    ]);
    stages
}

fn dna_var_bam() -> Vec<StageDescriptor> {
    let mut stages = dna_callers();
    stages.extend([
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeMutation", "Merge mutation annotation"),
    ]);
    stages
}

fn sc_rna_expression_cellranger() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::sample("count", "Cellranger count")
            .required()
            .produces_for(&["doubletDetection", "scrublet"]),
        StageDescriptor::sample("vdj", "Cellranger vdj"),
        StageDescriptor::sample("doubletDetection", "Doublet detection"),
        StageDescriptor::sample("scrublet", "Scrublet doublet detection"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
        StageDescriptor::cohort("mergeExpression", "Merge gene-barcode matrix"),
    ]
}

fn sc_immune_profile_cellranger() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::sample("count", "Cellranger count").required(),
        StageDescriptor::sample("vdj", "Cellranger vdj"),
        StageDescriptor::cohort("qcsummary", "QC summary analysis"),
    ]
}

fn bam2fastq() -> Vec<StageDescriptor> {
    vec![StageDescriptor::sample("picard", "Picard sam to fastq conversion").required()]
}

fn single_tool_fastq(tool: &str, title: &str) -> Vec<StageDescriptor> {
    let mut stages = pre_alignment(&[tool]);
    stages.push(StageDescriptor::sample(tool, title).required());
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_definition_is_valid() {
        for kind in WorkflowKind::ALL {
            let definition = definition(kind);
            assert_eq!(definition.name(), kind.name());
            assert!(!definition.stages().is_empty(), "{} has no stages", kind);
            definition
                .validate()
                .unwrap_or_else(|e| panic!("{} is invalid: {}", kind, e));
        }
    }

    #[test]
    fn pre_alignment_feeds_every_aligner() {
        for stage in pre_alignment(&["bwa", "novoalign"]) {
            assert!(stage.feeds("bwa") && stage.feeds("novoalign"), "{}", stage.id);
        }
    }

    #[test]
    fn hisat2_conflicts_with_rsem() {
        let rna = definition(WorkflowKind::RnaExpressionFastq);
        let hisat2 = rna.stage("hisat2").unwrap();
        assert!(hisat2.conflicts_with.iter().any(|id| id == "rsem"));
    }
}
