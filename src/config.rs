use std::{
    collections::{BTreeMap, HashMap, HashSet},
    env, fmt, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::{PipegenError, Result},
    line_ending::LineEnding,
    queue::{DEFAULT_POLL_TIMEOUT, DEFAULT_SUBMIT_COMMAND, QueueSettings},
    task::{Sample, TemplateCommandSource, source::StageTemplate},
    util::parse_duration,
    workflow::WorkflowKind,
};

static BRACED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());
static ANY_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap()
});
static SAMPLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

#[derive(Debug, Deserialize)]
struct Config {
    pipeline: PipelineSection,
    #[serde(default)]
    queue: QueueSection,
    #[serde(default)]
    variables: HashMap<String, String>,
    #[serde(default, rename = "sample")]
    samples: Vec<SampleSection>,
    #[serde(default, rename = "stage")]
    stages: HashMap<String, StageTemplate>,
}

#[derive(Debug, Deserialize)]
struct PipelineSection {
    workflow: String,
    #[serde(default)]
    toolset: Vec<String>,
    output_dir: Option<String>,
    #[serde(default)]
    cluster: bool,
    status_check_period: Option<u64>,
    poll_timeout: Option<String>,
    line_ending: Option<LineEnding>,
    launch_timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QueueSection {
    submit: Option<String>,
    queue: Option<String>,
    pe: Option<String>,
    threads: Option<u32>,
    max_mem: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SampleSection {
    id: String,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Stage scripts run as background processes of the master script.
    #[default]
    Local,
    /// Stage scripts are submitted to a job queue through wrapper scripts.
    Cluster,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => f.write_str("local"),
            ExecutionMode::Cluster => f.write_str("cluster"),
        }
    }
}

/// Everything one build needs apart from the command source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub workflow: WorkflowKind,
    pub toolset: Vec<String>,
    pub output_dir: PathBuf,
    pub mode: ExecutionMode,
    pub queue: QueueSettings,
    pub line_ending: LineEnding,
    pub samples: Vec<Sample>,
}

impl BuildConfig {
    pub fn new(workflow: WorkflowKind, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            workflow,
            toolset: Vec::new(),
            output_dir: output_dir.into(),
            mode: ExecutionMode::Local,
            queue: QueueSettings::default(),
            line_ending: LineEnding::Lf,
            samples: Vec::new(),
        }
    }

    pub fn with_toolset(mut self, toolset: &[&str]) -> Self {
        self.toolset = toolset.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug)]
pub struct PipelineConfiguration {
    pub build: BuildConfig,
    pub commands: TemplateCommandSource,
    pub launch_timeout: Option<String>,
}

pub fn load_config(config_path: &str) -> Result<PipelineConfiguration> {
    let contents = fs::read_to_string(config_path)?;
    let base_dir = Path::new(config_path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parse_config(&contents, base_dir)
}

/// Parses configuration text. Relative output directories are resolved against `base_dir`.
pub fn parse_config(contents: &str, base_dir: &Path) -> Result<PipelineConfiguration> {
    let config: Config = toml::from_str(contents)?;
    process_config(config, base_dir)
}

fn process_config(config: Config, base_dir: &Path) -> Result<PipelineConfiguration> {
    let pipeline = config.pipeline;
    let workflow: WorkflowKind = pipeline.workflow.parse()?;

    let mut variables = config.variables;
    add_builtin_variables(&mut variables);

    let output_dir = substitute_variables(
        pipeline.output_dir.as_deref().unwrap_or("output"),
        &variables,
    );
    let output_dir = resolve_output_dir(Path::new(&output_dir), base_dir)?;
    variables.insert("out".to_string(), output_dir.to_string_lossy().into_owned());

    let poll_timeout = parse_duration(pipeline.poll_timeout.as_deref(), "poll_timeout")?
        .unwrap_or(DEFAULT_POLL_TIMEOUT);
    if pipeline.status_check_period == Some(0) {
        debug!("status_check_period is 0, queue polling disabled");
    }
    if let Some(launch_timeout) = pipeline.launch_timeout.as_deref() {
        parse_duration(Some(launch_timeout), "launch_timeout")?;
    }

    let queue = QueueSettings {
        submit_command: config
            .queue
            .submit
            .map(|submit| substitute_variables(&submit, &variables))
            .unwrap_or_else(|| DEFAULT_SUBMIT_COMMAND.to_string()),
        queue: config.queue.queue,
        parallel_env: config.queue.pe,
        threads: config.queue.threads,
        max_mem: config.queue.max_mem,
        status_check_period: pipeline.status_check_period.filter(|&period| period > 0),
        poll_timeout,
    };
    validate_queue(&queue)?;

    let samples = process_samples(config.samples, &variables)?;

    let known: HashSet<&str> = workflow
        .definition()
        .stages()
        .iter()
        .map(|stage| stage.id.as_str())
        .collect();
    for stage in config.stages.keys() {
        if !known.contains(stage.as_str()) {
            warn!(
                "Template for stage '{}' is ignored, workflow '{}' has no such stage",
                stage, workflow
            );
        }
    }

    let build = BuildConfig {
        workflow,
        toolset: pipeline.toolset,
        output_dir,
        mode: if pipeline.cluster {
            ExecutionMode::Cluster
        } else {
            ExecutionMode::Local
        },
        queue,
        line_ending: pipeline.line_ending.unwrap_or_default(),
        samples,
    };

    Ok(PipelineConfiguration {
        build,
        commands: TemplateCommandSource::new(variables, config.stages),
        launch_timeout: pipeline.launch_timeout,
    })
}

fn resolve_output_dir(output_dir: &Path, base_dir: &Path) -> Result<PathBuf> {
    let joined = if output_dir.is_absolute() {
        output_dir.to_path_buf()
    } else {
        base_dir.join(output_dir)
    };
    Ok(std::path::absolute(joined)?)
}

fn validate_queue(queue: &QueueSettings) -> Result<()> {
    if queue.submit_command.trim().is_empty() {
        return Err(PipegenError::Config(
            "queue submit command cannot be empty".to_string(),
        ));
    }
    if queue.threads == Some(0) {
        return Err(PipegenError::Config(
            "queue threads must be at least 1".to_string(),
        ));
    }
    if queue.threads.is_some() && queue.parallel_env.is_none() {
        warn!("Queue threads are set without a parallel environment (pe) and will be ignored");
    }
    Ok(())
}

fn process_samples(
    sections: Vec<SampleSection>,
    variables: &HashMap<String, String>,
) -> Result<Vec<Sample>> {
    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(sections.len());

    for section in sections {
        let id = section.id.trim().to_string();
        if !SAMPLE_NAME.is_match(&id) {
            return Err(PipegenError::Config(format!(
                "invalid sample name '{}': use letters, digits, '.', '_' and '-'",
                section.id
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(PipegenError::Config(format!(
                "sample '{}' is listed more than once",
                id
            )));
        }

        let variables = section
            .variables
            .into_iter()
            .map(|(key, value)| {
                let value = substitute_variables(&value, variables);
                (key, value)
            })
            .collect();

        samples.push(Sample { id, variables });
    }

    Ok(samples)
}

fn add_builtin_variables(variables: &mut HashMap<String, String>) {
    for (key, value) in env::vars() {
        variables.insert(format!("ENV_{}", key), value);
    }

    if let Ok(pwd) = env::current_dir() {
        variables.insert("PWD".to_string(), pwd.to_string_lossy().to_string());
    }
}

/// Replaces `${VAR}` and `$VAR` references with known variables, leaving unknown ones
/// untouched. Substituted values are not expanded again. Builtins such as `$PWD` are
/// known variables, so they take their build-time value rather than the shell's.
pub fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    ANY_VARIABLE
        .replace_all(text, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            variables
                .get(name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// First `${VAR}` reference left in `text`, if any.
pub fn unresolved_variable(text: &str) -> Option<String> {
    BRACED_VARIABLE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[pipeline]
workflow = "RnaExpression_Fastq"
toolset = ["star", "rsem"]
output_dir = "/data/run1"

[variables]
ref = "/ref"

[[sample]]
id = "A"
variables = { fastq1 = "${ref}/A_R1.fq.gz" }

[stage.star]
command = "STAR --readFilesIn ${fastq1}"
"#;

    #[test]
    fn parses_minimal_configuration() {
        let config = parse_config(MINIMAL, Path::new("/tmp")).unwrap();
        let build = config.build;

        assert_eq!(build.workflow, WorkflowKind::RnaExpressionFastq);
        assert_eq!(build.toolset, ["star", "rsem"]);
        assert_eq!(build.output_dir, PathBuf::from("/data/run1"));
        assert_eq!(build.mode, ExecutionMode::Local);
        assert_eq!(build.line_ending, LineEnding::Lf);
        assert_eq!(build.queue.poll_timeout, DEFAULT_POLL_TIMEOUT);
        assert_eq!(build.queue.status_check_period, None);
        assert_eq!(build.samples[0].variables["fastq1"], "/ref/A_R1.fq.gz");
        assert!(config.commands.has_template("star"));
    }

    #[test]
    fn relative_output_dir_is_resolved_against_base() {
        let text = MINIMAL.replace("/data/run1", "out");
        let config = parse_config(&text, Path::new("/srv/project")).unwrap();
        assert_eq!(config.build.output_dir, PathBuf::from("/srv/project/out"));
    }

    #[test]
    fn unknown_workflow_is_rejected() {
        let text = MINIMAL.replace("RnaExpression_Fastq", "Rna_Unknown");
        let err = parse_config(&text, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, PipegenError::UnknownWorkflow(name) if name == "Rna_Unknown"));
    }

    #[test]
    fn duplicate_sample_is_rejected() {
        let text = format!("{}\n[[sample]]\nid = \"A\"\n", MINIMAL);
        let err = parse_config(&text, Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn sample_name_with_spaces_is_rejected() {
        let text = MINIMAL.replace("id = \"A\"", "id = \"A B\"");
        let err = parse_config(&text, Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("invalid sample name"));
    }

    #[test]
    fn queue_and_polling_settings_are_read() {
        let text = MINIMAL.replace(
            "output_dir = \"/data/run1\"",
            "output_dir = \"/data/run1\"\ncluster = true\nstatus_check_period = 30\npoll_timeout = \"2h\"\nline_ending = \"crlf\"\n\n[queue]\nqueue = \"all.q\"\npe = \"smp\"\nthreads = 4",
        );
        let build = parse_config(&text, Path::new("/tmp")).unwrap().build;

        assert_eq!(build.mode, ExecutionMode::Cluster);
        assert_eq!(build.line_ending, LineEnding::Crlf);
        assert_eq!(build.queue.status_check_period, Some(30));
        assert_eq!(build.queue.max_checks(), Some(240));
        assert_eq!(build.queue.queue.as_deref(), Some("all.q"));
        assert_eq!(build.queue.threads, Some(4));
    }

    #[test]
    fn substitution_handles_braced_and_simple_forms() {
        let variables = HashMap::from([("name".to_string(), "value".to_string())]);
        assert_eq!(
            substitute_variables("${name}/$name/${other}/$other", &variables),
            "value/value/${other}/$other"
        );
        assert_eq!(unresolved_variable("a ${other} b"), Some("other".to_string()));
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let variables = HashMap::from([
            ("filter".to_string(), "$HOME/${name}".to_string()),
            ("HOME".to_string(), "/build/home".to_string()),
            ("name".to_string(), "value".to_string()),
        ]);
        assert_eq!(
            substitute_variables("--filter ${filter} --home $HOME", &variables),
            "--filter $HOME/${name} --home /build/home"
        );
    }
}
