pub mod master;
pub mod stage;

pub use master::MasterScriptBuilder;
pub use stage::stage_script;

use std::{borrow::Cow, fmt};

use crate::line_ending::LineEnding;

pub const SHEBANG: &str = "#!/bin/bash";
/// Shell variable holding the master script's exit status.
pub const STATUS_VAR: &str = "status";
/// Shell array of background units not yet waited on.
pub const JOBS_VAR: &str = "pids";

/// One line of a generated shell script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Command line, emitted as is: `tool arg1 arg2`
    Command(String),
    /// `left && right`: run right only if left succeeds
    AndChain { left: Box<Stmt>, right: Box<Stmt> },
    /// `stmt &`: launch without waiting
    Background(Box<Stmt>),
    /// `pids+=($!)`: track the unit just launched for the next barrier
    TrackJob,
    /// Barrier: wait for every tracked unit, set `status=1` if any failed, forget them
    WaitJobs,
    /// `name=value`
    Assign { name: String, value: String },
    /// `exit "$status"`
    ExitStatus,
    /// `# text`
    Comment(String),
    /// Blank line
    Empty,
}

impl Stmt {
    pub fn command(text: impl Into<String>) -> Self {
        Stmt::Command(text.into())
    }

    /// Invocation of a script path, quoted when needed.
    pub fn invoke(path: &str) -> Self {
        Stmt::Command(quote(path).into_owned())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::Comment(text.into())
    }

    pub fn assign(name: &str, value: impl Into<String>) -> Self {
        Stmt::Assign {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn background(self) -> Self {
        Stmt::Background(Box::new(self))
    }

    /// Folds `stmts` into a left-nested AND chain. `None` when empty.
    pub fn and_chain<I>(stmts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Stmt>,
    {
        stmts.into_iter().reduce(|left, right| Stmt::AndChain {
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Command(text) => write!(f, "{}", text),
            Stmt::AndChain { left, right } => write!(f, "{} && {}", left, right),
            Stmt::Background(inner) => write!(f, "{} &", inner),
            Stmt::TrackJob => write!(f, "{}+=($!)", JOBS_VAR),
            Stmt::WaitJobs => write!(
                f,
                "for pid in \"${{{jobs}[@]}}\"; do wait \"$pid\" || {status}=1; done; {jobs}=()",
                jobs = JOBS_VAR,
                status = STATUS_VAR
            ),
            Stmt::Assign { name, value } => write!(f, "{}={}", name, value),
            Stmt::ExitStatus => write!(f, "exit \"${}\"", STATUS_VAR),
            Stmt::Comment(text) => write!(f, "# {}", text),
            Stmt::Empty => Ok(()),
        }
    }
}

/// An ordered list of statements, rendered one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    stmts: Vec<Stmt>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bash() -> Self {
        let mut script = Self::new();
        script.push(Stmt::command(SHEBANG));
        script
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    pub fn extend<I: IntoIterator<Item = Stmt>>(&mut self, stmts: I) {
        self.stmts.extend(stmts);
    }

    pub fn render(&self, line_ending: LineEnding) -> String {
        let newline = line_ending.as_str();
        let mut text = String::new();
        for stmt in &self.stmts {
            text.push_str(&stmt.to_string());
            text.push_str(newline);
        }
        text
    }
}

/// Single-quotes `word` for the shell unless it only contains safe characters.
pub fn quote(word: &str) -> Cow<'_, str> {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./+:=@%,".contains(c));
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}
