use crate::core::errors::{LocportError, Result};
use serde::{Deserialize, Serialize};

/// One unit of work: a single localization file to import into the shared
/// project. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTask {
    /// Source file path; doubles as the task identifier in logs and results.
    pub path: String,
    /// Project identifier shared by every task in the run.
    pub project: String,
}

impl ImportTask {
    pub fn new(path: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            project: project.into(),
        }
    }

    /// Task identifier used for output prefixing and result attribution.
    pub fn id(&self) -> &str {
        &self.path
    }
}

/// Build one task per source path, preserving input order.
///
/// Validation happens here, before any process is spawned: the path list must
/// be non-empty and the project identifier must not be blank.
pub fn plan_tasks<I, S>(source_paths: I, project: &str) -> Result<Vec<ImportTask>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    if project.trim().is_empty() {
        return Err(LocportError::validation_field(
            "project identifier must not be blank",
            "project",
        ));
    }

    let tasks: Vec<ImportTask> = source_paths
        .into_iter()
        .map(|p| ImportTask::new(p, project))
        .collect();

    if tasks.is_empty() {
        return Err(LocportError::validation_field(
            "source path list must not be empty",
            "source_paths",
        ));
    }

    Ok(tasks)
}

/// Describes how to invoke the external import tool for one task.
///
/// The argument vector is handed to the OS process-creation primitive as-is;
/// no shell is involved, so paths with whitespace need no escaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Program to execute
    pub program: String,
    /// Flags passed before the project/path pair
    pub fixed_flags: Vec<String>,
    /// Flag preceding the project identifier, if the tool takes one
    pub project_flag: Option<String>,
    /// Flag preceding the task's source path, if the tool takes one
    pub path_flag: Option<String>,
}

impl ToolSpec {
    /// The stock Apple import tool:
    /// `xcodebuild -importLocalizations -project <project> -localizationPath <path>`
    pub fn xcodebuild() -> Self {
        Self {
            program: "xcodebuild".to_string(),
            fixed_flags: vec!["-importLocalizations".to_string()],
            project_flag: Some("-project".to_string()),
            path_flag: Some("-localizationPath".to_string()),
        }
    }

    /// An arbitrary program taking `<fixed-flags> <project> <path>` positionally.
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            fixed_flags: Vec::new(),
            project_flag: None,
            path_flag: None,
        }
    }

    pub fn with_fixed_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Full argument vector for one task's invocation.
    pub fn args_for(&self, task: &ImportTask) -> Vec<String> {
        let mut args = self.fixed_flags.clone();
        if let Some(flag) = &self.project_flag {
            args.push(flag.clone());
        }
        args.push(task.project.clone());
        if let Some(flag) = &self.path_flag {
            args.push(flag.clone());
        }
        args.push(task.path.clone());
        args
    }
}

impl Default for ToolSpec {
    fn default() -> Self {
        Self::xcodebuild()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tasks_preserves_order() {
        let tasks = plan_tasks(vec!["b.xliff", "a.xliff", "c.xliff"], "MyProj").unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["b.xliff", "a.xliff", "c.xliff"]);
        assert!(tasks.iter().all(|t| t.project == "MyProj"));
    }

    #[test]
    fn test_plan_tasks_rejects_empty_paths() {
        let err = plan_tasks(Vec::<String>::new(), "MyProj").unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_plan_tasks_rejects_blank_project() {
        let err = plan_tasks(vec!["a.xliff"], "   ").unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_xcodebuild_args() {
        let task = ImportTask::new("ja.xliff", "MyApp.xcodeproj");
        let args = ToolSpec::xcodebuild().args_for(&task);
        assert_eq!(
            args,
            vec![
                "-importLocalizations",
                "-project",
                "MyApp.xcodeproj",
                "-localizationPath",
                "ja.xliff",
            ]
        );
    }

    #[test]
    fn test_positional_args_keep_whitespace_intact() {
        // Argument boundaries come from the argv vector, so a path with
        // spaces stays one argument.
        let task = ImportTask::new("translations/ja JP.xliff", "MyApp");
        let args = ToolSpec::program("import-tool")
            .with_fixed_flags(vec!["--quiet"])
            .args_for(&task);
        assert_eq!(args, vec!["--quiet", "MyApp", "translations/ja JP.xliff"]);
    }
}
