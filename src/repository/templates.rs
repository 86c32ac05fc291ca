use super::{Repositories, Template, DEFAULT_REPOSITORY};
use crate::error::{FunctionError, Result};
use crate::function::{Function, DEFAULT_TEMPLATE};

/// Split `repo/template` into its parts; an unprefixed name has no
/// repository
pub fn split_template_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((repo, template)) if !repo.is_empty() => (Some(repo), template),
        Some((_, template)) => (None, template),
        None => (None, name),
    }
}

/// Template lookup across a set of repositories
#[derive(Debug, Clone)]
pub struct Templates {
    repositories: Repositories,
}

impl Templates {
    pub fn new(repositories: Repositories) -> Self {
        Self { repositories }
    }

    /// Template names for `runtime`: the default repository's unprefixed
    /// and sorted, followed by the others as `repo/name`, sorted.
    pub fn list(&self, runtime: &str) -> Result<Vec<String>> {
        let mut found = false;
        let mut defaults = Vec::new();
        let mut extended = Vec::new();
        for repo in self.repositories.all()? {
            if repo.runtime(runtime).is_some() {
                found = true;
            }
            for template in repo.templates(runtime) {
                if repo.name == DEFAULT_REPOSITORY {
                    defaults.push(template.name.clone());
                } else {
                    extended.push(template.fullname());
                }
            }
        }
        if !found {
            return Err(FunctionError::RuntimeNotFound(runtime.to_string()));
        }
        defaults.sort();
        extended.sort();
        defaults.extend(extended);
        Ok(defaults)
    }

    /// Resolve `name` (optionally `repo/name`) for `runtime`. Unprefixed
    /// names are searched in the default repository first, then the others
    /// in name order.
    pub fn get(&self, runtime: &str, name: &str) -> Result<Template> {
        let (repository, template) = split_template_name(name);
        if let Some(repository) = repository {
            return self
                .repositories
                .get(repository)?
                .template(runtime, template)
                .cloned();
        }

        let mut runtime_found = false;
        for repo in self.repositories.all()? {
            match repo.template(runtime, template) {
                Ok(t) => return Ok(t.clone()),
                Err(FunctionError::TemplateNotFound { .. }) => runtime_found = true,
                Err(_) => {}
            }
        }
        if runtime_found {
            Err(FunctionError::TemplateNotFound {
                runtime: runtime.to_string(),
                template: name.to_string(),
            })
        } else {
            Err(FunctionError::RuntimeNotFound(runtime.to_string()))
        }
    }

    /// Write the function's template (default `http`) into its root
    pub fn write(&self, f: &mut Function) -> Result<()> {
        if f.runtime.is_empty() {
            return Err(FunctionError::RuntimeRequired);
        }
        let name = if f.template.is_empty() {
            DEFAULT_TEMPLATE.to_string()
        } else {
            f.template.clone()
        };
        self.get(&f.runtime, &name)?.write(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_template(base: &Path, repo: &str, runtime: &str, template: &str, file: &str) {
        let dir = base.join(repo).join(runtime).join(template);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), template).unwrap();
    }

    fn templates(dir: &TempDir) -> Templates {
        Templates::new(Repositories::new(Some(dir.path().to_path_buf()), None))
    }

    #[test]
    fn test_split_template_name() {
        assert_eq!(split_template_name("http"), (None, "http"));
        assert_eq!(split_template_name("extra/grpc"), (Some("extra"), "grpc"));
        assert_eq!(split_template_name("/http"), (None, "http"));
    }

    #[test]
    fn test_list_default_first() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "extra", "go", "grpc", "main.go");
        let names = templates(&dir).list("go").unwrap();
        assert_eq!(names.first().map(String::as_str), Some("cloudevents"));
        assert_eq!(names.last().map(String::as_str), Some("extra/grpc"));
        assert!(names.contains(&"http".to_string()));
    }

    #[test]
    fn test_get_distinguishes_runtime_and_template() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "extra", "perl", "http", "main.pl");
        let t = templates(&dir);

        assert!(matches!(
            t.get("cobol", "http"),
            Err(FunctionError::RuntimeNotFound(_))
        ));
        assert!(matches!(
            t.get("go", "grpc"),
            Err(FunctionError::TemplateNotFound { .. })
        ));
        assert_eq!(t.get("perl", "http").unwrap().repository, "extra");
        assert_eq!(t.get("go", "http").unwrap().repository, "default");
        assert!(matches!(
            t.get("go", "nope/http"),
            Err(FunctionError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_write_prefixed_template() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "extra", "go", "grpc", "server.go");
        let root = TempDir::new().unwrap();
        let mut f = Function {
            root: root.path().to_path_buf(),
            runtime: "go".into(),
            template: "extra/grpc".into(),
            ..Default::default()
        };
        templates(&dir).write(&mut f).unwrap();
        assert!(root.path().join("server.go").exists());
    }

    #[test]
    fn test_write_requires_runtime() {
        let dir = TempDir::new().unwrap();
        let mut f = Function::default();
        assert!(matches!(
            templates(&dir).write(&mut f),
            Err(FunctionError::RuntimeRequired)
        ));
    }
}
