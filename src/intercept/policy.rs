// Interception policy - declarative rules resolved against a call surface

use super::error::Result;
use super::surface::{CallSurface, CallableMeta};
use crate::issues::PatternRule;
use crate::sandbox::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Predicate over a callable's name and documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPredicate {
    /// Documentation mentions the phrase (case-insensitive)
    DocMentions(String),
    /// Short name or full path equals the value
    NameIs(String),
    /// Short name starts with the value
    NamePrefix(String),
    AnyOf(Vec<MetadataPredicate>),
    AllOf(Vec<MetadataPredicate>),
}

impl MetadataPredicate {
    pub fn matches(&self, meta: &CallableMeta) -> bool {
        match self {
            Self::DocMentions(phrase) => meta
                .doc
                .to_lowercase()
                .contains(&phrase.to_lowercase()),
            Self::NameIs(name) => meta.name() == name || meta.path == *name,
            Self::NamePrefix(prefix) => meta.name().starts_with(prefix.as_str()),
            Self::AnyOf(preds) => preds.iter().any(|p| p.matches(meta)),
            Self::AllOf(preds) => preds.iter().all(|p| p.matches(meta)),
        }
    }
}

/// Forbid every callable in `modules` matching `predicate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceRule {
    pub modules: Vec<String>,
    pub predicate: MetadataPredicate,
}

/// Tag named result fields of every callable in `modules` matching `predicate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub modules: Vec<String>,
    pub predicate: MetadataPredicate,
    pub fields: Vec<String>,
    pub tag: String,
}

/// Policy as written in `policy.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub forbid_rules: Vec<SurfaceRule>,
    #[serde(default)]
    pub tag_rules: Vec<TagRule>,
    #[serde(default)]
    pub issue_rules: Vec<PatternRule>,
}

impl PolicySpec {
    /// Built-in policy: interactive, process-exiting and cwd-changing calls are forbidden
    pub fn defaults_for(dialect: &Dialect) -> Self {
        match dialect {
            Dialect::Python { .. } => Self {
                forbidden: [
                    "input",
                    "breakpoint",
                    "help",
                    "exit",
                    "quit",
                    "os.chdir",
                    "os.system",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                forbid_rules: Vec::new(),
                tag_rules: vec![TagRule {
                    modules: vec!["scipy.stats".to_string()],
                    predicate: MetadataPredicate::DocMentions("p-value".to_string()),
                    fields: vec!["pvalue".to_string()],
                    tag: "PValue".to_string(),
                }],
                issue_rules: Vec::new(),
            },
            Dialect::Shell { .. } => Self {
                forbidden: vec!["read".to_string(), "cd".to_string()],
                ..Self::default()
            },
        }
    }

    /// Load from a TOML file, falling back to the dialect defaults when it is missing
    pub fn load(path: &Path, dialect: &Dialect) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "policy file not found, using default policy");
            return Ok(Self::defaults_for(dialect));
        }

        let content = std::fs::read_to_string(path)?;
        let spec: Self = toml::from_str(&content)?;

        debug!(
            path = %path.display(),
            forbidden = spec.forbidden.len(),
            forbid_rules = spec.forbid_rules.len(),
            tag_rules = spec.tag_rules.len(),
            issue_rules = spec.issue_rules.len(),
            "loaded policy from file"
        );
        Ok(spec)
    }

    /// Expand rules over the surface into a concrete policy
    pub async fn resolve(&self, surface: &dyn CallSurface) -> Result<InterceptPolicy> {
        let mut policy = InterceptPolicy::new();
        for symbol in &self.forbidden {
            policy.forbidden.insert(symbol.clone());
        }

        for rule in &self.forbid_rules {
            for meta in surface.callables(&rule.modules).await? {
                if rule.predicate.matches(&meta) {
                    policy.forbidden.insert(meta.path);
                }
            }
        }

        for rule in &self.tag_rules {
            for meta in surface.callables(&rule.modules).await? {
                if rule.predicate.matches(&meta) {
                    policy.tagged.push(TaggedCallable {
                        path: meta.path,
                        fields: rule.fields.clone(),
                        tag: rule.tag.clone(),
                    });
                }
            }
        }

        policy.issue_rules = self.issue_rules.clone();

        info!(
            forbidden = policy.forbidden.len(),
            tagged = policy.tagged.len(),
            "interception policy resolved"
        );
        Ok(policy)
    }
}

/// A callable whose results get tagged fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedCallable {
    pub path: String,
    pub fields: Vec<String>,
    pub tag: String,
}

/// Resolved policy handed to the interceptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptPolicy {
    pub forbidden: BTreeSet<String>,
    pub tagged: Vec<TaggedCallable>,
    pub issue_rules: Vec<PatternRule>,
}

impl InterceptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forbid(mut self, symbol: impl Into<String>) -> Self {
        self.forbidden.insert(symbol.into());
        self
    }

    pub fn tag(mut self, callable: TaggedCallable) -> Self {
        self.tagged.push(callable);
        self
    }

    pub fn is_forbidden(&self, symbol: &str) -> bool {
        self.forbidden.contains(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::surface::StaticSurface;

    fn surface() -> StaticSurface {
        StaticSurface::new(vec![
            CallableMeta::new("stats.ttest", "Run a t-test. Returns statistic and p-value."),
            CallableMeta::new("stats.describe", "Summary statistics."),
            CallableMeta::new("net.fetch_url", "Download a page."),
            CallableMeta::new("net.fetch_file", "Download a file."),
        ])
    }

    #[tokio::test]
    async fn test_resolve_expands_rules() {
        let spec = PolicySpec {
            forbidden: vec!["input".into()],
            forbid_rules: vec![SurfaceRule {
                modules: vec!["net".into()],
                predicate: MetadataPredicate::NamePrefix("fetch_".into()),
            }],
            tag_rules: vec![TagRule {
                modules: vec!["stats".into()],
                predicate: MetadataPredicate::DocMentions("P-VALUE".into()),
                fields: vec!["pvalue".into()],
                tag: "PValue".into(),
            }],
            issue_rules: Vec::new(),
        };

        let policy = spec.resolve(&surface()).await.unwrap();
        assert!(policy.is_forbidden("input"));
        assert!(policy.is_forbidden("net.fetch_url"));
        assert!(policy.is_forbidden("net.fetch_file"));
        assert!(!policy.is_forbidden("stats.ttest"));
        assert_eq!(policy.tagged.len(), 1);
        assert_eq!(policy.tagged[0].path, "stats.ttest");
    }

    #[test]
    fn test_combinators() {
        let meta = CallableMeta::new("net.fetch_url", "Download a page.");
        let both = MetadataPredicate::AllOf(vec![
            MetadataPredicate::NamePrefix("fetch".into()),
            MetadataPredicate::DocMentions("page".into()),
        ]);
        assert!(both.matches(&meta));
        let either = MetadataPredicate::AnyOf(vec![
            MetadataPredicate::NameIs("other".into()),
            MetadataPredicate::NameIs("net.fetch_url".into()),
        ]);
        assert!(either.matches(&meta));
    }

    #[test]
    fn test_parse_toml() {
        let spec: PolicySpec = toml::from_str(
            r#"
            forbidden = ["input", "os.system"]

            [[tag_rules]]
            modules = ["scipy.stats"]
            predicate = { any_of = [{ doc_mentions = "p-value" }, { name_prefix = "ttest" }] }
            fields = ["pvalue"]
            tag = "PValue"

            [[issue_rules]]
            code = "absolute_path"
            stream = "stdout"
            pattern = "/home/"
            explanation = "Avoid absolute paths"
            "#,
        )
        .unwrap();
        assert_eq!(spec.forbidden.len(), 2);
        assert_eq!(spec.tag_rules[0].tag, "PValue");
        assert_eq!(spec.issue_rules[0].code, "absolute_path");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let spec =
            PolicySpec::load(Path::new("/nonexistent/policy.toml"), &Dialect::shell()).unwrap();
        assert_eq!(spec, PolicySpec::defaults_for(&Dialect::shell()));
    }
}
