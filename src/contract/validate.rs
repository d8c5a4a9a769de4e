// OutputContract - declared outputs and post-run validation

use super::error::{ContractError, ContractFault};
use super::types::{Artifact, Artifacts, ContentKind, OutputFileRequirement, ParsedContent, Table};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};
use tracing::debug;

/// The set of files one run must produce, keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputContract {
    requirements: BTreeMap<String, ContentKind>,
}

impl OutputContract {
    /// A contract that expects no output files at all
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        requirements: impl IntoIterator<Item = OutputFileRequirement>,
    ) -> Result<Self, ContractError> {
        let mut map = BTreeMap::new();
        for req in requirements {
            let Some(name) = normalize_name(&req.name) else {
                return Err(ContractError::InvalidName(req.name));
            };
            if map.insert(name.clone(), req.kind).is_some() {
                return Err(ContractError::DuplicateOutput(name));
            }
        }
        Ok(Self { requirements: map })
    }

    /// Convenience for the common single-text-file contract
    pub fn single_text(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = normalize_name(&name).unwrap_or(name);
        let mut requirements = BTreeMap::new();
        requirements.insert(name, ContentKind::text());
        Self { requirements }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    pub fn kind_of(&self, name: &str) -> Option<&ContentKind> {
        self.requirements.get(name)
    }

    /// Natural-language description for prompts
    pub fn describe(&self) -> String {
        if self.requirements.is_empty() {
            return "Your code should not create any files.".to_string();
        }

        let items: Vec<String> = self
            .requirements
            .iter()
            .map(|(name, kind)| format!("\"{}\" ({})", name, kind.describe()))
            .collect();

        format!(
            "The output of your code should be exactly the following file(s): {}. \
             Do not create any other files.",
            items.join(", ")
        )
    }

    /// Validate the produced files against the declaration
    ///
    /// `produced` holds paths (relative to `work_dir`) created or modified by the run.
    /// Checks run in order: missing, unexpected, then content. A required file that
    /// exists but was not written by the run counts as missing.
    pub fn validate(
        &self,
        work_dir: &Path,
        produced: &BTreeSet<String>,
    ) -> Result<Artifacts, ContractFault> {
        for name in self.requirements.keys() {
            if !produced.contains(name) || !work_dir.join(name).is_file() {
                return Err(ContractFault::MissingOutput { name: name.clone() });
            }
        }

        if let Some(extra) = produced
            .iter()
            .find(|p| !self.requirements.contains_key(p.as_str()))
        {
            return Err(ContractFault::UnexpectedOutput {
                name: extra.clone(),
            });
        }

        let mut artifacts = Artifacts::new();
        for (name, kind) in &self.requirements {
            let malformed = |reason: String| ContractFault::MalformedOutput {
                name: name.clone(),
                reason,
            };

            let bytes = std::fs::read(work_dir.join(name))
                .map_err(|e| malformed(format!("cannot be read: {e}")))?;
            let raw = String::from_utf8(bytes)
                .map_err(|_| malformed("is not valid UTF-8 text".to_string()))?;
            let parsed = parse_content(&raw, kind).map_err(malformed)?;

            debug!(file = %name, bytes = raw.len(), "output file validated");
            artifacts.insert(name.clone(), Artifact { raw, parsed });
        }

        Ok(artifacts)
    }
}

/// `/`-joined normal components, the form workspace snapshots use
///
/// `None` for names that are empty, absolute or climb out of the work directory.
fn normalize_name(name: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn parse_content(raw: &str, kind: &ContentKind) -> Result<ParsedContent, String> {
    match kind {
        ContentKind::Text { max_chars } => {
            let chars = raw.chars().count();
            match max_chars {
                Some(max) if chars > *max => Err(format!(
                    "has {chars} characters, the limit is {max}"
                )),
                _ => Ok(ParsedContent::Text),
            }
        }
        ContentKind::Json => serde_json::from_str(raw)
            .map(ParsedContent::Json)
            .map_err(|e| format!("is not valid JSON: {e}")),
        ContentKind::Table { columns } => parse_table(raw, columns).map(ParsedContent::Table),
    }
}

fn parse_table(raw: &str, columns: &[String]) -> Result<Table, String> {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or_else(|| "is empty".to_string())?;
    let header = split_row(header);
    if header != columns {
        return Err(format!(
            "header is `{}`, expected `{}`",
            header.join(","),
            columns.join(",")
        ));
    }

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let row = split_row(line);
        if row.len() != columns.len() {
            return Err(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                columns.len()
            ));
        }
        rows.push(row);
    }

    Ok(Table {
        columns: columns.to_vec(),
        rows,
    })
}

/// Split one comma-separated row, honouring double-quoted fields
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn produced(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_text_output_validates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "hello").unwrap();

        let contract = OutputContract::single_text("out.txt");
        let artifacts = contract
            .validate(dir.path(), &produced(&["out.txt"]))
            .unwrap();
        assert_eq!(artifacts["out.txt"].as_str(), "hello");
        assert_eq!(artifacts["out.txt"].parsed, ParsedContent::Text);
    }

    #[test]
    fn test_missing_is_reported_before_unexpected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wrong.txt"), "hello").unwrap();

        let contract = OutputContract::single_text("out.txt");
        let fault = contract
            .validate(dir.path(), &produced(&["wrong.txt"]))
            .unwrap_err();
        assert_eq!(
            fault,
            ContractFault::MissingOutput {
                name: "out.txt".into()
            }
        );
    }

    #[test]
    fn test_unexpected_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "hello").unwrap();
        fs::write(dir.path().join("extra.txt"), "x").unwrap();

        let contract = OutputContract::single_text("out.txt");
        let fault = contract
            .validate(dir.path(), &produced(&["extra.txt", "out.txt"]))
            .unwrap_err();
        assert_eq!(
            fault,
            ContractFault::UnexpectedOutput {
                name: "extra.txt".into()
            }
        );
    }

    #[test]
    fn test_text_limit_and_utf8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "abcdef").unwrap();
        fs::write(dir.path().join("bin.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let contract = OutputContract::new([OutputFileRequirement::new(
            "out.txt",
            ContentKind::Text { max_chars: Some(3) },
        )])
        .unwrap();
        let fault = contract
            .validate(dir.path(), &produced(&["out.txt"]))
            .unwrap_err();
        assert!(matches!(fault, ContractFault::MalformedOutput { ref reason, .. } if reason.contains("limit is 3")));

        let contract = OutputContract::single_text("bin.txt");
        let fault = contract
            .validate(dir.path(), &produced(&["bin.txt"]))
            .unwrap_err();
        assert!(matches!(fault, ContractFault::MalformedOutput { ref reason, .. } if reason.contains("UTF-8")));
    }

    #[test]
    fn test_json_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.json"), r#"{"n": 3}"#).unwrap();
        fs::write(dir.path().join("bad.json"), "{n: 3").unwrap();

        let good = OutputContract::new([OutputFileRequirement::new("good.json", ContentKind::Json)])
            .unwrap();
        let artifacts = good.validate(dir.path(), &produced(&["good.json"])).unwrap();
        assert_eq!(
            artifacts["good.json"].parsed,
            ParsedContent::Json(serde_json::json!({"n": 3}))
        );

        let bad = OutputContract::new([OutputFileRequirement::new("bad.json", ContentKind::Json)])
            .unwrap();
        let fault = bad.validate(dir.path(), &produced(&["bad.json"])).unwrap_err();
        assert!(matches!(fault, ContractFault::MalformedOutput { .. }));
    }

    #[test]
    fn test_table_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("t.csv"),
            "group,mean\n\"a, b\",1.5\nc,2\n",
        )
        .unwrap();
        fs::write(dir.path().join("ragged.csv"), "group,mean\nx\n").unwrap();

        let kind = ContentKind::Table {
            columns: vec!["group".into(), "mean".into()],
        };
        let contract =
            OutputContract::new([OutputFileRequirement::new("t.csv", kind.clone())]).unwrap();
        let artifacts = contract.validate(dir.path(), &produced(&["t.csv"])).unwrap();
        match &artifacts["t.csv"].parsed {
            ParsedContent::Table(table) => {
                assert_eq!(table.rows.len(), 2);
                assert_eq!(table.rows[0][0], "a, b");
            }
            other => panic!("expected table, got {:?}", other),
        }

        let contract = OutputContract::new([OutputFileRequirement::new("ragged.csv", kind)]).unwrap();
        let fault = contract
            .validate(dir.path(), &produced(&["ragged.csv"]))
            .unwrap_err();
        assert!(matches!(fault, ContractFault::MalformedOutput { ref reason, .. } if reason.contains("row 1")));
    }

    #[test]
    fn test_table_header_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("t.csv"), "a,c\n1,2\n").unwrap();
        let contract = OutputContract::new([OutputFileRequirement::new(
            "t.csv",
            ContentKind::Table {
                columns: vec!["a".into(), "b".into()],
            },
        )])
        .unwrap();
        let fault = contract.validate(dir.path(), &produced(&["t.csv"])).unwrap_err();
        assert!(matches!(fault, ContractFault::MalformedOutput { ref reason, .. } if reason.contains("header")));
    }

    #[test]
    fn test_declaration_errors() {
        let dup = OutputContract::new([
            OutputFileRequirement::text("a.txt"),
            OutputFileRequirement::text("a.txt"),
        ]);
        assert!(matches!(dup, Err(ContractError::DuplicateOutput(_))));

        let escape = OutputContract::new([OutputFileRequirement::text("../a.txt")]);
        assert!(matches!(escape, Err(ContractError::InvalidName(_))));

        let bare = OutputContract::new([OutputFileRequirement::text("./")]);
        assert!(matches!(bare, Err(ContractError::InvalidName(_))));

        let same = OutputContract::new([
            OutputFileRequirement::text("./a.txt"),
            OutputFileRequirement::text("a.txt"),
        ]);
        assert!(matches!(same, Err(ContractError::DuplicateOutput(ref n)) if n == "a.txt"));
    }

    #[test]
    fn test_dot_prefixed_names_match_snapshot_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("out.txt"), "hello").unwrap();
        fs::write(dir.path().join("sub/t.txt"), "x").unwrap();

        let contract = OutputContract::new([
            OutputFileRequirement::text("./out.txt"),
            OutputFileRequirement::text("sub/./t.txt"),
        ])
        .unwrap();
        assert_eq!(contract.names().collect::<Vec<_>>(), vec!["out.txt", "sub/t.txt"]);

        let artifacts = contract
            .validate(dir.path(), &produced(&["out.txt", "sub/t.txt"]))
            .unwrap();
        assert_eq!(artifacts["out.txt"].as_str(), "hello");
        let single = OutputContract::single_text("./out.txt");
        assert_eq!(single.kind_of("out.txt"), Some(&ContentKind::text()));
    }

    #[test]
    fn test_untouched_input_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();

        let contract = OutputContract::single_text("data.csv");
        let fault = contract.validate(dir.path(), &produced(&[])).unwrap_err();
        assert_eq!(
            fault,
            ContractFault::MissingOutput {
                name: "data.csv".into()
            }
        );
        assert!(contract.validate(dir.path(), &produced(&["data.csv"])).is_ok());
    }

    #[test]
    fn test_describe_mentions_every_file() {
        let contract = OutputContract::new([
            OutputFileRequirement::text("b.txt"),
            OutputFileRequirement::new("a.json", ContentKind::Json),
        ])
        .unwrap();
        let text = contract.describe();
        assert!(text.contains("\"a.json\" (a JSON file)"));
        assert!(text.contains("\"b.txt\" (a text file)"));
        assert!(OutputContract::empty().describe().contains("not create any files"));
    }
}
