//! Runs the JSON fixtures under `fixtures/` against the document factory.
//!
//! Each fixture holds a document description and what building it must
//! produce: the set of own type names, an error message pattern, or field
//! types that must be the very same data type as a named one.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use api_typegraph::{DocumentDescription, DocumentFactory, DocumentInit, TypeBody};
use colored::Colorize;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    document: serde_json::Value,
    expect: Expectation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Expectation {
    types: Option<Vec<String>>,
    error_pattern: Option<String>,
    field_identity: Vec<FieldIdentity>,
}

#[derive(Debug, Deserialize)]
struct FieldIdentity {
    #[serde(rename = "type")]
    owner: String,
    field: String,
    target: String,
}

fn main() -> ExitCode {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let fixtures = match fixture_paths(&dir) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("cannot list {}: {error}", dir.display());
            return ExitCode::FAILURE;
        }
    };
    let factory = DocumentFactory::new();
    let mut failed = 0;
    for path in &fixtures {
        match run_fixture(&factory, path) {
            Ok(name) => eprintln!("{} {name}", "✓".green()),
            Err(reason) => {
                failed += 1;
                eprintln!("{} {}: {reason}", "✗".red(), path.display());
            }
        }
    }
    let summary = format!("{} fixtures, {failed} failed", fixtures.len());
    if failed == 0 {
        eprintln!("{}", summary.green());
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", summary.red().bold());
        ExitCode::FAILURE
    }
}

fn fixture_paths(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let pattern = dir.join("*.json");
    let pattern = pattern.to_str().ok_or("fixture directory is not valid UTF-8")?;
    let mut paths = glob::glob(pattern)
        .map_err(|error| error.to_string())?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.to_string())?;
    paths.sort();
    Ok(paths)
}

fn run_fixture(factory: &DocumentFactory, path: &Path) -> Result<String, String> {
    let source = std::fs::read_to_string(path).map_err(|error| error.to_string())?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    let fixture: Fixture = serde_path_to_error::deserialize(de)
        .map_err(|error| format!("bad fixture at {}: {}", error.path(), error.inner()))?;
    let description =
        DocumentDescription::from_json_value(fixture.document).map_err(|error| error.to_string())?;
    let result = factory.create_document(DocumentInit::from(description));

    let expect = &fixture.expect;
    let document = match (result, &expect.error_pattern) {
        (Err(error), Some(pattern)) => {
            let pattern = Regex::new(pattern).map_err(|error| error.to_string())?;
            let message = error.to_string();
            return if pattern.is_match(&message) {
                Ok(fixture.name)
            } else {
                Err(format!("error {message:?} does not match {pattern}"))
            };
        }
        (Err(error), None) => return Err(format!("unexpected error: {error}")),
        (Ok(_), Some(pattern)) => return Err(format!("expected an error matching {pattern}")),
        (Ok(document), None) => document,
    };

    if let Some(expected) = &expect.types {
        let mut names: Vec<_> = document.types().map(|(name, _)| name.to_string()).collect();
        let mut expected = expected.clone();
        names.sort();
        expected.sort();
        if names != expected {
            return Err(format!("types {names:?}, expected {expected:?}"));
        }
    }
    for identity in &expect.field_identity {
        let owner = document
            .get_type(&identity.owner)
            .ok_or_else(|| format!("no type {}", identity.owner))?;
        let field = match owner.body() {
            TypeBody::Complex(complex) => complex.field(&identity.field),
            _ => None,
        }
        .ok_or_else(|| format!("{} has no field {}", identity.owner, identity.field))?;
        let target = document
            .get(&identity.target)
            .ok_or_else(|| format!("no type {}", identity.target))?;
        if field.ty != target {
            return Err(format!(
                "{}.{} is not the same data type as {}",
                identity.owner, identity.field, identity.target
            ));
        }
    }
    Ok(fixture.name)
}
