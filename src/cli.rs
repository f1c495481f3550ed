//! CLI: build | check | decode | fetch
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use api_typegraph::{
    CodecOptions, Document, DocumentDescription, DocumentFactory, DocumentInit, FactoryConfig,
    Partiality,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile JSON type documents into a resolved type graph, and decode values against it
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// factory config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// do not reference the builtin types from the documents being built
    #[arg(long, global = true)]
    no_builtins: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// build a document and print its normalized description
    Build(BuildOut),
    /// build every input document and report which ones fail
    Check(CheckArgs),
    /// decode (or encode) values against a type of a document
    Decode(DecodeArgs),
    /// fetch a document by URL, build it and print its description
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each input (e.g. /components/types)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each input; every output is processed
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct BuildOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// document description the type is looked up in
    #[arg(long, short)]
    document: PathBuf,

    /// type name, `ns:Name` for types of referenced documents
    #[arg(long = "type", short)]
    type_name: String,

    #[command(flatten)]
    input_settings: InputSettings,

    /// encode instead of decode
    #[arg(long)]
    encode: bool,

    /// projection entries: `name`, `+name`, `-name`, `parent.child`
    #[arg(long, value_delimiter = ',')]
    project: Vec<String>,

    /// let required fields be missing
    #[arg(long, value_enum, default_value_t = PartialArg::None)]
    partial: PartialArg,

    #[arg(long)]
    ignore_read_only: bool,

    #[arg(long)]
    ignore_write_only: bool,
}

#[derive(Args, Debug)]
struct FetchArgs {
    url: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PartialArg {
    None,
    Shallow,
    Deep,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every input value, after the pointer and jq filters, with the file it came from.
    fn load(&self) -> Result<Vec<(PathBuf, Value)>> {
        let mut values = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read {}", source_path.display()))?;
            let value: Value = serde_json::from_str(&source)
                .with_context(|| format!("failed to parse JSON in {}", source_path.display()))?;
            let value = match self.json_pointer.as_deref() {
                Some(pointer) => value.pointer(pointer).cloned().ok_or_else(|| {
                    anyhow!("JSON pointer {pointer} selects nothing in {}", source_path.display())
                })?,
                None => value,
            };
            match self.jq_expr.as_deref() {
                Some(jq_expr) => {
                    let outputs = crate::jq_exec::run_jaq(jq_expr, &value)
                        .with_context(|| format!("jq filter failed on {}", source_path.display()))?;
                    values.extend(outputs.into_iter().map(|output| (source_path.clone(), output)));
                }
                None => values.push((source_path, value)),
            }
        }
        debug!(inputs = values.len(), "loaded inputs");
        Ok(values)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<bool> {
        let factory = self.factory()?;
        match &self.cmd {
            Command::Build(target) => {
                let mut exported = Vec::new();
                for (path, value) in target.input_settings.load()? {
                    let document = self.build_document(&factory, value)
                        .with_context(|| format!("failed to build {}", path.display()))?;
                    exported.push(document.to_json()?);
                }
                let output = match <[Value; 1]>::try_from(exported) {
                    Ok([single]) => single,
                    Err(many) => Value::Array(many),
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&output)?)?;
                Ok(true)
            }
            Command::Check(target) => {
                let inputs = target.input_settings.load()?;
                let results: Vec<_> = inputs
                    .into_par_iter()
                    .map(|(path, value)| {
                        let result = self.build_document(&factory, value);
                        (path, result)
                    })
                    .collect();
                let mut all_ok = true;
                for (path, result) in results {
                    match result {
                        Ok(document) => {
                            eprintln!("{} {} ({} types)", "✓".green(), path.display(), document.len());
                        }
                        Err(error) => {
                            all_ok = false;
                            eprintln!("{} {}: {error:#}", "✗".red(), path.display());
                        }
                    }
                }
                Ok(all_ok)
            }
            Command::Decode(target) => {
                let source = std::fs::read_to_string(&target.document)
                    .with_context(|| format!("failed to read {}", target.document.display()))?;
                let document = self.build_document(&factory, serde_json::from_str(&source)?)
                    .with_context(|| format!("failed to build {}", target.document.display()))?;
                let codec = document.codec_for(&target.type_name, target.codec_options())?;
                let mut all_ok = true;
                for (path, value) in target.input_settings.load()? {
                    match codec.apply(&value) {
                        Ok(output) => println!("{}", serde_json::to_string_pretty(&output)?),
                        Err(error) => {
                            all_ok = false;
                            eprintln!("{} {}", "✗".red(), path.display());
                            for issue in &error.issues {
                                eprintln!("    {issue}");
                            }
                        }
                    }
                }
                Ok(all_ok)
            }
            Command::Fetch(target) => {
                let document = factory.create_document_from_url(&target.url)?;
                let exported = serde_json::to_string_pretty(&document.to_json()?)?;
                write_output(target.out.as_deref(), &exported)?;
                Ok(true)
            }
        }
    }

    fn factory(&self) -> Result<DocumentFactory> {
        let config = match &self.config {
            Some(path) => FactoryConfig::load(path)?,
            None => FactoryConfig::default(),
        };
        Ok(DocumentFactory::with_config(config))
    }

    fn build_document(&self, factory: &DocumentFactory, value: Value) -> Result<Document> {
        let description = DocumentDescription::from_json_value(value)?;
        let mut init = DocumentInit::from(description);
        if self.no_builtins {
            init = init.without_builtins();
        }
        Ok(factory.create_document(init)?)
    }
}

impl DecodeArgs {
    fn codec_options(&self) -> CodecOptions {
        let mut options = if self.encode { CodecOptions::encode() } else { CodecOptions::decode() };
        options = options.project(self.project.iter().cloned()).partial(match self.partial {
            PartialArg::None => Partiality::Strict,
            PartialArg::Shallow => Partiality::Shallow,
            PartialArg::Deep => Partiality::Deep,
        });
        options.ignore_read_only = self.ignore_read_only;
        options.ignore_write_only = self.ignore_write_only;
        options
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern)? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_flags_become_codec_options() {
        let cli = CommandLineInterface::try_parse_from([
            "api-typegraph",
            "decode",
            "--document",
            "doc.json",
            "--type",
            "Customer",
            "--input",
            "values.json",
            "--project",
            "name,+secret,-email",
            "--partial",
            "deep",
            "--encode",
        ])
        .unwrap();
        let Command::Decode(args) = &cli.cmd else { panic!("decode expected") };
        let options = args.codec_options();
        assert_eq!(options.projection, ["name", "+secret", "-email"]);
        assert_eq!(options.partial, Partiality::Deep);
        assert_eq!(options.direction, api_typegraph::Direction::Encode);
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["a.json", "b.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }
}
