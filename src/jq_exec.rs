//! jq pre-filtering of CLI inputs.
use anyhow::{Context, Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` over `input` and collect every output as JSON.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;
    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut values = Vec::new();
    for output in outputs {
        let output = output.map_err(|error| anyhow!("jq filter `{filter_src}` failed: {error:?}"))?;
        // Val renders as JSON text
        let text = output.to_string();
        let value = serde_json::from_str(&text)
            .with_context(|| format!("jq filter `{filter_src}` produced non-JSON output: {text}"))?;
        values.push(value);
    }
    Ok(values)
}

fn format_parse_errors(errors: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let message = errors
        .into_iter()
        .map(|(file, error)| format!("jq parse error: {error:?} in `{}`", file.code))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow!(message)
}

fn format_undefined_errors(errors: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let message = errors
        .into_iter()
        .flat_map(|(file, undefined)| {
            undefined
                .into_iter()
                .map(move |(name, what)| format!("jq: undefined `{name}` ({what:?}) in `{}`", file.code))
        })
        .collect::<Vec<_>>()
        .join("\n");
    anyhow!(message)
}
