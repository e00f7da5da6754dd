//! Read scene description files into a list of [ParamSet]s, one per
//! statement. The grammar lives in `scene.pest`.

// std
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
// others
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
// ngp
use crate::core::error::{NgpError, Result};
use crate::core::paramset::ParamSet;

#[derive(Parser)]
#[grammar = "core/scene.pest"]
struct SceneParser;

/// Parse the statements of a scene description held in memory.
pub fn parse_scene(source: &str) -> Result<Vec<ParamSet>> {
    let mut pairs = SceneParser::parse(Rule::file, source)
        .map_err(|e| NgpError::Parse(format!("{}", e)))?;
    let mut statements: Vec<ParamSet> = Vec::new();
    if let Some(file) = pairs.next() {
        for pair in file.into_inner() {
            match pair.as_rule() {
                Rule::statement => statements.push(extract_statement(pair)?),
                Rule::EOI => {}
                _ => unreachable!(),
            }
        }
    }
    Ok(statements)
}

/// Read and parse a scene description file (extension `.ngp`).
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ParamSet>> {
    let mut source = String::new();
    File::open(path.as_ref())?.read_to_string(&mut source)?;
    parse_scene(&source)
}

fn extract_statement(pair: Pair<Rule>) -> Result<ParamSet> {
    let mut params: ParamSet = ParamSet::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::keyword => {
                params.key_word = inner.as_str().to_string();
            }
            Rule::name => {
                params.name = string_contents(inner);
            }
            Rule::parameter => extract_parameter(&mut params, inner)?,
            _ => unreachable!(),
        }
    }
    Ok(params)
}

fn extract_parameter(params: &mut ParamSet, pair: Pair<Rule>) -> Result<()> {
    let mut param_type: &str = "";
    let mut ident: String = String::new();
    let mut numbers: Vec<&str> = Vec::new();
    let mut strings: Vec<String> = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::param_decl => {
                for decl in inner.into_inner() {
                    match decl.as_rule() {
                        Rule::param_type => param_type = decl.as_str(),
                        Rule::ident => ident = decl.as_str().to_string(),
                        _ => unreachable!(),
                    }
                }
            }
            Rule::number => numbers.push(inner.as_str()),
            Rule::string => strings.push(string_contents(inner)),
            _ => unreachable!(),
        }
    }
    let is_numeric: bool = !matches!(param_type, "bool" | "string");
    if is_numeric && !strings.is_empty() {
        return Err(NgpError::Parse(format!(
            "{} parameter {:?} expects numbers, found {:?}",
            param_type, ident, strings
        )));
    }
    if !is_numeric && !numbers.is_empty() {
        return Err(NgpError::Parse(format!(
            "{} parameter {:?} expects quoted values, found {:?}",
            param_type, ident, numbers
        )));
    }
    match param_type {
        "float" => params.add_floats(ident, parse_numbers(&numbers)?),
        "integer" => params.add_ints(ident, parse_numbers(&numbers)?),
        "point3" => params.add_point3fs(ident, parse_numbers(&numbers)?)?,
        "rgb" => params.add_rgb_spectra(ident, parse_numbers(&numbers)?)?,
        "string" => params.add_strings(ident, strings),
        "bool" => {
            let mut bools: Vec<bool> = Vec::with_capacity(strings.len());
            for s in strings.iter() {
                match s.as_str() {
                    "true" => bools.push(true),
                    "false" => bools.push(false),
                    _ => {
                        return Err(NgpError::Parse(format!(
                            "value {:?} of bool parameter {:?} is neither \"true\" nor \"false\"",
                            s, ident
                        )));
                    }
                }
            }
            params.add_bools(ident, bools);
        }
        _ => unreachable!(),
    }
    Ok(())
}

fn parse_numbers<T: FromStr>(numbers: &[&str]) -> Result<Vec<T>> {
    numbers
        .iter()
        .map(|n| {
            n.parse::<T>()
                .map_err(|_| NgpError::Parse(format!("can't convert {:?}", n)))
        })
        .collect()
}

// name or string pair: the text between the quotes
fn string_contents(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .flatten()
        .find(|p| p.as_rule() == Rule::inner)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}
