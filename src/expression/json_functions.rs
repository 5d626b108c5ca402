//! JSON Functions
//!
//! JSON_EXTRACT(doc, path[, path...]) and JSON_TYPE(doc). Paths use the
//! `$.member`, `$."quoted member"` and `$[index]` legs.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::expression::EvalResult;
use crate::expression::function::{
    arg_json, arg_string, BaseBuiltin, BuiltinFunction, FunctionClass, FunctionRegistry,
    JSON_EXTRACT, JSON_TYPE,
};
use crate::types::{FieldType, Value};
use regex::Regex;
use std::any::Any;
use std::sync::OnceLock;

/// One step of a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathLeg {
    Member(String),
    Index(usize),
}

static PATH_LEG: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn path_leg_regex() -> PrismDBResult<&'static Regex> {
    PATH_LEG
        .get_or_init(|| {
            Regex::new(
                r#"^(?:\.(?:([A-Za-z_$][A-Za-z0-9_$]*)|"((?:[^"\\]|\\.)*)")|\[\s*(\d+)\s*\])"#,
            )
        })
        .as_ref()
        .map_err(|e| PrismDBError::Internal(format!("JSON path pattern: {}", e)))
}

/// Parse a `$`-rooted JSON path into its legs
pub fn parse_json_path(path: &str) -> PrismDBResult<Vec<PathLeg>> {
    let invalid = || PrismDBError::InvalidArgument(format!("Invalid JSON path expression '{}'", path));
    let regex = path_leg_regex()?;
    let mut rest = path.trim().strip_prefix('$').ok_or_else(invalid)?.trim_start();
    let mut legs = Vec::new();
    while !rest.is_empty() {
        let caps = regex.captures(rest).ok_or_else(invalid)?;
        let leg = if let Some(name) = caps.get(1) {
            PathLeg::Member(name.as_str().to_string())
        } else if let Some(quoted) = caps.get(2) {
            let member: String = serde_json::from_str(&format!("\"{}\"", quoted.as_str()))
                .map_err(|_| invalid())?;
            PathLeg::Member(member)
        } else if let Some(index) = caps.get(3) {
            PathLeg::Index(index.as_str().parse().map_err(|_| invalid())?)
        } else {
            return Err(invalid());
        };
        legs.push(leg);
        let consumed = caps.get(0).map_or(0, |m| m.end());
        rest = rest[consumed..].trim_start();
    }
    Ok(legs)
}

fn extract<'a>(doc: &'a serde_json::Value, legs: &[PathLeg]) -> Option<&'a serde_json::Value> {
    legs.iter().try_fold(doc, |node, leg| match leg {
        PathLeg::Member(name) => node.as_object()?.get(name),
        PathLeg::Index(i) => match node {
            serde_json::Value::Array(items) => items.get(*i),
            // A scalar behaves as a single-element array
            other if *i == 0 => Some(other),
            _ => None,
        },
    })
}

/// JSON_EXTRACT - Value at a path; with several paths, an array of every match
#[derive(Debug, Clone)]
pub struct JsonExtractFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for JsonExtractFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::json()
    }

    fn eval_json(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<serde_json::Value> {
        let args = &self.base.args;
        let Some(doc) = arg_json(&args[0], ctx, row)? else {
            return Ok(None);
        };
        let mut found = Vec::new();
        for path_arg in &args[1..] {
            let Some(path) = arg_string(path_arg, ctx, row)? else {
                return Ok(None);
            };
            let legs = parse_json_path(&path)?;
            if let Some(value) = extract(&doc, &legs) {
                found.push(value.clone());
            }
        }
        match (args.len(), found.len()) {
            (_, 0) => Ok(None),
            (2, _) => Ok(found.pop()),
            _ => Ok(Some(serde_json::Value::Array(found))),
        }
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// JSON_TYPE - Type name of a JSON value
#[derive(Debug, Clone)]
pub struct JsonTypeFunction {
    base: BaseBuiltin,
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "NULL",
        serde_json::Value::Bool(_) => "BOOLEAN",
        serde_json::Value::Number(n) if n.is_i64() => "INTEGER",
        serde_json::Value::Number(n) if n.is_u64() => "UNSIGNED INTEGER",
        serde_json::Value::Number(_) => "DOUBLE",
        serde_json::Value::String(_) => "STRING",
        serde_json::Value::Array(_) => "ARRAY",
        serde_json::Value::Object(_) => "OBJECT",
    }
}

impl BuiltinFunction for JsonTypeFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::varchar()
    }

    fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        let doc = arg_json(&self.base.args[0], ctx, row)?;
        Ok(doc.map(|d| json_type_name(&d).to_string()))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(
        JSON_EXTRACT,
        FunctionClass::new(JSON_EXTRACT, 2, None, |base| {
            Ok(Box::new(JsonExtractFunction { base }))
        }),
    );
    registry.register(
        JSON_TYPE,
        FunctionClass::fixed(JSON_TYPE, 1, |base| Ok(Box::new(JsonTypeFunction { base }))),
    );
}
