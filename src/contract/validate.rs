//! Structural validation of a parsed contract.
//!
//! Validation runs once at startup and collects every problem instead of
//! stopping at the first, so a broken contract can be fixed in one pass.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::model::{is_extension, Operation, Parameter, PathTemplate, RefOr, Segment};
use super::Contract;
use crate::error::{ValidationError, ValidationIssue};

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^3\.[01]\.\d+$").expect("valid version regex"));

static COMPONENT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9.\-_]+$").expect("valid component regex"));

static RESPONSE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(default|[1-5][0-9][0-9]|[1-5]XX)$").expect("valid status regex"));

const PARAMETER_LOCATIONS: [&str; 4] = ["query", "header", "path", "cookie"];

const SCHEMA_TYPES: [&str; 7] = [
    "array", "boolean", "integer", "null", "number", "object", "string",
];

/// Keys whose values are schemas, or maps/lists of schemas.
const NESTED_SCHEMA_KEYS: [&str; 4] = ["items", "not", "additionalProperties", "contains"];
const SCHEMA_LIST_KEYS: [&str; 3] = ["allOf", "oneOf", "anyOf"];

#[derive(Default)]
struct Report {
    issues: Vec<ValidationIssue>,
}

impl Report {
    fn push(&mut self, pointer: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            pointer: pointer.into(),
            message: message.into(),
        });
    }
}

/// Escape one JSON-pointer token.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Validate a parsed contract.
///
/// Checks the version string, document metadata, path templates and their
/// parameters, operation responses, `operationId` uniqueness, local `$ref`
/// resolution and component schema shapes.
pub fn validate(contract: &Contract) -> Result<(), ValidationError> {
    let mut report = Report::default();
    let doc = contract.document();

    if !VERSION_RE.is_match(&doc.openapi) {
        report.push(
            "#/openapi",
            format!("unsupported OpenAPI version {:?}, expected 3.0.x or 3.1.x", doc.openapi),
        );
    }
    if doc.info.title.trim().is_empty() {
        report.push("#/info/title", "must not be empty");
    }
    if doc.info.version.trim().is_empty() {
        report.push("#/info/version", "must not be empty");
    }

    check_paths(contract, &mut report);
    check_references(contract, contract.raw(), "#".to_string(), Walk::Structure, &mut report);
    check_components(contract, &mut report);

    if report.issues.is_empty() {
        debug!(title = %doc.info.title, "Contract passed validation");
        Ok(())
    } else {
        Err(ValidationError {
            issues: report.issues,
        })
    }
}

fn check_paths(contract: &Contract, report: &mut Report) {
    let mut seen_templates: HashMap<String, &str> = HashMap::new();
    let mut seen_ids: HashMap<&str, String> = HashMap::new();

    for (path, item) in &contract.document().paths {
        let pointer = format!("#/paths/{}", escape(path));

        let template = match PathTemplate::parse(path) {
            Ok(template) => template,
            Err(reason) => {
                report.push(&pointer, reason);
                continue;
            }
        };

        for segment in template.segments() {
            if let Segment::Literal(text) = segment {
                if text.starts_with(':') || text.starts_with('*') {
                    report.push(
                        &pointer,
                        format!("segment {text:?} must not start with ':' or '*'"),
                    );
                }
            }
        }

        let params = template.params();
        let unique: BTreeSet<&str> = params.iter().copied().collect();
        if unique.len() != params.len() {
            report.push(&pointer, "path template repeats a parameter name");
        }

        if let Some(previous) = seen_templates.insert(template.normalized(), path) {
            report.push(
                &pointer,
                format!("conflicts with {previous:?}: identical once parameter names are ignored"),
            );
        }

        let shared = check_parameter_list(
            contract,
            &item.parameters,
            &format!("{pointer}/parameters"),
            report,
        );

        for (method, op) in item.operations() {
            let op_pointer = format!("{pointer}/{}", method.as_ref().to_ascii_lowercase());
            check_operation(contract, op, &op_pointer, &unique, &shared, report);

            if let Some(id) = op.operation_id.as_deref() {
                if id.is_empty() {
                    report.push(format!("{op_pointer}/operationId"), "must not be empty");
                } else if let Some(first) = seen_ids.insert(id, op_pointer.clone()) {
                    report.push(
                        format!("{op_pointer}/operationId"),
                        format!("duplicate operationId {id:?}, first declared at {first}"),
                    );
                }
            }
        }
    }
}

fn check_operation(
    contract: &Contract,
    op: &Operation,
    pointer: &str,
    template_params: &BTreeSet<&str>,
    shared: &[Parameter],
    report: &mut Report,
) {
    let own = check_parameter_list(
        contract,
        &op.parameters,
        &format!("{pointer}/parameters"),
        report,
    );

    // Operation parameters override path-level ones with the same (name, in).
    let mut effective: HashMap<(&str, &str), &Parameter> = HashMap::new();
    for param in shared.iter().chain(own.iter()) {
        effective.insert((param.name.as_str(), param.location.as_str()), param);
    }

    let declared: BTreeSet<&str> = effective
        .keys()
        .filter(|(_, location)| *location == "path")
        .map(|(name, _)| *name)
        .collect();

    for missing in template_params.difference(&declared) {
        report.push(
            pointer,
            format!("path parameter {missing:?} is not declared"),
        );
    }
    for extra in declared.difference(template_params) {
        report.push(
            pointer,
            format!("declared path parameter {extra:?} does not appear in the path"),
        );
    }

    let responses_pointer = format!("{pointer}/responses");
    match &op.responses {
        None => report.push(&responses_pointer, "operation declares no responses"),
        Some(responses) if responses.is_empty() => {
            report.push(&responses_pointer, "operation declares no responses")
        }
        Some(responses) => {
            for (code, response) in responses {
                let response_pointer = format!("{responses_pointer}/{}", escape(code));
                if !RESPONSE_KEY_RE.is_match(code) {
                    report.push(
                        &response_pointer,
                        format!("{code:?} is not a status code, range or 'default'"),
                    );
                }
                // Unresolvable refs are reported by the reference pass.
                if let Some(resolved) = contract.resolve_item(response) {
                    let described = resolved
                        .description
                        .as_deref()
                        .is_some_and(|d| !d.trim().is_empty());
                    if !described {
                        report.push(
                            format!("{response_pointer}/description"),
                            "response must have a description",
                        );
                    }
                }
            }
        }
    }
}

/// Validate a parameter list and return the resolved parameters.
fn check_parameter_list(
    contract: &Contract,
    params: &[RefOr<Parameter>],
    pointer: &str,
    report: &mut Report,
) -> Vec<Parameter> {
    let mut resolved = Vec::with_capacity(params.len());
    let mut seen = BTreeSet::new();

    for (index, param) in params.iter().enumerate() {
        let param_pointer = format!("{pointer}/{index}");
        let Some(param) = contract.resolve_item(param) else {
            continue;
        };

        if param.name.trim().is_empty() {
            report.push(format!("{param_pointer}/name"), "must not be empty");
        }
        if !PARAMETER_LOCATIONS.contains(&param.location.as_str()) {
            report.push(
                format!("{param_pointer}/in"),
                format!(
                    "{:?} is not one of {}",
                    param.location,
                    PARAMETER_LOCATIONS.join(", ")
                ),
            );
        }
        if param.location == "path" && !param.required {
            report.push(
                format!("{param_pointer}/required"),
                "path parameters must be required",
            );
        }
        if !seen.insert((param.name.clone(), param.location.clone())) {
            report.push(
                &param_pointer,
                format!("duplicate parameter {:?} in {}", param.name, param.location),
            );
        }

        resolved.push(param);
    }

    resolved
}

/// Where the reference walk currently is. Names in `properties` and
/// `examples` maps are user-chosen, and example values are literal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Structure,
    Properties,
    Examples,
    Example,
}

impl Walk {
    /// Context for the value under `key`, or `None` when it is literal data.
    fn enter(self, key: &str) -> Option<Walk> {
        match (self, key) {
            (Walk::Properties, _) => Some(Walk::Structure),
            (Walk::Examples, _) => Some(Walk::Example),
            (Walk::Example, "value") => None,
            (_, "example") => None,
            (_, key) if is_extension(key) => None,
            (_, "properties") => Some(Walk::Properties),
            (_, "examples") => Some(Walk::Examples),
            _ => Some(Walk::Structure),
        }
    }
}

/// Whether a value under `key` is literal data rather than contract structure.
fn is_literal(key: &str) -> bool {
    key == "example" || key == "examples" || is_extension(key)
}

fn check_references(
    contract: &Contract,
    value: &Value,
    pointer: String,
    walk: Walk,
    report: &mut Report,
) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                match reference.as_str() {
                    Some(target) if target.starts_with('#') => {
                        if contract.resolve(target).is_none() {
                            report.push(
                                format!("{pointer}/$ref"),
                                format!("reference {target:?} does not resolve"),
                            );
                        }
                    }
                    Some(target) => report.push(
                        format!("{pointer}/$ref"),
                        format!("external reference {target:?} is not supported"),
                    ),
                    None => report.push(format!("{pointer}/$ref"), "must be a string"),
                }
            }
            for (key, child) in map {
                if key == "$ref" {
                    continue;
                }
                let Some(next) = walk.enter(key) else {
                    continue;
                };
                let child_pointer = format!("{pointer}/{}", escape(key));
                check_references(contract, child, child_pointer, next, report);
            }
        }
        // JSON Schema `examples` is a list of literal values.
        Value::Array(_) if walk == Walk::Examples => {}
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                check_references(contract, child, format!("{pointer}/{index}"), walk, report);
            }
        }
        _ => {}
    }
}

fn check_components(contract: &Contract, report: &mut Report) {
    for (name, schema) in &contract.document().components.schemas {
        let pointer = format!("#/components/schemas/{}", escape(name));
        if !COMPONENT_NAME_RE.is_match(name) {
            report.push(
                &pointer,
                format!("component name {name:?} must match {}", COMPONENT_NAME_RE.as_str()),
            );
        }
        check_schema(schema, &pointer, report);
    }

    if let Some(paths) = contract.raw().get("paths") {
        check_inline_schemas(paths, "#/paths".to_string(), report);
    }
}

/// Find `schema` entries under `paths` and check each one.
fn check_inline_schemas(value: &Value, pointer: String, report: &mut Report) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_literal(key) {
                    continue;
                }
                let child_pointer = format!("{pointer}/{}", escape(key));
                if key == "schema" {
                    check_schema(child, &child_pointer, report);
                } else {
                    check_inline_schemas(child, child_pointer, report);
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                check_inline_schemas(child, format!("{pointer}/{index}"), report);
            }
        }
        _ => {}
    }
}

fn check_schema(schema: &Value, pointer: &str, report: &mut Report) {
    let Value::Object(map) = schema else {
        // `true`/`false` are valid schemas in 3.1.
        if !schema.is_boolean() {
            report.push(pointer, "schema must be an object");
        }
        return;
    };
    if map.contains_key("$ref") {
        return;
    }

    let types: Vec<&str> = match map.get("type") {
        None => Vec::new(),
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        Some(_) => {
            report.push(format!("{pointer}/type"), "must be a string or list of strings");
            Vec::new()
        }
    };
    for t in &types {
        if !SCHEMA_TYPES.contains(t) {
            report.push(format!("{pointer}/type"), format!("unknown schema type {t:?}"));
        }
    }
    if types.contains(&"array") && !map.contains_key("items") {
        report.push(pointer, "schema of type 'array' must declare 'items'");
    }

    if let Some(props) = map.get("properties") {
        match props {
            Value::Object(props) => {
                for (name, prop) in props {
                    check_schema(prop, &format!("{pointer}/properties/{}", escape(name)), report);
                }
            }
            _ => report.push(format!("{pointer}/properties"), "must be a mapping"),
        }
    }
    for key in NESTED_SCHEMA_KEYS {
        if let Some(nested) = map.get(key) {
            check_schema(nested, &format!("{pointer}/{key}"), report);
        }
    }
    for key in SCHEMA_LIST_KEYS {
        match map.get(key) {
            None => {}
            Some(Value::Array(list)) => {
                for (index, nested) in list.iter().enumerate() {
                    check_schema(nested, &format!("{pointer}/{key}/{index}"), report);
                }
            }
            Some(_) => report.push(format!("{pointer}/{key}"), "must be a list of schemas"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn issues(doc: &str) -> Vec<ValidationIssue> {
        let contract = Contract::parse(doc.as_bytes()).expect("fixture parses");
        match validate(&contract) {
            Ok(()) => Vec::new(),
            Err(err) => err.issues,
        }
    }

    fn messages(doc: &str) -> Vec<String> {
        issues(doc).into_iter().map(|i| i.to_string()).collect()
    }

    const HEADER: &str = "openapi: 3.0.3\ninfo:\n  title: t\n  version: '1'\n";

    #[test]
    fn consistent_contract_passes() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /users/{id}:
    get:
      operationId: getUser
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/User'
        '4XX':
          $ref: '#/components/responses/Error'
components:
  schemas:
    User:
      type: object
      properties:
        tags:
          type: array
          items:
            type: string
  responses:
    Error:
      description: client error
"#
        );
        assert_eq!(messages(&doc), Vec::<String>::new());
    }

    #[test]
    fn operation_without_responses_fails() {
        let doc = format!(
            "{HEADER}{}",
            "paths:\n  /healthz:\n    get:\n      operationId: getHealthz\n"
        );
        assert_eq!(
            messages(&doc),
            vec!["#/paths/~1healthz/get/responses: operation declares no responses"]
        );
    }

    #[test]
    fn empty_responses_fail() {
        let doc = format!("{HEADER}{}", "paths:\n  /a:\n    get:\n      responses: {}\n");
        assert_eq!(issues(&doc).len(), 1);
    }

    #[test]
    fn unresolved_reference_fails() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /a:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Missing'
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("does not resolve"), "{found:?}");
    }

    #[test]
    fn external_reference_fails() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /a:
    get:
      responses:
        '200':
          $ref: 'common.yml#/responses/Ok'
"#
        );
        assert!(messages(&doc)[0].contains("external reference"));
    }

    #[test]
    fn duplicate_operation_ids_fail() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /a:
    get:
      operationId: same
      responses:
        '200':
          description: ok
  /b:
    get:
      operationId: same
      responses:
        '200':
          description: ok
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with("#/paths/~1b/get/operationId"));
    }

    #[test]
    fn path_parameters_must_match_template() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /users/{id}:
    get:
      parameters:
        - name: userId
          in: path
          required: true
      responses:
        '200':
          description: ok
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 2, "{found:?}");
        assert!(found[0].contains("\"id\" is not declared"));
        assert!(found[1].contains("\"userId\" does not appear"));
    }

    #[test]
    fn path_level_parameters_are_inherited() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /users/{id}:
    parameters:
      - name: id
        in: path
        required: true
    get:
      responses:
        '200':
          description: ok
    delete:
      responses:
        '204':
          description: gone
"#
        );
        assert!(issues(&doc).is_empty());
    }

    #[test]
    fn optional_path_parameter_and_bad_location_fail() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /users/{id}:
    get:
      parameters:
        - name: id
          in: path
        - name: q
          in: body
      responses:
        '200':
          description: ok
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 2, "{found:?}");
        assert!(found[0].ends_with("path parameters must be required"));
        assert!(found[1].contains("\"body\" is not one of"));
    }

    #[test]
    fn conflicting_templates_fail() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /users/{id}:
    parameters:
      - {name: id, in: path, required: true}
    get:
      responses:
        '200': {description: ok}
  /users/{name}:
    parameters:
      - {name: name, in: path, required: true}
    get:
      responses:
        '200': {description: ok}
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(found[0].contains("conflicts with"));
    }

    #[test]
    fn bad_response_key_and_missing_description_fail() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /a:
    get:
      responses:
        '999':
          description: nope
        '200': {}
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 2, "{found:?}");
        assert!(found.iter().any(|m| m.contains("response must have a description")));
        assert!(found.iter().any(|m| m.contains("is not a status code")));
    }

    #[test]
    fn array_schema_without_items_fails() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths: {}
components:
  schemas:
    Tags:
      type: array
    Bad Name:
      type: strin
"#
        );
        let found = messages(&doc);
        assert_eq!(found.len(), 3, "{found:?}");
    }

    #[test]
    fn metadata_and_version_are_checked() {
        let doc = "openapi: 2.0.0\ninfo:\n  title: ''\n  version: ''\npaths: {}\n";
        let pointers: Vec<_> = issues(doc).into_iter().map(|i| i.pointer).collect();
        assert_eq!(pointers, vec!["#/openapi", "#/info/title", "#/info/version"]);
    }

    #[test]
    fn example_and_extension_values_are_not_structure() {
        let doc = format!(
            "{HEADER}{}",
            r#"
paths:
  /a:
    x-gateway:
      schema: {type: strin}
      target: {$ref: '#/nowhere'}
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: object
                properties:
                  example:
                    $ref: '#/components/schemas/Missing'
              example:
                schema: {type: list}
                $ref: not-a-pointer
              examples:
                sample:
                  value:
                    schema: {type: list}
                    $ref: '#/nowhere'
                shared:
                  $ref: '#/components/examples/Gone'
"#
        );
        let mut found = messages(&doc);
        found.sort();
        assert_eq!(
            found,
            vec![
                "#/paths/~1a/get/responses/200/content/application~1json/examples/shared/$ref: \
                 reference \"#/components/examples/Gone\" does not resolve",
                "#/paths/~1a/get/responses/200/content/application~1json/schema/properties/example/$ref: \
                 reference \"#/components/schemas/Missing\" does not resolve",
            ]
        );
    }

    #[test]
    fn reserved_router_characters_fail() {
        let doc = format!(
            "{HEADER}{}",
            "paths:\n  /files/*rest:\n    get:\n      responses:\n        '200': {description: ok}\n"
        );
        assert!(messages(&doc)[0].contains("must not start with ':' or '*'"));
    }
}
