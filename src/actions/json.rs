// src/actions/json.rs

use serde_json::Value;

use crate::config::model::Repository;
use crate::errors::Result;

/// Parse engine JSON output and tag it with the repository label, so
/// results from several repositories can be told apart.
pub fn parse_json(output: &str, repository: &Repository) -> Result<Option<Value>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(None);
    }
    let mut value: Value = serde_json::from_str(output)?;
    inject_label(&mut value, repository);
    Ok(Some(value))
}

/// Parse one-object-per-line output (`--json-lines`) into an array.
pub fn parse_json_lines(output: &str) -> Result<Value> {
    let items = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<std::result::Result<Vec<Value>, _>>()?;
    Ok(Value::Array(items))
}

fn inject_label(value: &mut Value, repository: &Repository) {
    if let Some(Value::Object(details)) = value.get_mut("repository") {
        details.insert(
            "label".to_string(),
            Value::String(repository.label.clone().unwrap_or_default()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repository_label_is_injected() {
        let repository = Repository {
            path: "/tmp/repo".into(),
            label: Some("usb".into()),
        };
        let value = parse_json(
            r#"{"repository": {"id": "abc", "location": "/tmp/repo"}, "archives": []}"#,
            &repository,
        )
        .unwrap()
        .unwrap();
        assert_eq!(value["repository"]["label"], json!("usb"));
        assert_eq!(value["repository"]["id"], json!("abc"));
    }

    #[test]
    fn unlabelled_repository_gets_empty_label() {
        let value = parse_json(r#"{"repository": {}}"#, &Repository::new("/r"))
            .unwrap()
            .unwrap();
        assert_eq!(value["repository"]["label"], json!(""));
    }

    #[test]
    fn empty_output_is_no_document() {
        assert!(parse_json("  \n", &Repository::new("/r")).unwrap().is_none());
    }

    #[test]
    fn json_lines_become_an_array() {
        let value = parse_json_lines("{\"path\": \"a\"}\n{\"path\": \"b\"}\n").unwrap();
        assert_eq!(value, json!([{"path": "a"}, {"path": "b"}]));
    }
}
