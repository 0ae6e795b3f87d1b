//! Path composition and `{name}`/`:name` parameter substitution.

use std::collections::HashMap;

/// Joins a client's base path with a per-request path, e.g. base `/a/b` +
/// request `c/d?x=1` -> `/a/b/c/d?x=1`.
pub fn compose_path(base_path: &str, request_path: &str) -> String {
    let (request_path_only, query) = match request_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (request_path, None),
    };

    let base_trimmed = base_path.trim_end_matches('/');
    let request_trimmed = request_path_only.trim_start_matches('/');

    let mut composed = if request_trimmed.is_empty() {
        base_trimmed.to_string()
    } else if base_trimmed.is_empty() {
        format!("/{request_trimmed}")
    } else {
        format!("{base_trimmed}/{request_trimmed}")
    };

    if composed.is_empty() {
        composed.push('/');
    }
    if let Some(q) = query {
        composed.push('?');
        composed.push_str(q);
    }
    composed
}

/// Substitutes `{name}` and `:name` markers from `params`. An empty or
/// unmatched marker is passed through literally unless it is *named* and
/// absent from `params`, in which case substitution raises an error.
pub fn substitute_params(path: &str, params: &HashMap<String, String>) -> crate::error::Result<String> {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            let mut closed = false;
            while let Some(&(_, c2)) = chars.peek() {
                chars.next();
                if c2 == '}' {
                    closed = true;
                    break;
                }
                name.push(c2);
            }
            if !closed || name.is_empty() {
                out.push('{');
                out.push_str(&name);
                if closed {
                    out.push('}');
                }
                continue;
            }
            match params.get(&name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(crate::error::Error::invalid_config(format!(
                        "unresolved path parameter {{{name}}}"
                    )))
                }
            }
        } else if c == ':' && chars.peek().map(|(_, c2)| c2.is_ascii_alphabetic() || *c2 == '_').unwrap_or(false) {
            let mut name = String::new();
            while let Some(&(_, c2)) = chars.peek() {
                if c2.is_ascii_alphanumeric() || c2 == '_' {
                    name.push(c2);
                    chars.next();
                } else {
                    break;
                }
            }
            match params.get(&name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(crate::error::Error::invalid_config(format!(
                        "unresolved path parameter :{name}"
                    )))
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_relative_path_preserving_query() {
        assert_eq!(compose_path("/a/b", "c/d?x=1"), "/a/b/c/d?x=1");
    }

    #[test]
    fn empty_request_path_keeps_base() {
        assert_eq!(compose_path("/a/b", ""), "/a/b");
    }

    #[test]
    fn braces_param_is_substituted() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        assert_eq!(substitute_params("/users/{id}", &params).unwrap(), "/users/42");
    }

    #[test]
    fn colon_param_is_substituted() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        assert_eq!(substitute_params("/users/:id", &params).unwrap(), "/users/42");
    }

    #[test]
    fn unresolved_param_is_an_error() {
        let params = HashMap::new();
        assert!(substitute_params("/users/{id}", &params).is_err());
    }

    #[test]
    fn empty_braces_pass_through_literally() {
        let params = HashMap::new();
        assert_eq!(substitute_params("/a/{}/b", &params).unwrap(), "/a/{}/b");
    }
}
