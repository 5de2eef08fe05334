/// Replace `${VAR}` and `${VAR:-fallback}` placeholders in raw config text
/// using the process environment.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`], resolving names through `lookup`.
///
/// A variable that is unset (or empty, for the `:-` form) takes the fallback
/// when one is given; otherwise the placeholder is left as-is.
pub fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: emit the remainder literally.
            result.push_str(&rest[start..]);
            return result;
        };
        let body = &after[..end];
        result.push_str(&resolve(body, &lookup).unwrap_or_else(|| format!("${{{body}}}")));
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn resolve(body: &str, lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    let (name, fallback) = match body.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (body, None),
    };
    if name.is_empty() {
        return None;
    }
    match (lookup(name), fallback) {
        (Some(val), Some(fallback)) if val.is_empty() => Some(fallback.to_string()),
        (Some(val), _) => Some(val),
        (None, fallback) => fallback.map(str::to_string),
    }
}
