//! Identifier case helpers for artifact naming: table names are snake_case,
//! generated type names are PascalCase and (mostly) singular.

/// Convert a single identifier from snake_case to PascalCase.
/// e.g. "user_profiles" -> "UserProfiles"
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from PascalCase/camelCase to snake_case.
/// e.g. "UserProfile" -> "user_profile"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Naive singular form of a table name, good enough for conventional
/// plural table names ("users" -> "user", "categories" -> "category").
/// Words ending in "ss" are left alone ("address" stays "address").
pub fn singularize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if s.ends_with("ss") {
        return s.to_string();
    }
    if let Some(stem) = s.strip_suffix('s') {
        return stem.to_string();
    }
    s.to_string()
}
