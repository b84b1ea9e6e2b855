/// Upper-cases the first character, leaving the rest untouched, so facet keys
/// and vocabulary labels compare equal regardless of source casing.
pub fn normalize_label(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_label;

    #[test]
    fn upper_cases_first_char_only() {
        assert_eq!(normalize_label("kõne"), "Kõne");
        assert_eq!(normalize_label("ärakiri"), "Ärakiri");
        assert_eq!(normalize_label("de la Gardie"), "De la Gardie");
        assert_eq!(normalize_label(""), "");
        assert_eq!(normalize_label(&normalize_label("oratio")), "Oratio");
    }
}
