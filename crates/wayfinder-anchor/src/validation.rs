//! Candidate checks shared by the resolution strategies.

use wayfinder_protocols::{ElementHandle, HostSurface, ValidationAttrs};

/// Rendered, not hidden by style, and with a non-zero area.
pub fn is_visible(surface: &dyn HostSurface, element: ElementHandle) -> bool {
    if !surface.is_attached(element) {
        return false;
    }
    if surface
        .computed_style(element)
        .is_some_and(|style| style.is_hidden())
    {
        return false;
    }
    surface
        .bounding_rect(element)
        .is_some_and(|rect| rect.area() > 0.0)
}

/// Which validation attributes a candidate must agree with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Check {
    /// Every supplied attribute.
    Full,
    /// Text and href only, for candidates built from the structural attributes.
    Content,
}

pub(crate) fn validates(
    surface: &dyn HostSurface,
    element: ElementHandle,
    attrs: Option<&ValidationAttrs>,
    check: Check,
) -> bool {
    let Some(attrs) = attrs else {
        return true;
    };
    if attrs.is_empty() {
        return true;
    }
    let Some(info) = surface.element_info(element) else {
        return false;
    };

    if check == Check::Full {
        if let Some(id) = &attrs.id {
            if info.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &attrs.tag {
            if !info.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !attrs.class_list.iter().all(|c| info.classes.contains(c)) {
            return false;
        }
    }

    if let Some(expected) = &attrs.text {
        let actual = surface.text_content(element).unwrap_or_default();
        let expected = normalize(expected);
        if !expected.is_empty() && !normalize(&actual).contains(&expected) {
            return false;
        }
    }
    if let Some(expected) = &attrs.href {
        match &info.href {
            Some(actual) if actual == expected || actual.ends_with(expected.as_str()) => {}
            _ => return false,
        }
    }
    true
}

/// Collapse whitespace runs and trim.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Selector for elements carrying every class.
pub(crate) fn class_selector(classes: &[String]) -> Option<String> {
    if classes.is_empty() {
        return None;
    }
    Some(
        classes
            .iter()
            .map(|c| format!("[class~={}]", quote(c)))
            .collect(),
    )
}

/// Selectors built from validation attributes, strongest first: id, then
/// tag with classes, then tag.
pub(crate) fn attribute_candidates(attrs: &ValidationAttrs) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(id) = &attrs.id {
        candidates.push(format!("[id={}]", quote(id)));
    }
    if let (Some(tag), Some(classes)) = (&attrs.tag, class_selector(&attrs.class_list)) {
        candidates.push(format!("{}{}", tag.to_ascii_lowercase(), classes));
    }
    if let Some(tag) = &attrs.tag {
        candidates.push(tag.to_ascii_lowercase());
    }
    candidates
}

/// CSS specificity as `(ids, classes, types)`.
///
/// Approximate: attribute selectors and pseudo-classes count as classes and
/// every compound that starts with a name counts as one type.
pub fn specificity(selector: &str) -> (u32, u32, u32) {
    let (mut ids, mut classes, mut types) = (0, 0, 0);
    let mut in_brackets = false;
    let mut in_parens = 0u32;
    let mut quote: Option<char> = None;
    let mut compound_start = true;
    let mut escaped = false;

    for c in selector.chars() {
        if escaped {
            escaped = false;
            compound_start = false;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' | '\'' if in_brackets => quote = Some(c),
            '[' => {
                in_brackets = true;
                classes += 1;
                compound_start = false;
            }
            ']' => in_brackets = false,
            _ if in_brackets => {}
            '(' => in_parens += 1,
            ')' => in_parens = in_parens.saturating_sub(1),
            _ if in_parens > 0 => {}
            '#' => {
                ids += 1;
                compound_start = false;
            }
            '.' | ':' => {
                classes += 1;
                compound_start = false;
            }
            ' ' | '>' | '+' | '~' | ',' => compound_start = true,
            '*' => compound_start = false,
            c if compound_start && (c.is_alphabetic() || c == '_') => {
                types += 1;
                compound_start = false;
            }
            _ => compound_start = false,
        }
    }
    (ids, classes, types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specificity() {
        assert_eq!(specificity("#save"), (1, 0, 0));
        assert_eq!(specificity("button.primary"), (0, 1, 1));
        assert_eq!(specificity("nav > ul li:nth-child(2)"), (0, 1, 3));
        assert_eq!(specificity("a[href='x.y#z']"), (0, 1, 1));
        assert_eq!(specificity(".hover\\:bg"), (0, 1, 0));
    }

    #[test]
    fn test_attribute_candidates_order() {
        let attrs = ValidationAttrs {
            id: Some("save".to_string()),
            tag: Some("BUTTON".to_string()),
            class_list: vec!["btn".to_string(), "primary".to_string()],
            ..Default::default()
        };
        assert_eq!(
            attribute_candidates(&attrs),
            vec![
                "[id=\"save\"]".to_string(),
                "button[class~=\"btn\"][class~=\"primary\"]".to_string(),
                "button".to_string(),
            ]
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Save \n changes "), "Save changes");
    }
}
