//! Path template tokenizing.
//!
//! Templates use `{Name}` tokens, e.g. `/vesselBasics/{VesselID}`. Token names
//! are matched against input fields exactly (case-sensitive).

use crate::error::DescriptorError;

/// One piece of a parsed path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    /// Literal text copied into the URL as-is.
    Literal(&'a str),
    /// A `{Name}` token to be substituted from the input.
    Param(&'a str),
}

/// Splits a path template into literal and parameter parts.
///
/// ## Errors
///
/// Returns [`DescriptorError::UnbalancedBraces`] for an unclosed `{`, a nested
/// `{`, or a stray `}`, and [`DescriptorError::EmptyParam`] for `{}`.
///
/// ## Examples
///
/// ```
/// use wsdot_define::{parse_template, TemplatePart};
///
/// let parts = parse_template("/vesselBasics/{VesselID}").unwrap();
/// assert_eq!(
///     parts,
///     vec![TemplatePart::Literal("/vesselBasics/"), TemplatePart::Param("VesselID")]
/// );
/// ```
pub fn parse_template(template: &str) -> Result<Vec<TemplatePart<'_>>, DescriptorError> {
    let unbalanced = || DescriptorError::UnbalancedBraces {
        template: template.to_string(),
    };

    let mut parts = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                parts.push(TemplatePart::Literal(rest));
                break;
            }
            Some(idx) if rest.as_bytes()[idx] == b'}' => return Err(unbalanced()),
            Some(open) => {
                if open > 0 {
                    parts.push(TemplatePart::Literal(&rest[..open]));
                }
                let after = &rest[open + 1..];
                let close = after.find('}').ok_or_else(unbalanced)?;
                let name = &after[..close];
                if name.contains('{') {
                    return Err(unbalanced());
                }
                if name.is_empty() {
                    return Err(DescriptorError::EmptyParam {
                        template: template.to_string(),
                    });
                }
                parts.push(TemplatePart::Param(name));
                rest = &after[close + 1..];
            }
        }
    }

    Ok(parts)
}

/// Returns the parameter names of a template in order of appearance.
///
/// ## Errors
///
/// Propagates [`parse_template`] errors.
pub fn path_params(template: &str) -> Result<Vec<&str>, DescriptorError> {
    Ok(parse_template(template)?
        .into_iter()
        .filter_map(|part| match part {
            TemplatePart::Param(name) => Some(name),
            TemplatePart::Literal(_) => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_only() {
        assert_eq!(
            parse_template("/vesselBasics").unwrap(),
            vec![TemplatePart::Literal("/vesselBasics")]
        );
    }

    #[test]
    fn multiple_params_in_order() {
        let params = path_params("/schedule/{TripDate}/{DepartingTerminalID}/{ArrivingTerminalID}")
            .unwrap();
        assert_eq!(
            params,
            vec!["TripDate", "DepartingTerminalID", "ArrivingTerminalID"]
        );
    }

    #[test]
    fn adjacent_params() {
        let parts = parse_template("/{A}{B}").unwrap();
        assert_eq!(
            parts,
            vec![
                TemplatePart::Literal("/"),
                TemplatePart::Param("A"),
                TemplatePart::Param("B"),
            ]
        );
    }

    #[test]
    fn unclosed_brace_is_rejected() {
        assert!(matches!(
            parse_template("/vessels/{VesselID"),
            Err(DescriptorError::UnbalancedBraces { .. })
        ));
    }

    #[test]
    fn stray_close_brace_is_rejected() {
        assert!(matches!(
            parse_template("/vessels/VesselID}"),
            Err(DescriptorError::UnbalancedBraces { .. })
        ));
    }

    #[test]
    fn nested_brace_is_rejected() {
        assert!(matches!(
            parse_template("/vessels/{Ves{selID}"),
            Err(DescriptorError::UnbalancedBraces { .. })
        ));
    }

    #[test]
    fn empty_param_is_rejected() {
        assert!(matches!(
            parse_template("/vessels/{}"),
            Err(DescriptorError::EmptyParam { .. })
        ));
    }
}
