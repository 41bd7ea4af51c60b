//! Marker text for producers.
//!
//! Template integrations call these while rendering; whatever they return is
//! written verbatim into the output and later consumed by
//! [`deserialize`](crate::deserialize).

use crate::error::NameError;
use crate::marker::{validate_name, Marker};

/// Marker opening a capture block for section `name`.
///
/// ```rust
/// use relocation_core::{begin_section, end_section, deserialize};
///
/// let doc = format!("{}body {{}}{}", begin_section("css").unwrap(), end_section());
/// let relocated = deserialize(&doc).unwrap();
/// assert_eq!(relocated.section("css").unwrap().flatten(), "body {}");
/// ```
pub fn begin_section(name: &str) -> Result<String, NameError> {
    validate_name(name)?;
    Ok(Marker::SectionStart(name).to_string())
}

/// Marker closing the innermost open capture block.
pub fn end_section() -> String {
    Marker::SectionEnd.to_string()
}

/// Marker injecting the live content of section `name` at this point.
pub fn inject_here(name: &str) -> Result<String, NameError> {
    validate_name(name)?;
    Ok(Marker::Destination(name).to_string())
}

/// Wrap `body` in a capture block for `name`.
pub fn capture(name: &str, body: &str) -> Result<String, NameError> {
    let start = begin_section(name)?;
    let end = end_section();
    let mut out = String::with_capacity(start.len() + body.len() + end.len());
    out.push_str(&start);
    out.push_str(body);
    out.push_str(&end);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{MAGIC, MAX_NAME_LEN};

    #[test]
    fn exact_wire_text() {
        assert_eq!(begin_section("js").unwrap(), format!("{MAGIC}RS<js>"));
        assert_eq!(end_section(), format!("{MAGIC}RE"));
        assert_eq!(inject_here("js").unwrap(), format!("{MAGIC}DM<js>"));
    }

    #[test]
    fn length_bound_matches_parser() {
        assert!(inject_here(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert_eq!(
            begin_section(&"x".repeat(MAX_NAME_LEN + 1)),
            Err(NameError::TooLong {
                len: MAX_NAME_LEN + 1,
                max: MAX_NAME_LEN
            })
        );
    }

    #[test]
    fn capture_wraps_body() {
        assert_eq!(
            capture("css", "a{}").unwrap(),
            format!("{MAGIC}RS<css>a{{}}{MAGIC}RE")
        );
    }
}
