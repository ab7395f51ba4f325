//! Language-tag lookup for comment conventions.
//!
//! The comment prefix drives two things: recognising directive lines during
//! scanning, and classifying physical lines as code vs. comment during
//! reconciliation. A language tag without an entry here is rendered as
//! `unknown` and never executed.

/// Comment convention for a snippet language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    /// Line-comment prefix, e.g. `--`.
    pub prefix: &'static str,
    /// Reserved directive marker: prefix + `@`.
    pub marker: &'static str,
}

/// Look up the comment style for a language tag.
///
/// Only Lua is executable today; the table is the seam for adding further
/// languages once an embedded evaluator for them is wired in.
pub fn comment_style(language: &str) -> Option<CommentStyle> {
    match language {
        "lua" | "luau" => Some(CommentStyle {
            prefix: "--",
            marker: "--@",
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lua_has_a_comment_style() {
        let style = comment_style("lua").unwrap();
        assert_eq!(style.prefix, "--");
        assert_eq!(style.marker, "--@");
    }

    #[test]
    fn unknown_languages_have_none() {
        assert!(comment_style("cobol").is_none());
        assert!(comment_style("").is_none());
    }
}
