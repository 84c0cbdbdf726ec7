//! `{{token}}` substitution.
//!
//! Templates are plain text with `{{ name }}` placeholders, where `name` is
//! a lower-case identifier. There are no loops or conditionals: anything
//! repetitive (pin tables, vector tables) is produced as a single block
//! value by the context builder. A placeholder without a value is an error.

use std::collections::BTreeMap;

use crate::error::{RenderError, Result};

/// Token values for one render, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: &str, value: impl Into<String>) {
        self.values.insert(token.to_string(), value.into());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Substitute every placeholder in `source`.
///
/// `name` identifies the template in error messages.
pub fn substitute(name: &str, source: &str, context: &Context) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find("{{") {
        let (literal, tail) = rest.split_at(start);
        out.push_str(literal);
        line += literal.matches('\n').count();

        let Some(end) = tail.find("}}") else {
            return Err(RenderError::Syntax {
                template: name.to_string(),
                line,
                detail: "unterminated '{{'".into(),
            });
        };
        let token = tail[2..end].trim();
        if !is_token(token) {
            return Err(RenderError::Syntax {
                template: name.to_string(),
                line,
                detail: format!("invalid token '{token}'"),
            });
        }
        let value = context.get(token).ok_or_else(|| RenderError::MissingToken {
            template: name.to_string(),
            token: token.to_string(),
            line,
        })?;
        out.push_str(value);
        line += tail[..end].matches('\n').count();
        rest = &tail[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_token(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        let mut ctx = Context::new();
        ctx.set("board_id", "nucleo_l552ze_q");
        ctx.set("flash_origin", "0x08000000");
        ctx
    }

    #[test]
    fn substitutes_with_and_without_spaces() {
        let out = substitute(
            "t",
            "board={{board_id}} flash={{ flash_origin }}\n",
            &context(),
        )
        .unwrap();
        assert_eq!(out, "board=nucleo_l552ze_q flash=0x08000000\n");
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        let text = "int main(void) { return 0; }\n";
        assert_eq!(substitute("t", text, &context()).unwrap(), text);
    }

    #[test]
    fn missing_token_reports_line() {
        let err = substitute("linker.ld.tmpl", "a\nb\n{{ ram_origin }}\n", &context()).unwrap_err();
        match err {
            RenderError::MissingToken { template, token, line } => {
                assert_eq!(template, "linker.ld.tmpl");
                assert_eq!(token, "ram_origin");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_placeholder() {
        assert!(matches!(
            substitute("t", "x {{ board_id", &context()),
            Err(RenderError::Syntax { .. })
        ));
    }

    #[test]
    fn invalid_token_name() {
        assert!(matches!(
            substitute("t", "{{ Board-Id }}", &context()),
            Err(RenderError::Syntax { .. })
        ));
    }

    #[test]
    fn single_braces_pass_through() {
        let text = "void f(void) { if (x) { y(); } }";
        assert_eq!(substitute("t", text, &context()).unwrap(), text);
    }
}
