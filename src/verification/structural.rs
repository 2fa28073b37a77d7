use std::fmt;

use crate::{
    module::Token,
    verification::resolver::{ModuleReader, ModuleResolver},
};

/// The value of a named verifier error argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierArgument {
    /// An IL offset, rendered as lowercase hex (`0xc`)
    Offset(u32),
    /// A metadata token, rendered in parentheses (`(0x0a000005)`)
    Token(Token),
    /// Anything else, rendered verbatim
    Text(String),
}

impl fmt::Display for VerifierArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierArgument::Offset(offset) => write!(f, "0x{offset:x}"),
            VerifierArgument::Token(token) => write!(f, "({token})"),
            VerifierArgument::Text(text) => f.write_str(text),
        }
    }
}

/// One error reported by a structural verifier.
///
/// Renders as a single line, e.g.:
///
/// ```text
/// [Main]: Unexpected type on the stack. { Offset = 0x6, Found = Int32, Expected = ref 'string' }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierError {
    /// Name of the offending method, if the error is tied to one
    pub method: Option<String>,
    /// Definition token of the offending method
    pub token: Option<Token>,
    /// Verifier message
    pub message: String,
    /// Named arguments in verifier order
    pub arguments: Vec<(String, VerifierArgument)>,
}

impl VerifierError {
    /// An error not tied to a method
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            method: None,
            token: None,
            message: message.into(),
            arguments: Vec::new(),
        }
    }

    /// Tie the error to a method
    #[must_use]
    pub fn in_method(mut self, name: impl Into<String>, token: Token) -> Self {
        self.method = Some(name.into());
        self.token = Some(token);
        self
    }

    /// Append a named argument
    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, value: VerifierArgument) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    /// Append an `Offset` argument
    #[must_use]
    pub fn at_offset(self, offset: u32) -> Self {
        self.argument("Offset", VerifierArgument::Offset(offset))
    }
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.method, &self.token) {
            (Some(method), _) => write!(f, "[{method}]: ")?,
            (None, Some(token)) => write!(f, "[{token}]: ")?,
            (None, None) => {}
        }
        f.write_str(&self.message)?;

        if !self.arguments.is_empty() {
            f.write_str(" { ")?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name} = {value}")?;
            }
            f.write_str(" }")?;
        }
        Ok(())
    }
}

/// Render verifier errors, one per line.
#[must_use]
pub fn render_errors(errors: &[VerifierError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One structural verification run.
///
/// Created per verification by a [`StructuralVerifierProvider`], bound to the resolver of
/// that verification's closure.
pub trait StructuralVerifier {
    /// Name the module defining the root object type
    fn set_core_library(&mut self, simple_name: &str);

    /// Verify every method of `root`. An empty result means the module verified.
    fn verify(&mut self, root: ModuleReader<'_>) -> Vec<VerifierError>;
}

/// Creates structural verifiers over a resolver.
pub trait StructuralVerifierProvider: Send + Sync {
    /// Create a verifier that resolves referenced modules through `resolver`
    fn create<'r>(&self, resolver: &'r ModuleResolver<'r>) -> Box<dyn StructuralVerifier + 'r>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_with_method_and_arguments() {
        let error = VerifierError::new("Unexpected type on the stack.")
            .in_method("Main", Token::method_def(1))
            .at_offset(12)
            .argument("Found", VerifierArgument::Text("Int32".into()))
            .argument("Token", VerifierArgument::Token(Token(0x0a000005)));

        assert_eq!(
            error.to_string(),
            "[Main]: Unexpected type on the stack. { Offset = 0xc, Found = Int32, Token = (0x0a000005) }"
        );
    }

    #[test]
    fn render_without_method() {
        assert_eq!(VerifierError::new("Bad image.").to_string(), "Bad image.");

        let mut anonymous = VerifierError::new("Bad body.");
        anonymous.token = Some(Token::method_def(2));
        assert_eq!(anonymous.to_string(), "[0x06000002]: Bad body.");
    }

    #[test]
    fn render_errors_joins_lines() {
        let errors = vec![
            VerifierError::new("a").in_method("M", Token::method_def(1)),
            VerifierError::new("b").in_method("N", Token::method_def(2)).at_offset(0),
        ];
        assert_eq!(render_errors(&errors), "[M]: a\n[N]: b { Offset = 0x0 }");
        assert_eq!(render_errors(&[]), "");
    }
}
