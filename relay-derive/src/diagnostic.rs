use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Severity {
    Error,
    Warning,
}

/// A message attached to a piece of the input, optionally with a suggested edit.
///
/// Errors become `compile_error!` invocations. Stable Rust has no way for a procedural macro to
/// emit a warning, so warnings are rendered as a use of a `#[deprecated]` constant whose note
/// carries the message.
#[derive(Clone, Debug)]
pub(crate) struct Diagnostic {
    span: Span,
    message: String,
    severity: Severity,
    fix_it: Option<String>,
}

impl Diagnostic {
    pub(crate) fn error<S: Into<String>>(span: Span, message: S) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            fix_it: None,
        }
    }

    pub(crate) fn warning<S: Into<String>>(span: Span, message: S) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Warning,
            fix_it: None,
        }
    }

    pub(crate) fn with_fix_it<S: Into<String>>(mut self, fix_it: S) -> Self {
        self.fix_it = Some(fix_it.into());
        self
    }

    pub(crate) fn severity(&self) -> Severity {
        self.severity
    }

    fn rendered_message(&self) -> String {
        match &self.fix_it {
            Some(fix_it) => format!("{}\nhelp: {}", self.message, fix_it),
            None => self.message.clone(),
        }
    }

    pub(crate) fn into_syn_error(self) -> syn::Error {
        syn::Error::new(self.span, self.rendered_message())
    }

    pub(crate) fn to_tokens(&self) -> TokenStream {
        match self.severity {
            Severity::Error => self.clone().into_syn_error().to_compile_error(),
            Severity::Warning => {
                let note = self.rendered_message();
                quote_spanned! {self.span=>
                    const _: () = {
                        #[deprecated(note = #note)]
                        #[allow(non_upper_case_globals)]
                        const relay_warning: () = ();
                        let _ = relay_warning;
                    };
                }
            }
        }
    }
}

impl From<syn::Error> for Diagnostic {
    fn from(e: syn::Error) -> Self {
        Diagnostic::error(e.span(), e.to_string())
    }
}

impl From<syn::Error> for Diagnostics {
    fn from(e: syn::Error) -> Self {
        Diagnostic::from(e).into()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Diagnostics {
            diagnostics: vec![diagnostic],
        }
    }
}

/// The diagnostics collected during one expansion
#[derive(Default)]
pub(crate) struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        self.diagnostics.extend(diagnostics);
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity() == Severity::Error)
    }

    /// Combine every error into a single `syn::Error`, if there are any
    pub(crate) fn errors(&self) -> Option<syn::Error> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .cloned()
            .map(Diagnostic::into_syn_error)
            .reduce(|mut combined, e| {
                combined.combine(e);
                combined
            })
    }

    pub(crate) fn to_tokens(&self) -> TokenStream {
        let errors = self.errors().map(|e| e.to_compile_error());
        let warnings = self
            .diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
            .map(Diagnostic::to_tokens);
        quote! {
            #errors
            #(#warnings)*
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_its_are_rendered_as_help() {
        let error = Diagnostic::error(Span::call_site(), "#[relayed] cannot be combined with #[observable]")
            .with_fix_it("remove #[observable]")
            .into_syn_error();
        assert_eq!(
            error.to_string(),
            "#[relayed] cannot be combined with #[observable]\nhelp: remove #[observable]"
        );
    }

    #[test]
    fn errors_are_combined_and_warnings_kept() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning(Span::call_site(), "superclass inferred"));
        assert!(!diagnostics.has_errors());
        diagnostics.push(Diagnostic::error(Span::call_site(), "first"));
        diagnostics.push(Diagnostic::error(Span::call_site(), "second"));
        assert!(diagnostics.has_errors());

        let combined = diagnostics.errors().unwrap();
        assert_eq!(combined.into_iter().count(), 2);

        let tokens = diagnostics.to_tokens().to_string();
        assert!(tokens.contains("superclass inferred"));
        assert!(tokens.contains("deprecated"));
    }
}
