//! Sign-in, sign-out and locale commands.

use secrecy::SecretString;
use souq_core::Locale;

use super::{App, CliError, print_line};

/// Store a bearer token.
///
/// # Errors
///
/// Returns `CliError::Store` if the token cannot be persisted.
pub fn login(app: &App, token: String) -> Result<(), CliError> {
    app.session.start(&SecretString::from(token))?;
    if app.session.is_authenticated() {
        print_line("Signed in.");
    } else {
        print_line("The token was empty; still signed out.");
    }
    Ok(())
}

/// Forget the token and any local cart state.
///
/// # Errors
///
/// Returns `CliError::Store` if the removal cannot be persisted.
pub fn logout(app: &App) -> Result<(), CliError> {
    app.session.end()?;
    app.cart.clear();
    print_line("Signed out.");
    Ok(())
}

/// Print the active locale.
pub fn show_language(app: &App) {
    let locale = app.session.language().get();
    let direction = if locale.is_rtl() { "rtl" } else { "ltr" };
    print_line(format!("{locale} ({direction})"));
}

/// Switch the active locale.
///
/// # Errors
///
/// Returns `CliError` if the tag is invalid or cannot be persisted.
pub fn set_language(app: &App, tag: &str) -> Result<(), CliError> {
    let locale = Locale::parse(tag)?;
    app.session.language().set(&locale)?;
    print_line(format!("Language set to {locale}."));
    Ok(())
}
