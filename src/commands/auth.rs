use colored::Colorize;

use crate::auth::{Auth, AuthState};
use crate::config::Config;
use crate::error::{CivicError, Result};
use crate::output::{print_item, print_message};

use super::prompt;

pub async fn login(auth: &mut Auth, config: &Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        return Err(CivicError::validation("email", "Email is required."));
    }
    let password = prompt("Password: ")?;
    if password.is_empty() {
        return Err(CivicError::validation("password", "Password is required."));
    }

    let user = auth.sign_in(&email, &password).await?;
    print_message(&format!("Signed in as {} <{}>", user.name, user.email));
    Ok(())
}

pub fn logout(auth: &mut Auth) -> Result<()> {
    let was_signed_in = auth.current_user().is_some();
    auth.sign_out()?;
    if was_signed_in {
        print_message("Signed out");
    } else {
        print_message("Not signed in");
    }
    Ok(())
}

pub fn whoami(auth: &Auth) -> Result<()> {
    let AuthState::SignedIn(user) = auth.state() else {
        return Err(CivicError::NotSignedIn);
    };
    print_item(&user, |u| {
        println!("{} <{}>", u.name.bold(), u.email);
        println!("Role: {}", u.role);
        println!("ID:   {}", u.id);
    });
    Ok(())
}
