//! Authentication commands.

use super::build_controller;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use lettings_gateway::RegisterRequest;
use std::io::{self, Write};

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

/// Login with email and password.
pub async fn login(remember: bool, format: &OutputFormat) -> Result<()> {
    let controller = build_controller()?;

    // A stored session may already be live
    if controller.restore_session().await {
        let snapshot = controller.snapshot();
        let email = snapshot
            .user
            .map(|u| u.email)
            .unwrap_or_else(|| "user".to_string());
        output::print_success(&format!("Already logged in as {}", email), format);
        return Ok(());
    }

    let email = prompt_line("Email")?;
    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(());
    }

    // Read password without echo
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    println!("Logging in...");

    let payload = controller.login(&email, &password, remember).await;

    if payload.success {
        let email_display = payload
            .user
            .as_ref()
            .map(|u| u.email.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("user");
        output::print_success(&format!("Logged in as {}", email_display), format);
        if let Some(route) = controller.landing_route() {
            output::print_row("Landing route", route, format);
        }
    } else {
        let message = payload.message.as_deref().unwrap_or("Login failed");
        output::print_error(message, format);
    }

    Ok(())
}

/// Register a new account.
pub async fn register(format: &OutputFormat) -> Result<()> {
    let controller = build_controller()?;

    let name = prompt_line("Name")?;
    let email = prompt_line("Email")?;
    let role = prompt_line("Role (admin/landlord/tenant/agent/service-provider)")?;

    if name.is_empty() || email.is_empty() || role.is_empty() {
        output::print_error("Name, email and role are required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    println!("Registering...");

    let request = RegisterRequest {
        name,
        email,
        password,
        role,
        ..RegisterRequest::default()
    };
    let payload = controller.register(&request).await;

    if payload.success {
        let email_display = payload
            .user
            .as_ref()
            .map(|u| u.email.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("user");
        output::print_success(&format!("Registered and logged in as {}", email_display), format);
    } else {
        let message = payload.message.as_deref().unwrap_or("Registration failed");
        output::print_error(message, format);
    }

    Ok(())
}

/// Check session status.
pub async fn status(format: &OutputFormat) -> Result<()> {
    let controller = build_controller()?;
    let restored = controller.restore_session().await;
    let snapshot = controller.snapshot();

    match format {
        OutputFormat::Text => {
            if restored {
                println!("Session:  active");
                if let Some(user) = &snapshot.user {
                    output::print_row("User", &user.email, format);
                    output::print_row("Role", user.role.as_str(), format);
                    output::print_row("Route", user.role.landing_route(), format);
                }
            } else {
                println!("Session:  none");
            }
        }
        OutputFormat::Json => {
            let body = serde_json::json!({
                "logged_in": restored,
                "email": snapshot.user.as_ref().map(|u| u.email.clone()),
                "role": snapshot.user.as_ref().map(|u| u.role.as_str().to_string()),
                "route": snapshot.user.as_ref().map(|u| u.role.landing_route()),
            });
            println!("{}", body);
        }
    }

    Ok(())
}

/// Logout and clear stored credentials.
pub async fn logout(format: &OutputFormat) -> Result<()> {
    let controller = build_controller()?;

    // Restore first so the remote logout call carries a live token
    let _ = controller.restore_session().await;
    controller.logout().await;

    output::print_success("Logged out", format);
    Ok(())
}

/// Run in the foreground with the refresh loop armed.
pub async fn run(format: &OutputFormat) -> Result<()> {
    let controller = build_controller()?;

    if !controller.restore_session().await {
        output::print_error("No stored session. Run 'lettings login' first", format);
        return Ok(());
    }

    let snapshot = controller.snapshot();
    if let Some(user) = &snapshot.user {
        output::print_success(&format!("Session active for {}", user.email), format);
    }
    println!("Refresh loop armed. Press Ctrl-C to exit.");

    tokio::signal::ctrl_c().await?;
    println!("Shutting down");

    Ok(())
}
