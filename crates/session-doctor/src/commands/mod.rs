//! CLI command implementations.

pub mod auth;
pub mod config;
pub mod recovery;
pub mod status;
pub mod watch;

use auth_reconciler::RecoveryPrompt;

use crate::output;

/// Show the recovery options, if any apply.
fn print_prompt(prompt: Option<RecoveryPrompt>) {
    let Some(prompt) = prompt else {
        return;
    };

    println!();
    println!("{}", prompt.headline);
    println!("{}", prompt.detail);
    for action in prompt.actions {
        output::print_row(action.label(), &format!("session-doctor {}", command_for(action)));
    }
}

fn command_for(action: auth_reconciler::RecoveryAction) -> &'static str {
    use auth_reconciler::RecoveryAction;

    match action {
        RecoveryAction::Fix => "repair",
        RecoveryAction::ClearAndSignIn => "clear",
        RecoveryAction::ContinueAsGuest => "guest",
    }
}
