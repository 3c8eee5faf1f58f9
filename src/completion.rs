//! # Shell Completion Module
//!
//! Completion scripts for the `radiofree` binary via `clap_complete`.
//!
//! ```bash
//! radiofree completion bash > ~/.local/share/bash-completion/completions/radiofree
//! radiofree completion zsh > ~/.config/zsh/completions/_radiofree
//! radiofree completion fish > ~/.config/fish/completions/radiofree.fish
//! ```

use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell on stdout
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    write_completions(gen, cmd, &mut io::stdout());
}

/// Generate shell completions into `out`
pub fn write_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Convert our CLI Shell enum to clap_complete Shell
#[must_use]
pub fn shell_to_completion_shell(shell: &crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Shell};
    use clap::CommandFactory;

    #[test]
    fn test_bash_completion_mentions_subcommands() {
        let mut cmd = Args::command();
        let mut out = Vec::new();
        write_completions(shell_to_completion_shell(&Shell::Bash), &mut cmd, &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("radiofree"));
        assert!(script.contains("queue-ten"));
        assert!(script.contains("init-config"));
    }

    #[test]
    fn test_shell_mapping() {
        assert_eq!(shell_to_completion_shell(&Shell::Zsh), CompletionShell::Zsh);
        assert_eq!(shell_to_completion_shell(&Shell::Fish), CompletionShell::Fish);
    }
}
