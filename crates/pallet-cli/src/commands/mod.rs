//! Command dispatch and handler modules.

mod check;
mod resolve;
mod show;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve {
            universe,
            config,
            output,
            dump,
            targets,
        } => resolve::exec(&resolve::ResolveArgs {
            universe,
            config,
            output,
            dump,
            targets,
        }),
        Command::Show { universe, plan } => show::exec(&universe, &plan),
        Command::Check { universe } => check::exec(&universe),
    }
}
