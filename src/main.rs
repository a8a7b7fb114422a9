mod cli;
mod sim;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::sim::run_simulate;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Simulate(simulate)) => run_simulate(simulate),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        // Map to stable exit codes
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: no projectors, 3: bad rate, 1: other
    for cause in err.chain() {
        if let Some(sim_err) = cause.downcast_ref::<crate::sim::SimulateError>() {
            return match sim_err {
                crate::sim::SimulateError::NoProjectors => 2,
                crate::sim::SimulateError::NonPositiveRate { .. } => 3,
            };
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_no_projectors() {
        let err = anyhow::Error::from(crate::sim::SimulateError::NoProjectors);
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn exit_code_non_positive_rate() {
        let err = anyhow::Error::from(crate::sim::SimulateError::NonPositiveRate { rate: -5 });
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn exit_code_other() {
        let err = anyhow::anyhow!("other");
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
