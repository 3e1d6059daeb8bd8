//! Interactive confirmations on the terminal

use crate::ui;
use clusterfile::MappingTable;
use dialoguer::Input;

const MAPPING_PROMPT: &str = "[ACTION] For the range definition, is this mapping what you expected?";

/// Asks the operator on stdin/stdout
pub struct TerminalConfirm;

impl clusterfile::Confirm for TerminalConfirm {
    fn confirm_mapping(&mut self, table: &MappingTable) -> clusterfile::Result<bool> {
        println!();
        print!("{table}");
        let answer = ask(MAPPING_PROMPT)?;
        decide(&answer)
    }
}

impl provision::ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        let answer = ask(&format!("[ACTION] {prompt}"))?;
        let confirmed = decide(&answer)?;
        if !confirmed {
            ui::dim("Skipped");
        }
        Ok(confirmed)
    }
}

/// Read one free-text answer line
fn ask(prompt: &str) -> clusterfile::Result<String> {
    Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| clusterfile::Error::Io(std::io::Error::other(e.to_string())))
}

/// Turn a typed answer into a decision
///
/// Anything other than a yes/no word is an error, not a decline.
fn decide(answer: &str) -> clusterfile::Result<bool> {
    match clusterfile::parse_answer(answer) {
        Some(true) => Ok(true),
        Some(false) => {
            log::info!("Declined with {answer:?}");
            Ok(false)
        }
        None => {
            log::error!("Unrecognized answer {answer:?}");
            Err(clusterfile::Error::NotConfirmed {
                reason: format!("unrecognized answer {answer:?}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterfile::ErrorCategory;

    #[test]
    fn test_decide() {
        assert!(decide("y").unwrap());
        assert!(decide("YES").unwrap());
        assert!(!decide("n").unwrap());

        let err = decide("maybe").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotConfirmed);
        assert_eq!(decide("").unwrap_err().category(), ErrorCategory::NotConfirmed);
    }

    #[test]
    fn test_destroy_answers() {
        for yes in ["y", "yes", "t", "true", "1", " True "] {
            assert!(decide(yes).unwrap(), "{yes}");
        }
        for no in ["n", "no", "f", "false", "0"] {
            assert!(!decide(no).unwrap(), "{no}");
        }

        // an unusable answer surfaces as an error that stops the run
        let err: anyhow::Error = decide("nope").unwrap_err().into();
        assert!(err.to_string().contains("nope"));
    }
}
