// Prompt texts of the repair loop

use super::task::Task;
use crate::contract::{Artifacts, ContractFault, OutputContract};
use crate::extract::{CodeUnit, FENCE};
use crate::issues::Issue;
use crate::sandbox::{Dialect, ExecutionOutcome, RunFault};

const FIX_REQUEST: &str = "Please rewrite the complete code again with these issues corrected.";

/// First request of a task
pub fn request_code(task: &Task, dialect: &Dialect) -> String {
    let mut prompt = format!(
        "{}\n\nWrite a complete, short {} program to perform this task.\n",
        task.instructions.trim(),
        dialect.name()
    );

    let inputs = task.input_names();
    if !inputs.is_empty() {
        prompt.push_str(&format!(
            "The following input files are in the current directory: {}.\n",
            inputs.join(", ")
        ));
    }

    prompt.push_str(&task.contract.describe());
    prompt.push_str(
        "\nDo not print anything to the console and do not ask for user input.\n\
         Return the code in a single fenced code block.",
    );
    prompt
}

/// Feedback for a failed run, followed by any issues observed
pub fn debug_prompt(
    unit: &CodeUnit,
    outcome: &ExecutionOutcome,
    issues: &[Issue],
    contract: &OutputContract,
) -> String {
    let mut prompt = match outcome {
        ExecutionOutcome::Timeout { limit_secs } => format!(
            "I ran your code, but it ran too long and was stopped after {limit_secs} seconds.\n\
             Please make the code faster, or check it for endless loops and blocking calls."
        ),
        ExecutionOutcome::Fault { fault } => fault_message(unit, fault, contract),
        // Successful runs are accepted, never debugged.
        ExecutionOutcome::Success { .. } => String::new(),
    };

    if !issues.is_empty() {
        prompt.push_str("\n\nIn addition, please fix the following issues:\n");
        for issue in issues {
            prompt.push_str(&format!("- {}\n", issue.explanation));
        }
    }

    prompt.push_str("\n\n");
    prompt.push_str(FIX_REQUEST);
    prompt
}

fn fault_message(unit: &CodeUnit, fault: &RunFault, contract: &OutputContract) -> String {
    match fault {
        RunFault::ForbiddenCall { symbol } => format!(
            "Your code calls `{symbol}`, which is not allowed in this environment.\n\
             Please do not use `{symbol}` in your code."
        ),
        RunFault::Runtime {
            type_name,
            message,
            line,
        } => {
            let mut text = format!(
                "I ran the code and got the following error message:\n{FENCE}\n{type_name}: {}\n{FENCE}",
                message.trim_end()
            );
            if let Some(source_line) = line.and_then(|n| unit.line(n)) {
                text.push_str(&format!(
                    "\nThe error occurred on line {}:\n{FENCE}\n{}\n{FENCE}",
                    line.unwrap_or_default(),
                    source_line
                ));
            }
            text
        }
        RunFault::Contract(ContractFault::MissingOutput { name }) => format!(
            "I ran the code, but it did not create the required output file \"{name}\".\n{}",
            contract.describe()
        ),
        RunFault::Contract(ContractFault::UnexpectedOutput { name }) => format!(
            "I ran the code, but it created the file \"{name}\", which was not requested.\n{}",
            contract.describe()
        ),
        RunFault::Contract(ContractFault::MalformedOutput { name, reason }) => format!(
            "I ran the code, but the output file \"{name}\" is not as expected: {reason}.\n{}",
            contract.describe()
        ),
    }
}

/// Surrogate answer placed after the checkpoint once an attempt succeeds
pub fn surrogate_answer(unit: &CodeUnit, contract: &OutputContract) -> String {
    let names: Vec<String> = contract.names().map(|n| format!("\"{n}\"")).collect();
    let saves = if names.is_empty() {
        String::new()
    } else {
        format!(" It saves results to {}.", names.join(", "))
    };
    format!(
        "Here is the code to perform the task.{saves}\n{FENCE}{}\n{}\n{FENCE}",
        unit.language.as_deref().unwrap_or_default(),
        unit.runnable().trim_end()
    )
}

/// Closed accept/revise question about the produced files
pub fn decision_question(artifacts: &Artifacts) -> String {
    let mut prompt = String::from("I ran your code.");
    if artifacts.is_empty() {
        prompt.push_str(" It completed without creating any output files.\n");
    } else {
        for (name, artifact) in artifacts {
            prompt.push_str(&format!(
                "\nHere is the content of the output file ({name}):\n{FENCE}\n{}\n{FENCE}\n",
                artifact.as_str().trim_end()
            ));
        }
    }
    prompt.push_str(
        "\nPlease choose one of the following options:\n\n\
         a. The results seem reasonable. Let's proceed.\n\n\
         b. Something is wrong. I need to go back and change the code.\n\n\
         Answer with just the letter designating the option you choose \
         (only type a single character: \"a\", or \"b\").",
    );
    prompt
}

/// Appended after a "revise" decision
pub fn revision_request() -> &'static str {
    "Please re-write the code to fix the problem."
}

pub fn explanation_request(contract: &OutputContract) -> String {
    let mut prompt = String::from(
        "Please explain what your code does. Do not provide a line-by-line explanation; \
         give a high-level description of the approach.",
    );
    let names: Vec<&str> = contract.names().collect();
    if !names.is_empty() {
        prompt.push_str(&format!(
            "\nAlso explain what the code writes into {} and what the results mean.",
            names.join(", ")
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_code;
    use crate::issues::{Issue, PRINT_USAGE};

    fn unit() -> CodeUnit {
        extract_code("```python\nx = 1\ny = x / 0\n```").unwrap()
    }

    #[test]
    fn test_runtime_prompt_quotes_offending_line() {
        let outcome = ExecutionOutcome::Fault {
            fault: RunFault::Runtime {
                type_name: "ZeroDivisionError".into(),
                message: "division by zero".into(),
                line: Some(2),
            },
        };
        let prompt = debug_prompt(&unit(), &outcome, &[], &OutputContract::empty());
        assert!(prompt.contains("ZeroDivisionError: division by zero"));
        assert!(prompt.contains("line 2"));
        assert!(prompt.contains("y = x / 0"));
        assert!(prompt.ends_with(FIX_REQUEST));
    }

    #[test]
    fn test_timeout_prompt_mentions_limit() {
        let prompt = debug_prompt(
            &unit(),
            &ExecutionOutcome::Timeout { limit_secs: 5 },
            &[Issue::soft(PRINT_USAGE, "Do not print.")],
            &OutputContract::empty(),
        );
        assert!(prompt.contains("ran too long"));
        assert!(prompt.contains("5 seconds"));
        assert!(prompt.contains("- Do not print."));
    }

    #[test]
    fn test_missing_output_prompt_names_file() {
        let outcome = ExecutionOutcome::Fault {
            fault: RunFault::Contract(ContractFault::MissingOutput {
                name: "out.txt".into(),
            }),
        };
        let prompt = debug_prompt(
            &unit(),
            &outcome,
            &[],
            &OutputContract::single_text("out.txt"),
        );
        assert!(prompt.contains("\"out.txt\""));
    }

    #[test]
    fn test_surrogate_answer_is_extractable() {
        let answer = surrogate_answer(&unit(), &OutputContract::single_text("out.txt"));
        let again = extract_code(&answer).unwrap();
        assert_eq!(again.runnable(), unit().runnable());
        assert_eq!(again.language.as_deref(), Some("python"));
    }
}
