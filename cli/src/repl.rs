use anyhow::Result;
use rustyline::{error::ReadlineError, DefaultEditor};
use smalt_core::Vm;

fn print_repl_help() {
    eprintln!("Commands: :quit | :exit | :q, :help");
}

/// Keep reading while brackets are unbalanced or the line ends with `\`,
/// ignoring bracket characters inside string literals and comments.
fn should_continue_multiline(buf: &str) -> bool {
    let mut paren = 0i32;
    let mut bracket = 0i32;
    let mut brace = 0i32;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;
    for ch in buf.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if in_comment {
            if ch == '\'' {
                in_comment = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '\'' => in_comment = true,
            '(' => paren += 1,
            ')' => paren -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            '{' => brace += 1,
            '}' => brace -= 1,
            _ => {}
        }
    }
    let trailing_backslash = !in_string && buf.trim_end().ends_with('\\');
    paren > 0 || bracket > 0 || brace > 0 || in_string || in_comment || trailing_backslash
}

pub fn run(vm: &mut Vm) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    eprintln!("smalt {} — :help for commands", env!("CARGO_PKG_VERSION"));

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "smalt> " } else { "  ...> " };
        match editor.readline(prompt) {
            Ok(line) => {
                match line.trim() {
                    ":quit" | ":exit" | ":q" => return Ok(()),
                    ":help" => {
                        print_repl_help();
                        continue;
                    }
                    _ => {}
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(line.trim_end_matches('\\'));
                if should_continue_multiline(&buffer) {
                    continue;
                }
                let source = std::mem::take(&mut buffer);
                if source.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&source);
                match vm.eval_statements(&source) {
                    Ok(values) => {
                        for value in values {
                            println!("=> {}", value.print_string());
                        }
                    }
                    Err(err) => eprintln!("{}", err),
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                eprintln!("(interrupted)");
            }
            Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::should_continue_multiline;

    #[test]
    fn balanced_input_is_complete() {
        assert!(!should_continue_multiline("1 + 2"));
        assert!(!should_continue_multiline("[:a | a] value: 1"));
    }

    #[test]
    fn open_brackets_continue() {
        assert!(should_continue_multiline("makeCounter := [| c |"));
        assert!(should_continue_multiline("(1 + "));
        assert!(should_continue_multiline("{1. 2."));
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        assert!(!should_continue_multiline(r#""an [open" , "bracket]""#));
    }

    #[test]
    fn unterminated_string_or_comment_continues() {
        assert!(should_continue_multiline(r#"x := "half"#));
        assert!(should_continue_multiline("1 + 'note"));
    }

    #[test]
    fn trailing_backslash_continues() {
        assert!(should_continue_multiline("1 + \\"));
    }
}
