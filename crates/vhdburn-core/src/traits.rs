//! Core traits for vhdburn

use std::io::{Read, Seek, Write};

/// Supplies the yes/no decision for a proposed overwrite.
///
/// Burning never prompts by itself; whoever drives it injects a policy.
/// Interactive front ends ask a human, `--force` style callers always
/// proceed, and tests return canned answers.
pub trait ConfirmationPolicy {
    /// Answer `question`; `true` means proceed with the write
    fn confirm(&mut self, question: &str) -> bool;
}

/// Any `FnMut(&str) -> bool` closure is a confirmation policy
impl<F> ConfirmationPolicy for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Combined trait for Read + Write + Seek
pub trait ReadWriteSeek: Read + Write + Seek + Send {}

/// Blanket implementation for any type that implements Read + Write + Seek
impl<T: Read + Write + Seek + Send> ReadWriteSeek for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_policy() {
        let mut asked = Vec::new();
        let mut policy = |question: &str| {
            asked.push(question.to_string());
            false
        };
        assert!(!policy.confirm("Overwrite?"));
        assert_eq!(asked, vec!["Overwrite?".to_string()]);
    }

    #[test]
    fn test_policy_as_trait_object() {
        let mut always = |_: &str| true;
        let policy: &mut dyn ConfirmationPolicy = &mut always;
        assert!(policy.confirm("Overwrite?"));
    }
}
