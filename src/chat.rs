use std::io::{BufRead, Write};

use crate::{
    error::ServiceError,
    model::{SamplingParams, TextGenerator},
};

pub const BANNER: &str = "AI Chatbot (type 'exit' to quit)";

/// Strips the echoed user text and keeps only the first sentence.
pub fn clean_reply(user: &str, raw: &str) -> String {
    let reply = if user.is_empty() {
        raw.trim().to_string()
    } else {
        raw.replace(user, "").trim().to_string()
    };
    match reply.split_once('.') {
        Some((first, _)) => first.trim().to_string(),
        None => reply,
    }
}

/// Interactive loop: reads lines from `input` until `exit` or end of input.
///
/// Backend failures are reported on `output` and the loop carries on.
pub fn run_chat<G, R, W>(
    generator: &G,
    params: &SamplingParams,
    input: R,
    mut output: W,
) -> Result<(), ServiceError>
where
    G: TextGenerator + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{BANNER}")?;
    let mut lines = input.lines();

    loop {
        write!(output, "You: ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let user = line?;
        let user = user.trim();
        if user.eq_ignore_ascii_case("exit") {
            break;
        }
        if user.is_empty() {
            continue;
        }

        match generator.generate(user, params) {
            Ok(raw) => writeln!(output, "AI: {}", clean_reply(user, &raw))?,
            Err(err) => {
                tracing::warn!(error = %err, "chat generation failed");
                writeln!(output, "error: {err}")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::model::BackendMetadata;

    struct Scripted;

    impl TextGenerator for Scripted {
        fn generate(&self, prompt: &str, _params: &SamplingParams) -> Result<String, ServiceError> {
            if prompt == "fail" {
                return Err(ServiceError::Backend("unreachable".into()));
            }
            Ok(format!("{prompt} is great. It really is."))
        }

        fn metadata(&self) -> BackendMetadata {
            BackendMetadata {
                name: "scripted".into(),
                kind: "test".into(),
                model: "none".into(),
            }
        }
    }

    fn transcript(input: &str) -> String {
        let mut out = Vec::new();
        run_chat(
            &Scripted,
            &SamplingParams::default(),
            Cursor::new(input.to_string()),
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reply_drops_echo_and_keeps_first_sentence() {
        assert_eq!(
            clean_reply("Hello there", "Hello there friend. How are you?"),
            "friend"
        );
        assert_eq!(clean_reply("Hi", "  no period here "), "no period here");
    }

    #[test]
    fn loop_answers_until_exit() {
        let out = transcript("Rust\n\nEXIT\nnever read\n");
        assert!(out.starts_with(BANNER));
        assert!(out.contains("AI: is great\n"));
        assert!(!out.contains("never read"));
        assert_eq!(out.matches("AI:").count(), 1);
    }

    #[test]
    fn end_of_input_stops_the_loop() {
        let out = transcript("Rust");
        assert!(out.contains("AI: is great"));
        assert!(out.ends_with("You: \n"));
    }

    #[test]
    fn backend_errors_are_reported_and_loop_continues() {
        let out = transcript("fail\nRust\nexit\n");
        assert!(out.contains("error: generation backend error: unreachable"));
        assert!(out.contains("AI: is great"));
    }
}
