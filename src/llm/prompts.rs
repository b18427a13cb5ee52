//! Prompt construction for the completion-backed tools.

use super::CompletionRequest;

pub const SYSTEM_PERSONA: &str = "You are the world's best assistant for operating on emails and \
Telegram messages. You are the most experienced person in this domain. Do exactly what the job \
requires.";

const SUMMARIZE_INSTRUCTION: &str = "Summarize this email.";

const EMAIL_REPLY_INSTRUCTION: &str = "You are required to reply to this email in a casual \
manner. Don't answer like a bot. Only do what is asked and do not talk to the user. Your reply \
must be ONLY the body of an email.";

const CHAT_REPLY_INSTRUCTION: &str = "You are required to reply to a message in Telegram. Keep \
the answer very casual and simple. Don't answer like a bot.";

/// Where a drafted reply will be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMedium {
    Email,
    Chat,
}

impl std::str::FromStr for ReplyMedium {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "chat" | "telegram" => Ok(Self::Chat),
            other => Err(format!("unknown medium '{other}' (expected email or chat)")),
        }
    }
}

/// Sampling settings shared by every prompt.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub max_tokens: u64,
    pub temperature: f64,
}

/// Context-plus-question layout used for every request.
fn contextual(context: &str, question: &str, sampling: Sampling) -> CompletionRequest {
    CompletionRequest {
        system: SYSTEM_PERSONA.to_string(),
        user: format!("Context:\n{context}\n\nQuestion:\n{question}"),
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
    }
}

pub fn summarize(body: &str, sampling: Sampling) -> CompletionRequest {
    contextual(body, SUMMARIZE_INSTRUCTION, sampling)
}

/// `context` is the serialized view bundle.
pub fn ask(context: &str, question: &str, sampling: Sampling) -> CompletionRequest {
    contextual(context, question, sampling)
}

pub fn draft_reply(prompt: &str, medium: ReplyMedium, sampling: Sampling) -> CompletionRequest {
    let instruction = match medium {
        ReplyMedium::Email => EMAIL_REPLY_INSTRUCTION,
        ReplyMedium::Chat => CHAT_REPLY_INSTRUCTION,
    };
    contextual(instruction, prompt, sampling)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLING: Sampling = Sampling {
        max_tokens: 1000,
        temperature: 0.7,
    };

    #[test]
    fn summarize_places_body_in_context() {
        let req = summarize("Meeting moved to 3pm", SAMPLING);
        assert_eq!(req.system, SYSTEM_PERSONA);
        assert_eq!(
            req.user,
            "Context:\nMeeting moved to 3pm\n\nQuestion:\nSummarize this email."
        );
        assert_eq!(req.max_tokens, 1000);
    }

    #[test]
    fn reply_instruction_depends_on_medium() {
        let email = draft_reply("say thanks", ReplyMedium::Email, SAMPLING);
        let chat = draft_reply("say thanks", ReplyMedium::Chat, SAMPLING);
        assert!(email.user.contains("body of an email"));
        assert!(chat.user.contains("Telegram"));
        assert!(chat.user.ends_with("Question:\nsay thanks"));
    }

    #[test]
    fn medium_parses() {
        assert_eq!("Email".parse::<ReplyMedium>().unwrap(), ReplyMedium::Email);
        assert_eq!("telegram".parse::<ReplyMedium>().unwrap(), ReplyMedium::Chat);
        assert!("fax".parse::<ReplyMedium>().is_err());
    }
}
