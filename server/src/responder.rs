//! Canned reply generation for the mock voice manager.
//!
//! Keyword heuristics stand in for the real platform's inference; they only
//! need to be predictable enough for scripted scenarios to assert on.

use chrono::Local;

/// Picks a canned reply for a user prompt.
#[must_use]
pub fn canned_reply(prompt: &str) -> String {
    let lower = prompt.to_lowercase();

    if lower.contains("hello") || lower.contains("hi") {
        "Hello! How can I assist you today?".to_string()
    } else if lower.contains("weather") {
        "I'm a mock voice manager, so I can't check real weather. But let's pretend it's sunny!"
            .to_string()
    } else if lower.contains("test") {
        "This is a test response from the mock voice manager. Everything is working correctly!"
            .to_string()
    } else if lower.contains("time") {
        format!("The current time is {}.", Local::now().format("%H:%M:%S"))
    } else if lower.contains("help") {
        "I'm a mock voice manager for testing. I can respond to various prompts like hello, weather, test, and time."
            .to_string()
    } else if lower.contains("goodbye") || lower.contains("bye") {
        "Goodbye! Thanks for testing the mock voice manager.".to_string()
    } else {
        format!("I received your message: '{prompt}'. This is a mock response from the voice manager.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_gets_the_greeting_reply() {
        assert_eq!(canned_reply("hello"), "Hello! How can I assist you today?");
        assert_eq!(
            canned_reply("Well HELLO there"),
            "Hello! How can I assist you today?"
        );
    }

    #[test]
    fn unknown_prompts_are_echoed() {
        let reply = canned_reply("order a pizza");
        assert!(reply.contains("order a pizza"));
        assert!(reply.contains("mock response"));
    }

    #[test]
    fn time_reply_contains_a_clock_reading() {
        let reply = canned_reply("what time is it");
        assert!(reply.starts_with("The current time is "));
    }
}
